//! Progress notifications for deploy and teardown runs
//!
//! Callbacks are invoked synchronously from the deployer at fixed points;
//! rendering is up to the implementor.

use crate::error::CloudError;
use crate::resources::{Provisioned, ResourceKind};
use std::time::Duration;

pub trait DeployObserver: Send + Sync {
    /// An upload finished, successfully or not
    fn file_uploaded(&self, _path: &str, _result: Result<(), &CloudError>) {}

    /// Remote objects were removed because they left the build output
    fn files_deleted(&self, _paths: &[String]) {}

    /// A remote call is about to be retried
    fn retrying(&self, _operation: &str, _attempt: u32, _error: &CloudError, _delay: Duration) {}

    fn resource_ready(&self, _kind: ResourceKind, _outcome: Provisioned) {}

    fn resource_removed(&self, _kind: ResourceKind) {}
}

/// Ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl DeployObserver for NoopObserver {}

/// Forwards notifications to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DeployObserver for TracingObserver {
    fn file_uploaded(&self, path: &str, result: Result<(), &CloudError>) {
        match result {
            Ok(()) => tracing::info!(path, "uploaded"),
            Err(e) => tracing::warn!(path, error = %e, "upload failed"),
        }
    }

    fn files_deleted(&self, paths: &[String]) {
        tracing::info!(count = paths.len(), "deleted remote files");
    }

    fn retrying(&self, operation: &str, attempt: u32, error: &CloudError, delay: Duration) {
        tracing::warn!(
            operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "retrying after error: {}",
            error
        );
    }

    fn resource_ready(&self, kind: ResourceKind, outcome: Provisioned) {
        tracing::info!("{} {}", kind, outcome);
    }

    fn resource_removed(&self, kind: ResourceKind) {
        tracing::info!("{} removed", kind);
    }
}
