//! Results of deploy and teardown runs

use crate::changes::IncrementalStats;
use crate::resources::{Provisioned, ResourceKind};
use serde::{Deserialize, Serialize};

/// A file that could not be uploaded or deleted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

/// Readiness outcome for one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOutcome {
    pub kind: ResourceKind,
    pub outcome: Provisioned,
}

/// Result of a deploy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployReport {
    pub environment: String,

    pub stats: IncrementalStats,

    /// Nothing changed; no remote call was made
    pub no_changes: bool,

    pub uploaded: Vec<String>,

    pub skipped: Vec<String>,

    pub deleted: Vec<String>,

    pub failed: Vec<FileFailure>,

    pub resources: Vec<ResourceOutcome>,

    pub invalidation_id: Option<String>,

    pub invalidation_error: Option<String>,

    pub dry_run: bool,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl DeployReport {
    pub fn new(environment: impl Into<String>, dry_run: bool) -> Self {
        Self {
            environment: environment.into(),
            dry_run,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn add_failure(&mut self, path: impl Into<String>, error: impl ToString) {
        self.failed.push(FileFailure {
            path: path.into(),
            error: error.to_string(),
        });
    }

    pub fn add_resource(&mut self, kind: ResourceKind, outcome: Provisioned) {
        self.resources.push(ResourceOutcome { kind, outcome });
    }

    pub fn outcome_of(&self, kind: ResourceKind) -> Option<Provisioned> {
        self.resources
            .iter()
            .find(|r| r.kind == kind)
            .map(|r| r.outcome)
    }
}

impl std::fmt::Display for DeployReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} uploaded, {} skipped, {} deleted, {} failed",
            self.uploaded.len(),
            self.skipped.len(),
            self.deleted.len(),
            self.failed.len()
        )
    }
}

/// Result of a teardown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownReport {
    pub environment: String,

    /// Removed by this run, in removal order
    pub removed: Vec<ResourceKind>,

    /// Recorded in state but already absent remotely
    pub already_gone: Vec<ResourceKind>,

    /// Skipped on request and still recorded in state
    pub kept: Vec<ResourceKind>,

    /// The state file itself was deleted
    pub state_deleted: bool,

    pub dry_run: bool,

    pub duration_ms: u64,
}

impl TeardownReport {
    pub fn new(environment: impl Into<String>, dry_run: bool) -> Self {
        Self {
            environment: environment.into(),
            dry_run,
            ..Self::default()
        }
    }
}
