//! Deployment error types

use crate::resources::ResourceKind;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the deployment engine and its collaborators
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load state file {}: {message}", path.display())]
    StateLoad { path: PathBuf, message: String },

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Build output not found: {}", .0.display())]
    BuildOutputNotFound(PathBuf),

    #[error("No files to deploy in {}", .0.display())]
    NoFilesToDeploy(PathBuf),

    #[error("Failed to remove {kind}: {source}")]
    Teardown {
        kind: ResourceKind,
        #[source]
        source: Box<CloudError>,
    },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl CloudError {
    /// Whether the error means the remote resource does not exist (any more).
    ///
    /// Collaborators report deletes of absent resources as failures; teardown
    /// treats those as an acceptable terminal state.
    pub fn is_not_found(&self) -> bool {
        match self {
            CloudError::ResourceNotFound(_) => true,
            CloudError::ApiError(msg) => {
                msg.contains("NoSuchBucket")
                    || msg.contains("NoSuchDistribution")
                    || msg.contains("NoSuchHostedZone")
                    || msg.contains("ResourceNotFoundException")
                    || (msg.contains("InvalidChangeBatch") && msg.contains("not found"))
            }
            _ => false,
        }
    }

    /// Whether the error means the resource is already present and owned by us.
    pub fn is_already_owned(&self) -> bool {
        match self {
            CloudError::ResourceAlreadyExists(_) => true,
            CloudError::ApiError(msg) => msg.contains("BucketAlreadyOwnedByYou"),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
