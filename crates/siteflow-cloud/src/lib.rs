//! SiteFlow deployment engine
//!
//! Publishes a static site build to object storage behind a CDN and keeps a
//! per-environment record of what was provisioned and uploaded, so that
//! later deploys only send what changed and teardown knows what to remove.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  SiteFlow CLI                    │
//! │          (site status/list/plan/forget)          │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                siteflow-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │               Deployer                    │   │
//! │  │  deploy() / teardown()                    │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────┐ ┌───────────┐ ┌──────────────┐    │
//! │  │ Scan/Diff│ │ StateStore│ │ RetryPolicy  │    │
//! │  └──────────┘ └───────────┘ └──────────────┘    │
//! └───────┬──────────┬──────────┬──────────┬────────┘
//!         │          │          │          │
//!    ┌────▼───┐ ┌────▼───┐ ┌────▼───┐ ┌────▼───┐
//!    │ object │ │  CDN   │ │  cert  │ │  DNS   │
//!    │ store  │ │        │ │        │ │        │
//!    └────────┘ └────────┘ └────────┘ └────────┘
//! ```

pub mod changes;
pub mod config;
pub mod deployer;
pub mod error;
pub mod hash;
pub mod observer;
pub mod provider;
pub mod report;
pub mod resources;
pub mod retry;
pub mod state;

// Re-exports
pub use changes::{FileChange, FileChanges, IncrementalStats, detect_changes};
pub use config::{CdnConfig, DeployConfig, DnsConfig, TeardownOptions};
pub use deployer::Deployer;
pub use error::{CloudError, Result};
pub use hash::{FileHashMap, LocalFile, hash_file, scan_build_output, scan_directory};
pub use observer::{DeployObserver, NoopObserver, TracingObserver};
pub use provider::{
    CdnManager, CertificateManager, DistributionInfo, DistributionSpec, DistributionUpdate,
    DnsManager, ObjectStoreManager, ObjectUpload, Providers, RecordAction, RecordChange,
};
pub use report::{DeployReport, FileFailure, ResourceOutcome, TeardownReport};
pub use resources::{
    BucketState, CertificateState, DistributionState, DnsRecord, DnsZoneState, Provisioned,
    ResourceIssue, ResourceKind, ResourceState, Resources,
};
pub use retry::RetryPolicy;
pub use state::{DeploymentState, StateEntry, StateStore};
