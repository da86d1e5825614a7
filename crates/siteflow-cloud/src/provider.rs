//! Collaborator traits for the managed cloud resources
//!
//! Each trait is a narrow boundary over one provider service. The engine
//! only ever sees the identifier fields declared here; provider response
//! payloads stay inside the implementations.

use crate::error::Result;
use crate::resources::{CertificateState, DistributionState, DnsRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// A single object to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectUpload {
    pub key: String,
    pub source: PathBuf,
    pub content_type: String,
    pub cache_control: String,
}

/// Object storage (bucket) operations
#[async_trait]
pub trait ObjectStoreManager: Send + Sync {
    async fn exists(&self, bucket: &str) -> Result<bool>;

    async fn create(&self, bucket: &str, region: &str) -> Result<()>;

    /// Enable static website hosting, returning the website endpoint URL
    async fn configure_website(
        &self,
        bucket: &str,
        index_document: &str,
        error_document: &str,
    ) -> Result<String>;

    async fn set_public_read_policy(&self, bucket: &str) -> Result<()>;

    async fn tag(&self, bucket: &str, tags: &BTreeMap<String, String>) -> Result<()>;

    async fn put_object(&self, bucket: &str, object: &ObjectUpload) -> Result<()>;

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()>;

    /// Empty and delete the bucket
    async fn delete(&self, bucket: &str) -> Result<()>;
}

/// Distribution as reported by the CDN
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionInfo {
    pub id: String,
    pub domain_name: String,
    /// Provider status, `Deployed` once a change has propagated
    pub status: String,
    pub enabled: bool,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Viewer certificate attached to the distribution, if any
    #[serde(default)]
    pub certificate_arn: Option<String>,
}

impl DistributionInfo {
    pub fn is_deployed(&self) -> bool {
        self.status.eq_ignore_ascii_case("deployed")
    }

    pub fn to_state(&self) -> DistributionState {
        DistributionState {
            distribution_id: self.id.clone(),
            domain_name: self.domain_name.clone(),
            distribution_url: format!("https://{}", self.domain_name),
            aliases: self.aliases.clone(),
        }
    }
}

/// Desired configuration for a new distribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionSpec {
    /// Origin host, usually the bucket website endpoint
    pub origin_domain: String,
    pub aliases: Vec<String>,
    pub certificate_arn: Option<String>,
    pub default_root_object: String,
    /// Used as caller reference / comment so the distribution can be recognized
    pub comment: String,
}

/// Partial update applied to an existing distribution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionUpdate {
    pub enabled: Option<bool>,
    pub aliases: Option<Vec<String>>,
    pub certificate_arn: Option<String>,
}

/// CDN distribution operations
#[async_trait]
pub trait CdnManager: Send + Sync {
    async fn exists(&self, distribution_id: &str) -> Result<bool>;

    async fn get(&self, distribution_id: &str) -> Result<Option<DistributionInfo>>;

    async fn create(&self, spec: &DistributionSpec) -> Result<DistributionInfo>;

    async fn update(
        &self,
        distribution_id: &str,
        update: &DistributionUpdate,
    ) -> Result<DistributionInfo>;

    /// Block until the distribution reports `Deployed`
    async fn wait_until_deployed(&self, distribution_id: &str) -> Result<()>;

    /// Request a cache invalidation, returning the invalidation id
    async fn invalidate(&self, distribution_id: &str, paths: &[String]) -> Result<String>;

    /// Delete a distribution. Only permitted once it is disabled and deployed.
    async fn delete(&self, distribution_id: &str) -> Result<()>;
}

/// Certificate operations
#[async_trait]
pub trait CertificateManager: Send + Sync {
    /// Find an existing certificate covering `domain`
    async fn find(&self, domain: &str) -> Result<Option<CertificateState>>;

    async fn request(&self, domain: &str, alternative_names: &[String])
    -> Result<CertificateState>;

    async fn delete(&self, certificate_arn: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordAction {
    Upsert,
    Delete,
}

/// One change in a DNS change batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordChange {
    pub action: RecordAction,
    pub record: DnsRecord,
}

impl RecordChange {
    pub fn upsert(record: DnsRecord) -> Self {
        Self {
            action: RecordAction::Upsert,
            record,
        }
    }

    pub fn delete(record: DnsRecord) -> Self {
        Self {
            action: RecordAction::Delete,
            record,
        }
    }
}

/// DNS zone operations
#[async_trait]
pub trait DnsManager: Send + Sync {
    /// Hosted zone id for `domain`, if one exists
    async fn find_zone(&self, domain: &str) -> Result<Option<String>>;

    async fn create_zone(&self, domain: &str) -> Result<String>;

    async fn change_records(&self, zone_id: &str, changes: &[RecordChange]) -> Result<()>;

    async fn delete_zone(&self, zone_id: &str) -> Result<()>;
}

/// The four collaborators used by the deployer
#[derive(Clone)]
pub struct Providers {
    pub object_store: Arc<dyn ObjectStoreManager>,
    pub cdn: Arc<dyn CdnManager>,
    pub certificates: Arc<dyn CertificateManager>,
    pub dns: Arc<dyn DnsManager>,
}

impl Providers {
    pub fn new(
        object_store: Arc<dyn ObjectStoreManager>,
        cdn: Arc<dyn CdnManager>,
        certificates: Arc<dyn CertificateManager>,
        dns: Arc<dyn DnsManager>,
    ) -> Self {
        Self {
            object_store,
            cdn,
            certificates,
            dns,
        }
    }
}
