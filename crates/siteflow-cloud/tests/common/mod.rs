//! In-memory collaborators sharing one fake cloud

#![allow(dead_code)]

use async_trait::async_trait;
use siteflow_cloud::{
    CdnManager, CertificateManager, CertificateState, CloudError, DeployObserver,
    DistributionInfo, DistributionSpec, DistributionUpdate, DnsManager, DnsRecord,
    ObjectStoreManager, ObjectUpload, Providers, Provisioned, RecordAction, RecordChange,
    ResourceKind, Result, RetryPolicy,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct World {
    /// bucket -> object keys
    pub buckets: BTreeMap<String, BTreeSet<String>>,
    pub distributions: BTreeMap<String, DistributionInfo>,
    pub certificates: BTreeMap<String, CertificateState>,
    /// zone id -> (domain, records)
    pub zones: BTreeMap<String, (String, Vec<DnsRecord>)>,
    /// Every call, in order, as `service.operation`
    pub calls: Vec<String>,
    /// Resource keys present in the state file when a delete was issued
    pub snapshots: Vec<(String, Vec<String>)>,
    /// operation -> remaining failures with the message to fail with
    failures: HashMap<String, (usize, String)>,
    /// object keys whose uploads always fail
    failing_keys: BTreeSet<String>,
    next_id: u32,
}

impl World {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Shared handle to the fake cloud
#[derive(Clone, Default)]
pub struct FakeCloud {
    world: Arc<Mutex<World>>,
    state_path: Arc<Mutex<Option<PathBuf>>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the resource keys of this state file whenever a resource is deleted
    pub fn watch_state(&self, path: impl AsRef<Path>) {
        *self.state_path.lock().unwrap() = Some(path.as_ref().to_path_buf());
    }

    pub fn providers(&self) -> Providers {
        Providers::new(
            Arc::new(FakeObjectStore(self.clone())),
            Arc::new(FakeCdn(self.clone())),
            Arc::new(FakeCertificates(self.clone())),
            Arc::new(FakeDns(self.clone())),
        )
    }

    pub fn world(&self) -> std::sync::MutexGuard<'_, World> {
        self.world.lock().unwrap()
    }

    /// Fail the next `times` calls of `operation` with `message`
    pub fn fail(&self, operation: &str, times: usize, message: &str) {
        self.world()
            .failures
            .insert(operation.to_string(), (times, message.to_string()));
    }

    pub fn clear_failures(&self) {
        let mut world = self.world();
        world.failures.clear();
        world.failing_keys.clear();
    }

    pub fn fail_upload(&self, key: &str) {
        self.world().failing_keys.insert(key.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.world().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.world().calls.clear();
    }

    pub fn snapshot_for(&self, operation: &str) -> Option<Vec<String>> {
        self.world()
            .snapshots
            .iter()
            .find(|(op, _)| op == operation)
            .map(|(_, keys)| keys.clone())
    }

    /// Log the call and consume a scheduled failure, if any
    fn enter(&self, operation: &str) -> Result<()> {
        let mut world = self.world();
        world.calls.push(operation.to_string());
        if let Some((remaining, message)) = world.failures.get_mut(operation)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(CloudError::ApiError(message.clone()));
        }
        Ok(())
    }

    fn snapshot(&self, operation: &str) {
        let path = self.state_path.lock().unwrap().clone();
        let mut keys = path
            .and_then(|p| fs::read_to_string(p).ok())
            .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
            .and_then(|value| {
                value["resources"]
                    .as_object()
                    .map(|r| r.keys().cloned().collect::<Vec<_>>())
            })
            .unwrap_or_default();
        keys.sort();
        self.world()
            .snapshots
            .push((operation.to_string(), keys));
    }
}

pub struct FakeObjectStore(FakeCloud);

#[async_trait]
impl ObjectStoreManager for FakeObjectStore {
    async fn exists(&self, bucket: &str) -> Result<bool> {
        self.0.enter("s3.exists")?;
        Ok(self.0.world().buckets.contains_key(bucket))
    }

    async fn create(&self, bucket: &str, _region: &str) -> Result<()> {
        self.0.enter("s3.create")?;
        let mut world = self.0.world();
        if world.buckets.contains_key(bucket) {
            return Err(CloudError::ApiError("BucketAlreadyOwnedByYou".into()));
        }
        world.buckets.insert(bucket.to_string(), BTreeSet::new());
        Ok(())
    }

    async fn configure_website(&self, bucket: &str, _index: &str, _error: &str) -> Result<String> {
        self.0.enter("s3.configure_website")?;
        Ok(format!("http://{bucket}.s3-website-us-east-1.amazonaws.com"))
    }

    async fn set_public_read_policy(&self, _bucket: &str) -> Result<()> {
        self.0.enter("s3.set_public_read_policy")
    }

    async fn tag(&self, _bucket: &str, _tags: &BTreeMap<String, String>) -> Result<()> {
        self.0.enter("s3.tag")
    }

    async fn put_object(&self, bucket: &str, object: &ObjectUpload) -> Result<()> {
        self.0.enter("s3.put_object")?;
        let mut world = self.0.world();
        if world.failing_keys.contains(&object.key) {
            return Err(CloudError::AccessDenied(object.key.clone()));
        }
        world
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(object.key.clone());
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()> {
        self.0.enter("s3.delete_objects")?;
        let mut world = self.0.world();
        if let Some(objects) = world.buckets.get_mut(bucket) {
            for key in keys {
                objects.remove(key);
            }
        }
        Ok(())
    }

    async fn delete(&self, bucket: &str) -> Result<()> {
        self.0.enter("s3.delete")?;
        self.0.snapshot("s3.delete");
        match self.0.world().buckets.remove(bucket) {
            Some(_) => Ok(()),
            None => Err(CloudError::ApiError("NoSuchBucket".into())),
        }
    }
}

pub struct FakeCdn(FakeCloud);

#[async_trait]
impl CdnManager for FakeCdn {
    async fn exists(&self, distribution_id: &str) -> Result<bool> {
        self.0.enter("cdn.exists")?;
        Ok(self.0.world().distributions.contains_key(distribution_id))
    }

    async fn get(&self, distribution_id: &str) -> Result<Option<DistributionInfo>> {
        self.0.enter("cdn.get")?;
        Ok(self.0.world().distributions.get(distribution_id).cloned())
    }

    async fn create(&self, spec: &DistributionSpec) -> Result<DistributionInfo> {
        self.0.enter("cdn.create")?;
        let mut world = self.0.world();
        let n = world.next_id();
        let info = DistributionInfo {
            id: format!("E{n}"),
            domain_name: format!("d{n}.cloudfront.net"),
            status: "InProgress".to_string(),
            enabled: true,
            aliases: spec.aliases.clone(),
            certificate_arn: spec.certificate_arn.clone(),
        };
        world.distributions.insert(info.id.clone(), info.clone());
        Ok(info)
    }

    async fn update(
        &self,
        distribution_id: &str,
        update: &DistributionUpdate,
    ) -> Result<DistributionInfo> {
        self.0.enter("cdn.update")?;
        let mut world = self.0.world();
        let info = world
            .distributions
            .get_mut(distribution_id)
            .ok_or_else(|| CloudError::ApiError("NoSuchDistribution".into()))?;
        if let Some(enabled) = update.enabled {
            info.enabled = enabled;
        }
        if let Some(aliases) = &update.aliases {
            info.aliases = aliases.clone();
        }
        if let Some(arn) = &update.certificate_arn {
            info.certificate_arn = Some(arn.clone());
        }
        info.status = "InProgress".to_string();
        Ok(info.clone())
    }

    async fn wait_until_deployed(&self, distribution_id: &str) -> Result<()> {
        self.0.enter("cdn.wait_until_deployed")?;
        if let Some(info) = self.0.world().distributions.get_mut(distribution_id) {
            info.status = "Deployed".to_string();
        }
        Ok(())
    }

    async fn invalidate(&self, _distribution_id: &str, _paths: &[String]) -> Result<String> {
        self.0.enter("cdn.invalidate")?;
        let n = self.0.world().next_id();
        Ok(format!("I{n}"))
    }

    async fn delete(&self, distribution_id: &str) -> Result<()> {
        self.0.enter("cdn.delete")?;
        self.0.snapshot("cdn.delete");
        let mut world = self.0.world();
        let deletable = match world.distributions.get(distribution_id) {
            None => return Err(CloudError::ApiError("NoSuchDistribution".into())),
            Some(info) => !info.enabled && info.is_deployed(),
        };
        if !deletable {
            return Err(CloudError::ApiError("DistributionNotDisabled".into()));
        }
        world.distributions.remove(distribution_id);
        Ok(())
    }
}

pub struct FakeCertificates(FakeCloud);

#[async_trait]
impl CertificateManager for FakeCertificates {
    async fn find(&self, domain: &str) -> Result<Option<CertificateState>> {
        self.0.enter("acm.find")?;
        Ok(self
            .0
            .world()
            .certificates
            .values()
            .find(|c| c.domain_name == domain)
            .cloned())
    }

    async fn request(
        &self,
        domain: &str,
        _alternative_names: &[String],
    ) -> Result<CertificateState> {
        self.0.enter("acm.request")?;
        let mut world = self.0.world();
        let n = world.next_id();
        let certificate = CertificateState {
            certificate_arn: format!("arn:aws:acm:us-east-1:000000000000:certificate/{n}"),
            domain_name: domain.to_string(),
            validation_method: "DNS".to_string(),
            status: Some("PENDING_VALIDATION".to_string()),
        };
        world
            .certificates
            .insert(certificate.certificate_arn.clone(), certificate.clone());
        Ok(certificate)
    }

    async fn delete(&self, certificate_arn: &str) -> Result<()> {
        self.0.enter("acm.delete")?;
        self.0.snapshot("acm.delete");
        match self.0.world().certificates.remove(certificate_arn) {
            Some(_) => Ok(()),
            None => Err(CloudError::ApiError("ResourceNotFoundException".into())),
        }
    }
}

pub struct FakeDns(FakeCloud);

#[async_trait]
impl DnsManager for FakeDns {
    async fn find_zone(&self, domain: &str) -> Result<Option<String>> {
        self.0.enter("dns.find_zone")?;
        Ok(self
            .0
            .world()
            .zones
            .iter()
            .find(|(_, (d, _))| d == domain)
            .map(|(id, _)| id.clone()))
    }

    async fn create_zone(&self, domain: &str) -> Result<String> {
        self.0.enter("dns.create_zone")?;
        let mut world = self.0.world();
        let id = format!("Z{}", world.next_id());
        world
            .zones
            .insert(id.clone(), (domain.to_string(), Vec::new()));
        Ok(id)
    }

    async fn change_records(&self, zone_id: &str, changes: &[RecordChange]) -> Result<()> {
        self.0.enter("dns.change_records")?;
        let mut world = self.0.world();
        let (_, records) = world
            .zones
            .get_mut(zone_id)
            .ok_or_else(|| CloudError::ApiError("NoSuchHostedZone".into()))?;
        // The whole batch is rejected when a delete targets an absent record
        let missing = changes.iter().any(|change| {
            change.action == RecordAction::Delete
                && !records.iter().any(|r| {
                    r.name == change.record.name && r.record_type == change.record.record_type
                })
        });
        if missing {
            return Err(CloudError::ApiError(
                "InvalidChangeBatch: Tried to delete resource record set but it was not found"
                    .into(),
            ));
        }
        for change in changes {
            records.retain(|r| {
                r.name != change.record.name || r.record_type != change.record.record_type
            });
            if change.action == RecordAction::Upsert {
                records.push(change.record.clone());
            }
        }
        Ok(())
    }

    async fn delete_zone(&self, zone_id: &str) -> Result<()> {
        self.0.enter("dns.delete_zone")?;
        self.0.snapshot("dns.delete_zone");
        match self.0.world().zones.remove(zone_id) {
            Some(_) => Ok(()),
            None => Err(CloudError::ApiError("NoSuchHostedZone".into())),
        }
    }
}

/// Collects observer callbacks as strings
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl DeployObserver for RecordingObserver {
    fn file_uploaded(&self, path: &str, result: std::result::Result<(), &CloudError>) {
        let status = if result.is_ok() { "ok" } else { "failed" };
        self.push(format!("upload {path} {status}"));
    }

    fn files_deleted(&self, paths: &[String]) {
        self.push(format!("deleted {}", paths.len()));
    }

    fn retrying(&self, operation: &str, attempt: u32, _error: &CloudError, _delay: Duration) {
        self.push(format!("retry {operation} {attempt}"));
    }

    fn resource_ready(&self, kind: ResourceKind, outcome: Provisioned) {
        self.push(format!("ready {} {:?}", kind.key(), outcome));
    }

    fn resource_removed(&self, kind: ResourceKind) {
        self.push(format!("removed {}", kind.key()));
    }
}

/// Retries with millisecond delays
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        backoff_multiplier: 2.0,
    }
}

/// Write `files` (relative path, content) under `root`
pub fn write_site(root: &Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }
}
