//! Deploy and teardown orchestration
//!
//! Deploy: scan → diff against stored hashes → (no-change short-circuit) →
//! ensure resources → upload delta → delete orphans → persist.
//!
//! Teardown: CDN → certificate → object store → DNS, persisting after each
//! removal so an interrupted run resumes where it stopped.

use crate::changes::{FileChanges, detect_changes};
use crate::config::{DeployConfig, TeardownOptions};
use crate::error::{CloudError, Result};
use crate::hash::{LocalFile, cache_control_for, content_type_for, scan_build_output};
use crate::observer::{DeployObserver, NoopObserver};
use crate::provider::{DistributionSpec, DistributionUpdate, ObjectUpload, Providers, RecordChange};
use crate::report::{DeployReport, TeardownReport};
use crate::resources::{
    BucketState, CertificateState, DistributionState, DnsRecord, DnsZoneState, Provisioned,
    ResourceKind, ResourceState,
};
use crate::retry::{
    CDN_RETRYABLE_ERRORS, CERTIFICATE_RETRYABLE_ERRORS, DNS_RETRYABLE_ERRORS,
    OBJECT_STORE_RETRYABLE_ERRORS, RetryPolicy,
};
use crate::state::{DeploymentState, StateStore};
use futures_util::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

const DRY_RUN_ID: &str = "dry-run";

/// Stand-in hostname for resources a dry run only pretends to create
const DRY_RUN_HOST: &str = "dry-run.invalid";

/// How a teardown step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Removed,
    AlreadyGone,
}

fn tolerate_missing(result: Result<()>, what: &str) -> Result<Removal> {
    match result {
        Ok(()) => Ok(Removal::Removed),
        Err(e) if e.is_not_found() => {
            tracing::warn!("{} already gone: {}", what, e);
            Ok(Removal::AlreadyGone)
        }
        Err(e) => Err(e),
    }
}

fn same_names(a: &[String], b: &[String]) -> bool {
    let mut a: Vec<&String> = a.iter().collect();
    let mut b: Vec<&String> = b.iter().collect();
    a.sort();
    a.dedup();
    b.sort();
    b.dedup();
    a == b
}

/// Host part of a website endpoint URL
fn origin_host(url: &str) -> &str {
    let without_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    without_scheme.split('/').next().unwrap_or(without_scheme)
}

fn website_endpoint(bucket: &str, region: &str) -> String {
    format!("http://{bucket}.s3-website-{region}.amazonaws.com")
}

/// Drives deploys and teardowns for one state store
pub struct Deployer {
    store: StateStore,
    providers: Providers,
    observer: Arc<dyn DeployObserver>,
}

impl Deployer {
    pub fn new(store: StateStore, providers: Providers) -> Self {
        Self {
            store,
            providers,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn DeployObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Run a remote call under `policy`, reporting retries to the observer
    async fn call<T, F, Fut>(
        &self,
        policy: &RetryPolicy,
        operation: &str,
        retryable: &[&str],
        f: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        policy
            .run(Some(retryable), f, |attempt, err, delay| {
                self.observer.retrying(operation, attempt, err, delay)
            })
            .await
    }

    async fn persist(&self, state: DeploymentState, dry_run: bool) -> Result<DeploymentState> {
        if dry_run {
            tracing::info!("[dry-run] state not written");
            return Ok(state);
        }
        self.store.save(state).await
    }

    // ========== Deploy ==========

    /// Publish `config.build_dir`, uploading only what changed since the
    /// last recorded deploy.
    ///
    /// Per-file failures are collected in the report; the hash map keeps
    /// the previous hash for those files so the next run retries them.
    pub async fn deploy(&self, config: &DeployConfig) -> Result<DeployReport> {
        let start = Instant::now();

        if config.concurrency == 0 {
            return Err(CloudError::InvalidConfig(
                "upload concurrency must be at least 1".to_string(),
            ));
        }
        config.retry.validate().map_err(CloudError::InvalidConfig)?;
        if !config.build_dir.is_dir() {
            return Err(CloudError::BuildOutputNotFound(config.build_dir.clone()));
        }
        let manifest = scan_build_output(config.build_dir.clone(), config.exclude.clone()).await?;
        if manifest.is_empty() {
            return Err(CloudError::NoFilesToDeploy(config.build_dir.clone()));
        }

        let mut state = self
            .store
            .get_or_create(&config.app, &config.environment)
            .await?;
        match state.bucket().map(|b| b.bucket_name.clone()) {
            Some(recorded) if recorded != config.bucket_name => {
                return Err(CloudError::InvalidConfig(format!(
                    "environment '{}' is deployed to bucket '{}'; tear it down before switching to '{}'",
                    config.environment, recorded, config.bucket_name
                )));
            }
            None if !state.files.is_empty() => {
                tracing::warn!(
                    environment = %config.environment,
                    files = state.files.len(),
                    "No bucket recorded, discarding stale file hashes"
                );
                state.files.clear();
            }
            _ => {}
        }
        let changes = detect_changes(&manifest, &state.files);

        let mut report = DeployReport::new(&config.environment, config.dry_run);
        report.stats = changes.stats();

        if changes.is_empty() {
            tracing::info!(
                environment = %config.environment,
                files = manifest.len(),
                "No changes detected, skipping deploy"
            );
            report.no_changes = true;
            report.skipped = manifest.iter().map(|f| f.path.clone()).collect();
            report.duration_ms = start.elapsed().as_millis() as u64;
            return Ok(report);
        }

        tracing::info!(environment = %config.environment, "Deploying: {}", changes);

        // Each resource is recorded as soon as it exists so a later failure
        // leaves it discoverable by teardown.
        let state = self.ensure_bucket(config, state, &mut report).await?;
        let mut state = self.persist(state, config.dry_run).await?;
        if config.cdn.is_some() {
            state = self.ensure_certificate(config, state, &mut report).await?;
            state = self.persist(state, config.dry_run).await?;
            state = self.ensure_distribution(config, state, &mut report).await?;
            state = self.persist(state, config.dry_run).await?;
        }
        if config.dns.is_some() {
            state = self.ensure_dns(config, state, &mut report).await?;
            state = self.persist(state, config.dry_run).await?;
        }

        let files = self.sync_files(config, &manifest, &changes, &state, &mut report).await;

        if let Some(distribution) = state.distribution()
            && config.cdn.as_ref().is_some_and(|c| c.invalidate)
            && (!report.uploaded.is_empty() || !report.deleted.is_empty())
        {
            self.invalidate(config, distribution, &mut report).await;
        }

        self.persist(state.with_files(files), config.dry_run).await?;

        report.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(environment = %config.environment, "Deploy finished: {}", report);
        Ok(report)
    }

    /// Upload the delta and delete orphans, returning the new hash map.
    async fn sync_files(
        &self,
        config: &DeployConfig,
        manifest: &[LocalFile],
        changes: &FileChanges,
        state: &DeploymentState,
        report: &mut DeployReport,
    ) -> crate::hash::FileHashMap {
        let mut files = state.files.clone();

        let to_upload = changes.files_to_upload(manifest);
        for (file, result) in self.upload_files(config, &to_upload).await {
            match result {
                Ok(()) => {
                    files.insert(file.path.clone(), file.hash.clone());
                    report.uploaded.push(file.path.clone());
                }
                Err(e) => report.add_failure(&file.path, e),
            }
        }
        report.skipped = changes
            .unchanged
            .iter()
            .map(|c| c.path().to_string())
            .collect();

        let to_delete = changes.paths_to_delete();
        if !to_delete.is_empty() {
            match self.delete_remote(config, &to_delete).await {
                Ok(()) => {
                    for path in &to_delete {
                        files.remove(path);
                    }
                    self.observer.files_deleted(&to_delete);
                    report.deleted = to_delete;
                }
                Err(e) => {
                    tracing::warn!(count = to_delete.len(), "Failed to delete remote files: {}", e);
                    let message = e.to_string();
                    for path in to_delete {
                        report.add_failure(path, &message);
                    }
                }
            }
        }

        files
    }

    /// Upload `files` through a bounded pool; every file gets a result.
    async fn upload_files<'a>(
        &self,
        config: &DeployConfig,
        files: &[&'a LocalFile],
    ) -> Vec<(&'a LocalFile, Result<()>)> {
        let store = &self.providers.object_store;
        let bucket = config.bucket_name.as_str();
        let retry = &config.retry;

        let mut uploads = stream::iter(files.iter().copied())
            .map(|file| async move {
                let object = ObjectUpload {
                    key: file.path.clone(),
                    source: file.absolute_path.clone(),
                    content_type: content_type_for(&file.path),
                    cache_control: cache_control_for(&file.path).to_string(),
                };
                let result = if config.dry_run {
                    tracing::info!("[dry-run] would upload {}", file.path);
                    Ok(())
                } else {
                    let object = &object;
                    self.call(retry, "put_object", OBJECT_STORE_RETRYABLE_ERRORS, move || {
                        store.put_object(bucket, object)
                    })
                    .await
                };
                (file, result)
            })
            .buffer_unordered(config.concurrency);

        let mut results = Vec::with_capacity(files.len());
        while let Some((file, result)) = uploads.next().await {
            self.observer
                .file_uploaded(&file.path, result.as_ref().map(|_| ()));
            results.push((file, result));
        }
        results
    }

    async fn delete_remote(&self, config: &DeployConfig, keys: &[String]) -> Result<()> {
        if config.dry_run {
            tracing::info!("[dry-run] would delete {} remote files", keys.len());
            return Ok(());
        }
        let store = &self.providers.object_store;
        let bucket = config.bucket_name.as_str();
        self.call(
            &config.retry,
            "delete_objects",
            OBJECT_STORE_RETRYABLE_ERRORS,
            move || store.delete_objects(bucket, keys),
        )
        .await
    }

    async fn invalidate(
        &self,
        config: &DeployConfig,
        distribution: &DistributionState,
        report: &mut DeployReport,
    ) {
        if config.dry_run {
            report.invalidation_id = Some(DRY_RUN_ID.to_string());
            return;
        }
        let cdn = &self.providers.cdn;
        let id = distribution.distribution_id.as_str();
        let paths = vec!["/*".to_string()];
        let paths = &paths;
        match self
            .call(&config.retry, "invalidate", CDN_RETRYABLE_ERRORS, move || {
                cdn.invalidate(id, paths)
            })
            .await
        {
            Ok(invalidation_id) => {
                tracing::info!(distribution = id, invalidation = %invalidation_id, "Requested cache invalidation");
                report.invalidation_id = Some(invalidation_id);
            }
            Err(e) => {
                tracing::warn!(distribution = id, "Cache invalidation failed: {}", e);
                report.invalidation_error = Some(e.to_string());
            }
        }
    }

    /// Create the bucket if needed, then reconcile hosting, policy and tags.
    pub async fn ensure_bucket(
        &self,
        config: &DeployConfig,
        state: DeploymentState,
        report: &mut DeployReport,
    ) -> Result<DeploymentState> {
        let store = &self.providers.object_store;
        let bucket = config.bucket_name.as_str();
        let region = config.region.as_str();
        let retry = &config.retry;
        let vocab = OBJECT_STORE_RETRYABLE_ERRORS;

        let exists = self
            .call(retry, "bucket_exists", vocab, move || store.exists(bucket))
            .await?;

        let outcome = if exists {
            tracing::debug!(bucket, "Bucket already exists, reconciling configuration");
            Provisioned::AlreadyExisted
        } else if config.dry_run {
            tracing::info!(bucket, "[dry-run] would create bucket");
            Provisioned::Created
        } else {
            match self
                .call(retry, "create_bucket", vocab, move || store.create(bucket, region))
                .await
            {
                Ok(()) => {
                    tracing::info!(bucket, region, "Created bucket");
                    Provisioned::Created
                }
                Err(e) if e.is_already_owned() => {
                    tracing::debug!(bucket, "Bucket already owned");
                    Provisioned::AlreadyExisted
                }
                Err(e) => return Err(e),
            }
        };

        let tags = config.resource_tags();
        let website_url = if config.dry_run {
            website_endpoint(bucket, region)
        } else {
            let index = config.index_document.as_str();
            let error = config.error_document.as_str();
            let url = self
                .call(retry, "configure_website", vocab, move || {
                    store.configure_website(bucket, index, error)
                })
                .await?;
            self.call(retry, "set_public_read_policy", vocab, move || {
                store.set_public_read_policy(bucket)
            })
            .await?;
            let tags = &tags;
            self.call(retry, "tag_bucket", vocab, move || store.tag(bucket, tags))
                .await?;
            url
        };

        self.observer.resource_ready(ResourceKind::ObjectStore, outcome);
        report.add_resource(ResourceKind::ObjectStore, outcome);

        Ok(state.with_resource(ResourceState::ObjectStore(BucketState {
            bucket_name: bucket.to_string(),
            region: region.to_string(),
            website_url: Some(website_url),
            tags,
        })))
    }

    /// Find or request the certificate for the custom domain, if any.
    pub async fn ensure_certificate(
        &self,
        config: &DeployConfig,
        state: DeploymentState,
        report: &mut DeployReport,
    ) -> Result<DeploymentState> {
        let Some(domain) = config.cdn.as_ref().and_then(|c| c.custom_domain.as_deref()) else {
            return Ok(state);
        };
        let certificates = &self.providers.certificates;
        let retry = &config.retry;
        let vocab = CERTIFICATE_RETRYABLE_ERRORS;

        let found = self
            .call(retry, "find_certificate", vocab, move || certificates.find(domain))
            .await?;

        let (certificate, outcome) = match found {
            Some(existing) => (existing, Provisioned::AlreadyExisted),
            None if config.dry_run => {
                tracing::info!(domain, "[dry-run] would request certificate");
                (
                    CertificateState {
                        certificate_arn: DRY_RUN_ID.to_string(),
                        domain_name: domain.to_string(),
                        validation_method: "DNS".to_string(),
                        status: None,
                    },
                    Provisioned::Created,
                )
            }
            None => {
                let alternative_names: Vec<String> = config
                    .cdn_aliases()
                    .into_iter()
                    .filter(|name| name != domain)
                    .collect();
                let alternative_names = &alternative_names;
                let requested = self
                    .call(retry, "request_certificate", vocab, move || {
                        certificates.request(domain, alternative_names)
                    })
                    .await?;
                tracing::info!(domain, arn = %requested.certificate_arn, "Requested certificate");
                (requested, Provisioned::Created)
            }
        };

        self.observer.resource_ready(ResourceKind::Certificate, outcome);
        report.add_resource(ResourceKind::Certificate, outcome);
        Ok(state.with_resource(ResourceState::Certificate(certificate)))
    }

    /// Confirm the recorded distribution or create a new one.
    pub async fn ensure_distribution(
        &self,
        config: &DeployConfig,
        state: DeploymentState,
        report: &mut DeployReport,
    ) -> Result<DeploymentState> {
        let cdn = &self.providers.cdn;
        let retry = &config.retry;
        let vocab = CDN_RETRYABLE_ERRORS;
        let aliases = config.cdn_aliases();
        let certificate_arn = state.certificate().map(|c| c.certificate_arn.clone());

        if let Some(recorded) = state.distribution() {
            let id = recorded.distribution_id.as_str();
            match self.call(retry, "get_distribution", vocab, move || cdn.get(id)).await? {
                Some(info)
                    if same_names(&info.aliases, &aliases)
                        && (certificate_arn.is_none() || info.certificate_arn == certificate_arn) =>
                {
                    let distribution = info.to_state();
                    self.observer
                        .resource_ready(ResourceKind::Cdn, Provisioned::AlreadyExisted);
                    report.add_resource(ResourceKind::Cdn, Provisioned::AlreadyExisted);
                    return Ok(state.with_resource(ResourceState::Cdn(distribution)));
                }
                Some(info) => {
                    let distribution = if config.dry_run {
                        tracing::info!(distribution = id, "[dry-run] would update aliases and certificate");
                        DistributionState {
                            aliases: aliases.clone(),
                            ..info.to_state()
                        }
                    } else {
                        let update = DistributionUpdate {
                            enabled: Some(true),
                            aliases: Some(aliases.clone()),
                            certificate_arn: certificate_arn.clone(),
                        };
                        let update = &update;
                        self.call(retry, "update_distribution", vocab, move || {
                            cdn.update(id, update)
                        })
                        .await?
                        .to_state()
                    };
                    self.observer
                        .resource_ready(ResourceKind::Cdn, Provisioned::Updated);
                    report.add_resource(ResourceKind::Cdn, Provisioned::Updated);
                    return Ok(state.with_resource(ResourceState::Cdn(distribution)));
                }
                None => {
                    tracing::warn!(
                        distribution = id,
                        "Recorded distribution no longer exists, creating a new one"
                    );
                }
            }
        }

        let origin = state
            .bucket()
            .and_then(|b| b.website_url.as_deref())
            .map(|url| origin_host(url).to_string())
            .unwrap_or_else(|| {
                origin_host(&website_endpoint(&config.bucket_name, &config.region)).to_string()
            });

        let distribution = if config.dry_run {
            tracing::info!(origin = %origin, "[dry-run] would create distribution");
            DistributionState {
                distribution_id: DRY_RUN_ID.to_string(),
                domain_name: DRY_RUN_HOST.to_string(),
                distribution_url: format!("https://{DRY_RUN_HOST}"),
                aliases,
            }
        } else {
            let spec = DistributionSpec {
                origin_domain: origin,
                aliases,
                certificate_arn,
                default_root_object: config.index_document.clone(),
                comment: format!("{}-{}", config.app, config.environment),
            };
            let spec = &spec;
            let info = self
                .call(retry, "create_distribution", vocab, move || cdn.create(spec))
                .await?;
            tracing::info!(distribution = %info.id, domain = %info.domain_name, "Created distribution");
            info.to_state()
        };

        self.observer.resource_ready(ResourceKind::Cdn, Provisioned::Created);
        report.add_resource(ResourceKind::Cdn, Provisioned::Created);
        Ok(state.with_resource(ResourceState::Cdn(distribution)))
    }

    /// Find or create the hosted zone and point the CDN aliases at the
    /// distribution. Records no longer wanted are removed.
    pub async fn ensure_dns(
        &self,
        config: &DeployConfig,
        state: DeploymentState,
        report: &mut DeployReport,
    ) -> Result<DeploymentState> {
        let Some(dns_config) = &config.dns else {
            return Ok(state);
        };
        let dns = &self.providers.dns;
        let retry = &config.retry;
        let vocab = DNS_RETRYABLE_ERRORS;
        let domain = dns_config.zone_domain.as_str();

        let found = self
            .call(retry, "find_zone", vocab, move || dns.find_zone(domain))
            .await?;
        let (zone_id, mut outcome) = match found {
            Some(zone_id) => (zone_id, Provisioned::AlreadyExisted),
            None if config.dry_run => {
                tracing::info!(domain, "[dry-run] would create hosted zone");
                (DRY_RUN_ID.to_string(), Provisioned::Created)
            }
            None => {
                let zone_id = self
                    .call(retry, "create_zone", vocab, move || dns.create_zone(domain))
                    .await?;
                tracing::info!(domain, zone = %zone_id, "Created hosted zone");
                (zone_id, Provisioned::Created)
            }
        };

        let desired: Vec<DnsRecord> = match state.distribution() {
            Some(distribution) => config
                .cdn_aliases()
                .into_iter()
                .map(|alias| DnsRecord::new(alias, "A", distribution.domain_name.clone()))
                .collect(),
            None => Vec::new(),
        };
        let recorded: Vec<DnsRecord> = state
            .dns_zone()
            .filter(|z| z.hosted_zone_id == zone_id)
            .map(|z| z.records.clone())
            .unwrap_or_default();

        let mut changes: Vec<RecordChange> = recorded
            .iter()
            .filter(|r| !desired.iter().any(|d| d.name == r.name && d.record_type == r.record_type))
            .cloned()
            .map(RecordChange::delete)
            .collect();
        changes.extend(
            desired
                .iter()
                .filter(|d| !recorded.contains(d))
                .cloned()
                .map(RecordChange::upsert),
        );

        if !changes.is_empty() {
            if config.dry_run {
                tracing::info!(zone = %zone_id, changes = changes.len(), "[dry-run] would change records");
            } else {
                let zone = zone_id.as_str();
                let changes = &changes;
                self.call(retry, "change_records", vocab, move || {
                    dns.change_records(zone, changes)
                })
                .await?;
            }
            if outcome == Provisioned::AlreadyExisted {
                outcome = Provisioned::Updated;
            }
        }

        self.observer.resource_ready(ResourceKind::DnsZone, outcome);
        report.add_resource(ResourceKind::DnsZone, outcome);
        Ok(state.with_resource(ResourceState::DnsZone(DnsZoneState {
            hosted_zone_id: zone_id,
            domain: domain.to_string(),
            records: desired,
        })))
    }

    // ========== Teardown ==========

    /// Remove the environment's resources in dependency order.
    ///
    /// State is written after every removal. A failure stops the sequence
    /// and leaves the state describing what is still provisioned, so
    /// running teardown again resumes from there.
    pub async fn teardown(
        &self,
        environment: &str,
        options: &TeardownOptions,
    ) -> Result<TeardownReport> {
        let start = Instant::now();
        options.retry.validate().map_err(CloudError::InvalidConfig)?;
        let mut report = TeardownReport::new(environment, options.dry_run);

        let Some(mut state) = self.store.load(environment).await? else {
            tracing::info!(environment, "No state found, nothing to tear down");
            report.duration_ms = start.elapsed().as_millis() as u64;
            return Ok(report);
        };

        for kind in ResourceKind::TEARDOWN_ORDER {
            if !state.has_resource(kind) {
                continue;
            }
            if options.keeps(kind) {
                tracing::info!("Keeping {}", kind);
                report.kept.push(kind);
                continue;
            }

            let removal = match kind {
                ResourceKind::Cdn => self.remove_distribution(&state, options).await,
                ResourceKind::Certificate => self.remove_certificate(&state, options).await,
                ResourceKind::ObjectStore => self.remove_bucket(&state, options).await,
                ResourceKind::DnsZone => self.remove_dns(&mut state, options).await,
            };

            match removal {
                Ok(Removal::Removed) => report.removed.push(kind),
                Ok(Removal::AlreadyGone) => report.already_gone.push(kind),
                Err(e) => {
                    tracing::error!("Teardown stopped at {}: {}", kind, e);
                    return Err(CloudError::Teardown {
                        kind,
                        source: Box::new(e),
                    });
                }
            }

            state = state.without_resource(kind);
            self.observer.resource_removed(kind);
            state = self.persist(state, options.dry_run).await?;
        }

        state.files.clear();
        if state.is_disposable() {
            if options.dry_run {
                tracing::info!("[dry-run] state file would be deleted");
            } else {
                self.store.delete(environment).await?;
            }
            report.state_deleted = true;
        } else {
            self.persist(state, options.dry_run).await?;
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Disable, wait for propagation, then delete.
    async fn remove_distribution(
        &self,
        state: &DeploymentState,
        options: &TeardownOptions,
    ) -> Result<Removal> {
        let Some(recorded) = state.distribution() else {
            return Ok(Removal::AlreadyGone);
        };
        let cdn = &self.providers.cdn;
        let retry = &options.retry;
        let vocab = CDN_RETRYABLE_ERRORS;
        let id = recorded.distribution_id.as_str();

        let Some(info) = self
            .call(retry, "get_distribution", vocab, move || cdn.get(id))
            .await?
        else {
            tracing::warn!(distribution = id, "Distribution already gone");
            return Ok(Removal::AlreadyGone);
        };

        if options.dry_run {
            tracing::info!(distribution = id, "[dry-run] would disable and delete distribution");
            return Ok(Removal::Removed);
        }

        if info.enabled {
            tracing::info!(distribution = id, "Disabling distribution");
            let update = DistributionUpdate {
                enabled: Some(false),
                ..Default::default()
            };
            let update = &update;
            self.call(retry, "disable_distribution", vocab, move || {
                cdn.update(id, update)
            })
            .await?;
        }

        tracing::info!(distribution = id, "Waiting for distribution to deploy");
        self.call(retry, "wait_until_deployed", vocab, move || {
            cdn.wait_until_deployed(id)
        })
        .await?;

        let result = self
            .call(retry, "delete_distribution", vocab, move || cdn.delete(id))
            .await;
        tolerate_missing(result, "distribution")
    }

    async fn remove_certificate(
        &self,
        state: &DeploymentState,
        options: &TeardownOptions,
    ) -> Result<Removal> {
        let Some(recorded) = state.certificate() else {
            return Ok(Removal::AlreadyGone);
        };
        if options.dry_run {
            tracing::info!(arn = %recorded.certificate_arn, "[dry-run] would delete certificate");
            return Ok(Removal::Removed);
        }
        let certificates = &self.providers.certificates;
        let arn = recorded.certificate_arn.as_str();
        let result = self
            .call(
                &options.retry,
                "delete_certificate",
                CERTIFICATE_RETRYABLE_ERRORS,
                move || certificates.delete(arn),
            )
            .await;
        tolerate_missing(result, "certificate")
    }

    async fn remove_bucket(
        &self,
        state: &DeploymentState,
        options: &TeardownOptions,
    ) -> Result<Removal> {
        let Some(recorded) = state.bucket() else {
            return Ok(Removal::AlreadyGone);
        };
        let store = &self.providers.object_store;
        let retry = &options.retry;
        let vocab = OBJECT_STORE_RETRYABLE_ERRORS;
        let bucket = recorded.bucket_name.as_str();

        let exists = self
            .call(retry, "bucket_exists", vocab, move || store.exists(bucket))
            .await?;
        if !exists {
            tracing::warn!(bucket, "Bucket already gone");
            return Ok(Removal::AlreadyGone);
        }
        if options.dry_run {
            tracing::info!(bucket, "[dry-run] would empty and delete bucket");
            return Ok(Removal::Removed);
        }

        let result = self
            .call(retry, "delete_bucket", vocab, move || store.delete(bucket))
            .await;
        tolerate_missing(result, "bucket")
    }

    /// Delete the records created for the site, then the zone.
    ///
    /// The emptied record list is saved before the zone delete, so a retry
    /// after a failed zone delete goes straight to the zone.
    async fn remove_dns(
        &self,
        state: &mut DeploymentState,
        options: &TeardownOptions,
    ) -> Result<Removal> {
        let Some(recorded) = state.dns_zone().cloned() else {
            return Ok(Removal::AlreadyGone);
        };
        if options.dry_run {
            tracing::info!(zone = %recorded.hosted_zone_id, "[dry-run] would delete records and zone");
            return Ok(Removal::Removed);
        }
        let dns = &self.providers.dns;
        let retry = &options.retry;
        let vocab = DNS_RETRYABLE_ERRORS;
        let zone = recorded.hosted_zone_id.as_str();

        if !recorded.records.is_empty() {
            let changes: Vec<RecordChange> = recorded
                .records
                .iter()
                .cloned()
                .map(RecordChange::delete)
                .collect();
            let changes = &changes;
            let result = self
                .call(retry, "delete_records", vocab, move || {
                    dns.change_records(zone, changes)
                })
                .await;
            match result {
                Ok(()) => {}
                Err(CloudError::ApiError(msg)) if msg.contains("NoSuchHostedZone") => {
                    tracing::warn!(zone, "Hosted zone already gone");
                    return Ok(Removal::AlreadyGone);
                }
                Err(e) if e.is_not_found() => {
                    tracing::warn!(zone, "Records already gone: {}", e);
                }
                Err(e) => return Err(e),
            }

            let cleared = DnsZoneState {
                records: Vec::new(),
                ..recorded.clone()
            };
            let updated = state
                .clone()
                .with_resource(ResourceState::DnsZone(cleared));
            *state = self.store.save(updated).await?;
        }

        let result = self
            .call(retry, "delete_zone", vocab, move || dns.delete_zone(zone))
            .await;
        tolerate_missing(result, "hosted zone")
    }
}
