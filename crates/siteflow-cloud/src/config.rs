//! Deploy and teardown configuration

use crate::hash::DEFAULT_EXCLUDES;
use crate::retry::RetryPolicy;
use crate::state::DEFAULT_ENVIRONMENT;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_REGION: &str = "us-east-1";

fn default_environment() -> String {
    DEFAULT_ENVIRONMENT.to_string()
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_index_document() -> String {
    "index.html".to_string()
}

fn default_error_document() -> String {
    "404.html".to_string()
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_excludes() -> Vec<String> {
    DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect()
}

/// CDN settings; present means a distribution is managed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdnConfig {
    /// Custom domain served by the distribution; requests a certificate
    #[serde(default)]
    pub custom_domain: Option<String>,

    /// Extra names on the certificate and distribution
    #[serde(default)]
    pub alternative_names: Vec<String>,

    /// Invalidate `/*` after deploys that changed files
    #[serde(default = "default_true")]
    pub invalidate: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            custom_domain: None,
            alternative_names: Vec::new(),
            invalidate: true,
        }
    }
}

impl CdnConfig {
    pub fn with_domain(domain: impl Into<String>) -> Self {
        Self {
            custom_domain: Some(domain.into()),
            ..Self::default()
        }
    }
}

/// DNS settings; present means alias records are managed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsConfig {
    /// Apex domain of the hosted zone
    pub zone_domain: String,
}

/// Configuration of a single deploy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    pub app: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    /// Build output to publish
    pub build_dir: PathBuf,

    pub bucket_name: String,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_index_document")]
    pub index_document: String,

    #[serde(default = "default_error_document")]
    pub error_document: String,

    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    #[serde(default)]
    pub cdn: Option<CdnConfig>,

    #[serde(default)]
    pub dns: Option<DnsConfig>,

    /// Width of the upload worker pool
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_excludes")]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub retry: RetryPolicy,
}

impl DeployConfig {
    pub fn new(
        app: impl Into<String>,
        build_dir: impl Into<PathBuf>,
        bucket_name: impl Into<String>,
    ) -> Self {
        Self {
            app: app.into(),
            environment: default_environment(),
            build_dir: build_dir.into(),
            bucket_name: bucket_name.into(),
            region: default_region(),
            index_document: default_index_document(),
            error_document: default_error_document(),
            tags: BTreeMap::new(),
            cdn: None,
            dns: None,
            concurrency: DEFAULT_CONCURRENCY,
            exclude: default_excludes(),
            dry_run: false,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_cdn(mut self, cdn: CdnConfig) -> Self {
        self.cdn = Some(cdn);
        self
    }

    pub fn with_dns(mut self, zone_domain: impl Into<String>) -> Self {
        self.dns = Some(DnsConfig {
            zone_domain: zone_domain.into(),
        });
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Tags applied to the bucket: configured tags plus app/environment
    pub fn resource_tags(&self) -> BTreeMap<String, String> {
        let mut tags = self.tags.clone();
        tags.entry("app".to_string()).or_insert_with(|| self.app.clone());
        tags.entry("environment".to_string())
            .or_insert_with(|| self.environment.clone());
        tags
    }

    /// Names served by the CDN (custom domain first)
    pub fn cdn_aliases(&self) -> Vec<String> {
        let Some(cdn) = &self.cdn else {
            return Vec::new();
        };
        let mut aliases: Vec<String> = cdn.custom_domain.iter().cloned().collect();
        for name in &cdn.alternative_names {
            if !aliases.contains(name) {
                aliases.push(name.clone());
            }
        }
        aliases
    }
}

/// Which resources a teardown keeps, and how remote calls are retried
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeardownOptions {
    pub keep_distribution: bool,
    pub keep_certificate: bool,
    pub keep_bucket: bool,
    pub keep_dns: bool,
    pub dry_run: bool,
    pub retry: RetryPolicy,
}

impl TeardownOptions {
    pub fn keeps(&self, kind: crate::resources::ResourceKind) -> bool {
        use crate::resources::ResourceKind;
        match kind {
            ResourceKind::Cdn => self.keep_distribution,
            ResourceKind::Certificate => self.keep_certificate,
            ResourceKind::ObjectStore => self.keep_bucket,
            ResourceKind::DnsZone => self.keep_dns,
        }
    }
}
