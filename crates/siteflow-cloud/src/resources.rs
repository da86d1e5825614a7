//! Resource lifecycle tracking
//!
//! A deployment owns at most one resource of each kind. The state records
//! only the identifiers needed to address a resource again later; provider
//! response payloads are never stored.

use crate::state::DeploymentState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The four managed resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ObjectStore,
    Cdn,
    Certificate,
    DnsZone,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::ObjectStore,
        ResourceKind::Cdn,
        ResourceKind::Certificate,
        ResourceKind::DnsZone,
    ];

    /// Removal order. The distribution references both the certificate and
    /// the origin bucket, so it goes first; DNS goes last.
    pub const TEARDOWN_ORDER: [ResourceKind; 4] = [
        ResourceKind::Cdn,
        ResourceKind::Certificate,
        ResourceKind::ObjectStore,
        ResourceKind::DnsZone,
    ];

    /// Key used in the state file
    pub fn key(&self) -> &'static str {
        match self {
            ResourceKind::ObjectStore => "s3",
            ResourceKind::Cdn => "cloudfront",
            ResourceKind::Certificate => "acm",
            ResourceKind::DnsZone => "route53",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::ObjectStore => write!(f, "object store"),
            ResourceKind::Cdn => write!(f, "CDN distribution"),
            ResourceKind::Certificate => write!(f, "certificate"),
            ResourceKind::DnsZone => write!(f, "DNS zone"),
        }
    }
}

/// Object storage bucket serving the site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketState {
    pub bucket_name: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// CDN distribution in front of the bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionState {
    pub distribution_id: String,
    pub domain_name: String,
    pub distribution_url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

/// TLS certificate attached to the distribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateState {
    pub certificate_arn: String,
    pub domain_name: String,
    pub validation_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// A DNS record created for the site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub value: String,
}

impl DnsRecord {
    pub fn new(
        name: impl Into<String>,
        record_type: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            record_type: record_type.into(),
            value: value.into(),
        }
    }
}

/// Hosted zone and the records created in it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsZoneState {
    pub hosted_zone_id: String,
    pub domain: String,
    #[serde(default)]
    pub records: Vec<DnsRecord>,
}

/// State of one resource, tagged by kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    ObjectStore(BucketState),
    Cdn(DistributionState),
    Certificate(CertificateState),
    DnsZone(DnsZoneState),
}

impl ResourceState {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceState::ObjectStore(_) => ResourceKind::ObjectStore,
            ResourceState::Cdn(_) => ResourceKind::Cdn,
            ResourceState::Certificate(_) => ResourceKind::Certificate,
            ResourceState::DnsZone(_) => ResourceKind::DnsZone,
        }
    }

    /// Required identifier fields that are empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let required: Vec<(&'static str, &str)> = match self {
            ResourceState::ObjectStore(s) => {
                vec![("bucketName", &s.bucket_name), ("region", &s.region)]
            }
            ResourceState::Cdn(s) => vec![
                ("distributionId", &s.distribution_id),
                ("domainName", &s.domain_name),
                ("distributionUrl", &s.distribution_url),
            ],
            ResourceState::Certificate(s) => vec![
                ("certificateArn", &s.certificate_arn),
                ("domainName", &s.domain_name),
                ("validationMethod", &s.validation_method),
            ],
            ResourceState::DnsZone(s) => {
                vec![("hostedZoneId", &s.hosted_zone_id), ("domain", &s.domain)]
            }
        };
        required
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect()
    }
}

/// Per-kind resource map as persisted in the state file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    #[serde(rename = "s3", default, skip_serializing_if = "Option::is_none")]
    pub object_store: Option<BucketState>,
    #[serde(rename = "cloudfront", default, skip_serializing_if = "Option::is_none")]
    pub cdn: Option<DistributionState>,
    #[serde(rename = "acm", default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<CertificateState>,
    #[serde(rename = "route53", default, skip_serializing_if = "Option::is_none")]
    pub dns_zone: Option<DnsZoneState>,
}

/// Outcome of an idempotent create-or-confirm call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provisioned {
    Created,
    AlreadyExisted,
    Updated,
}

impl std::fmt::Display for Provisioned {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provisioned::Created => write!(f, "created"),
            Provisioned::AlreadyExisted => write!(f, "already present"),
            Provisioned::Updated => write!(f, "updated"),
        }
    }
}

/// A present resource with an empty required field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIssue {
    pub kind: ResourceKind,
    pub field: &'static str,
}

impl std::fmt::Display for ResourceIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}) is missing `{}`", self.kind, self.kind.key(), self.field)
    }
}

impl DeploymentState {
    /// Record `resource`, replacing any previous entry of the same kind.
    pub fn with_resource(mut self, resource: ResourceState) -> Self {
        match resource {
            ResourceState::ObjectStore(s) => self.resources.object_store = Some(s),
            ResourceState::Cdn(s) => self.resources.cdn = Some(s),
            ResourceState::Certificate(s) => self.resources.certificate = Some(s),
            ResourceState::DnsZone(s) => self.resources.dns_zone = Some(s),
        }
        self
    }

    /// Forget the resource of `kind`. Absent kinds are left as they are.
    pub fn without_resource(mut self, kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::ObjectStore => self.resources.object_store = None,
            ResourceKind::Cdn => self.resources.cdn = None,
            ResourceKind::Certificate => self.resources.certificate = None,
            ResourceKind::DnsZone => self.resources.dns_zone = None,
        }
        self
    }

    pub fn resource(&self, kind: ResourceKind) -> Option<ResourceState> {
        match kind {
            ResourceKind::ObjectStore => self
                .resources
                .object_store
                .clone()
                .map(ResourceState::ObjectStore),
            ResourceKind::Cdn => self.resources.cdn.clone().map(ResourceState::Cdn),
            ResourceKind::Certificate => self
                .resources
                .certificate
                .clone()
                .map(ResourceState::Certificate),
            ResourceKind::DnsZone => self.resources.dns_zone.clone().map(ResourceState::DnsZone),
        }
    }

    pub fn has_resource(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::ObjectStore => self.resources.object_store.is_some(),
            ResourceKind::Cdn => self.resources.cdn.is_some(),
            ResourceKind::Certificate => self.resources.certificate.is_some(),
            ResourceKind::DnsZone => self.resources.dns_zone.is_some(),
        }
    }

    pub fn has_any_resource(&self) -> bool {
        ResourceKind::ALL.iter().any(|k| self.has_resource(*k))
    }

    /// Kinds currently recorded, in declaration order
    pub fn resource_kinds(&self) -> Vec<ResourceKind> {
        ResourceKind::ALL
            .into_iter()
            .filter(|k| self.has_resource(*k))
            .collect()
    }

    /// True once nothing is tracked and the state file can be removed
    pub fn is_disposable(&self) -> bool {
        !self.has_any_resource() && self.files.is_empty()
    }

    pub fn bucket(&self) -> Option<&BucketState> {
        self.resources.object_store.as_ref()
    }

    pub fn distribution(&self) -> Option<&DistributionState> {
        self.resources.cdn.as_ref()
    }

    pub fn certificate(&self) -> Option<&CertificateState> {
        self.resources.certificate.as_ref()
    }

    pub fn dns_zone(&self) -> Option<&DnsZoneState> {
        self.resources.dns_zone.as_ref()
    }

    /// Check present resources for empty identifiers.
    ///
    /// Advisory only; reads and writes never call this.
    pub fn validate_resources(&self) -> Vec<ResourceIssue> {
        ResourceKind::ALL
            .into_iter()
            .filter_map(|kind| self.resource(kind))
            .flat_map(|resource| {
                let kind = resource.kind();
                resource
                    .missing_fields()
                    .into_iter()
                    .map(move |field| ResourceIssue { kind, field })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket() -> BucketState {
        BucketState {
            bucket_name: "my-site".into(),
            region: "us-east-1".into(),
            website_url: Some("http://my-site.s3-website-us-east-1.amazonaws.com".into()),
            tags: BTreeMap::new(),
        }
    }

    fn distribution() -> DistributionState {
        DistributionState {
            distribution_id: "E123".into(),
            domain_name: "d111.cloudfront.net".into(),
            distribution_url: "https://d111.cloudfront.net".into(),
            aliases: vec!["example.com".into()],
        }
    }

    #[test]
    fn test_set_get_has() {
        let state = DeploymentState::new("site", "default");
        assert!(!state.has_resource(ResourceKind::ObjectStore));

        let state = state.with_resource(ResourceState::ObjectStore(bucket()));
        assert!(state.has_resource(ResourceKind::ObjectStore));
        assert_eq!(state.bucket(), Some(&bucket()));
        assert_eq!(
            state.resource(ResourceKind::ObjectStore),
            Some(ResourceState::ObjectStore(bucket()))
        );
        assert_eq!(state.resource(ResourceKind::Cdn), None);
    }

    #[test]
    fn test_update_overwrites_entire_entry() {
        let state = DeploymentState::new("site", "default")
            .with_resource(ResourceState::Cdn(distribution()));

        let replacement = DistributionState {
            aliases: vec![],
            ..distribution()
        };
        let state = state.with_resource(ResourceState::Cdn(replacement.clone()));
        assert_eq!(state.distribution(), Some(&replacement));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let state = DeploymentState::new("site", "default")
            .with_resource(ResourceState::ObjectStore(bucket()));
        let before = state.clone();

        let after = state.without_resource(ResourceKind::DnsZone);
        assert_eq!(after, before);
    }

    #[test]
    fn test_has_any_resource_and_disposable() {
        let state = DeploymentState::new("site", "default");
        assert!(!state.has_any_resource());
        assert!(state.is_disposable());

        let state = state.with_resource(ResourceState::Cdn(distribution()));
        assert!(state.has_any_resource());
        assert!(!state.is_disposable());

        let mut state = state.without_resource(ResourceKind::Cdn);
        state.files.insert("index.html".into(), "abc".into());
        assert!(!state.has_any_resource());
        assert!(!state.is_disposable());
    }

    #[test]
    fn test_validate_reports_empty_identifiers() {
        let broken = BucketState {
            bucket_name: String::new(),
            ..bucket()
        };
        let state = DeploymentState::new("site", "default")
            .with_resource(ResourceState::ObjectStore(broken))
            .with_resource(ResourceState::Cdn(distribution()));

        let issues = state.validate_resources();
        assert_eq!(
            issues,
            vec![ResourceIssue {
                kind: ResourceKind::ObjectStore,
                field: "bucketName"
            }]
        );
    }

    #[test]
    fn test_resource_kinds_and_keys() {
        let state = DeploymentState::new("site", "default")
            .with_resource(ResourceState::DnsZone(DnsZoneState {
                hosted_zone_id: "Z1".into(),
                domain: "example.com".into(),
                records: vec![DnsRecord::new("example.com", "A", "d111.cloudfront.net")],
            }))
            .with_resource(ResourceState::ObjectStore(bucket()));
        assert_eq!(
            state.resource_kinds(),
            vec![ResourceKind::ObjectStore, ResourceKind::DnsZone]
        );
        assert_eq!(ResourceKind::DnsZone.key(), "route53");
        assert_eq!(ResourceKind::TEARDOWN_ORDER[0], ResourceKind::Cdn);
    }
}
