//! Collaborator interfaces for the cloud surfaces the steps touch.
//!
//! Real implementations wrap the cloud SDKs and are injected as
//! `Arc<dyn _>`; tests inject in-memory fakes. Every list-style call pages
//! to completion inside the implementation, so callers never see a cursor.

use async_trait::async_trait;

use armada_core::version::AddonCatalogEntry;

use crate::Result;

/// Terminal-good status for clusters, nodegroups and addons.
pub const ACTIVE_STATUS: &str = "ACTIVE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInfo {
    pub name: String,
    pub version: String,
    pub status: String,
    pub platform_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodegroupInfo {
    pub name: String,
    pub status: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddonInfo {
    pub name: String,
    pub version: String,
    pub status: String,
    pub service_account_role_arn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FargateProfileInfo {
    pub name: String,
    pub status: String,
    /// Namespaces named by the profile's pod selectors.
    pub namespaces: Vec<String>,
}

/// One upgrade-readiness insight as listed for a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightSummary {
    pub id: String,
    pub name: String,
}

/// Full insight detail, already narrowed to the deprecation findings the
/// readiness report cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightDetail {
    pub status: Option<String>,
    pub recommendation: Option<String>,
    pub deprecations: Vec<DeprecatedApiUsage>,
}

/// One deprecated API usage inside an insight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprecatedApiUsage {
    /// Resource path such as `/apis/policy/v1beta1/podsecuritypolicies`.
    pub usage: String,
    pub replaced_with: Option<String>,
    pub since_version: Option<String>,
    pub stop_version: Option<String>,
    /// Request counts over the last 30 days, one entry per client.
    pub client_requests_last_30_days: Vec<u64>,
}

/// EKS-like control-plane surface, scoped to one account and region.
#[async_trait]
pub trait ClusterProvider: Send + Sync {
    async fn list_clusters(&self) -> Result<Vec<String>>;
    async fn describe_cluster(&self, cluster: &str) -> Result<ClusterInfo>;

    async fn list_nodegroups(&self, cluster: &str) -> Result<Vec<String>>;
    async fn describe_nodegroup(&self, cluster: &str, nodegroup: &str) -> Result<NodegroupInfo>;

    async fn list_addons(&self, cluster: &str) -> Result<Vec<String>>;
    async fn describe_addon(&self, cluster: &str, addon: &str) -> Result<AddonInfo>;
    /// Version catalog for an addon against a Kubernetes version.
    async fn addon_versions(
        &self,
        addon: &str,
        kubernetes_version: &str,
    ) -> Result<Vec<AddonCatalogEntry>>;

    /// Upgrade-readiness insights for the cluster, filtered to the versions
    /// on the path to `kubernetes_version`.
    async fn list_insights(
        &self,
        cluster: &str,
        kubernetes_version: &str,
    ) -> Result<Vec<InsightSummary>>;
    async fn describe_insight(&self, cluster: &str, insight_id: &str) -> Result<InsightDetail>;

    async fn list_fargate_profiles(&self, cluster: &str) -> Result<Vec<String>>;
    async fn describe_fargate_profile(
        &self,
        cluster: &str,
        profile: &str,
    ) -> Result<FargateProfileInfo>;
}

/// S3-like durable storage for reports and backup bucket policies.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload_file(&self, local: &std::path::Path, bucket: &str, key: &str) -> Result<()>;
    async fn get_bucket_policy(&self, bucket: &str) -> Result<Option<String>>;
    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<()>;
}

/// STS-like identity surface.
#[async_trait]
pub trait Identity: Send + Sync {
    async fn caller_account_id(&self) -> Result<String>;
}

/// True when velero cannot work on this cluster: it runs compute exclusively
/// on Fargate and no profile selects the velero namespace.
pub async fn fargate_blocks_velero(
    provider: &dyn ClusterProvider,
    cluster: &str,
    velero_namespace: &str,
) -> Result<bool> {
    if !provider.list_nodegroups(cluster).await?.is_empty() {
        return Ok(false);
    }
    let profiles = provider.list_fargate_profiles(cluster).await?;
    if profiles.is_empty() {
        // Self-managed nodes only; nothing for the guard to say.
        return Ok(false);
    }
    for profile in profiles {
        let info = provider.describe_fargate_profile(cluster, &profile).await?;
        if info.namespaces.iter().any(|ns| ns == velero_namespace) {
            return Ok(false);
        }
    }
    Ok(true)
}
