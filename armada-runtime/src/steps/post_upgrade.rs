//! Post-upgrade verification step.
//!
//! Re-describes the control plane, nodegroups, and addons after the upgrade
//! steps ran and writes a CSV table comparing each resource against the
//! desired version. Purely observational: nothing is mutated.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, instrument};

use armada_core::version::default_version;
use armada_core::WorkItem;

use crate::context::StepContext;
use crate::engine::Step;
use crate::providers::{BlobStore, ClusterProvider};
use crate::report::{self, patch, upload_reports};
use crate::steps::{POST_UPGRADE_STEP, UPGRADE_REPORT};
use crate::{Error, Result};

const CSV_HEADERS: [&str; 6] = [
    "CurrentClusterVersion",
    "Type",
    "Name",
    "CurrentVersion",
    "Status",
    "Message",
];

pub struct PostUpgradeStep {
    provider: Arc<dyn ClusterProvider>,
    blobs: Arc<dyn BlobStore>,
}

impl PostUpgradeStep {
    pub fn new(provider: Arc<dyn ClusterProvider>, blobs: Arc<dyn BlobStore>) -> Self {
        PostUpgradeStep { provider, blobs }
    }

    async fn nodegroup_rows(
        &self,
        cluster: &str,
        cluster_version: &str,
        desired: &str,
    ) -> Result<Vec<Vec<String>>> {
        let nodegroups = self.provider.list_nodegroups(cluster).await?;
        if nodegroups.is_empty() {
            return Ok(vec![row(
                cluster_version,
                "NodeGroup",
                "N/A",
                "N/A",
                "N/A",
                "No NodeGroups present",
            )]);
        }

        let mut rows = Vec::with_capacity(nodegroups.len());
        for nodegroup in &nodegroups {
            let info = self.provider.describe_nodegroup(cluster, nodegroup).await?;
            let current = info.version.as_deref().unwrap_or("N/A");
            let message = if current == desired {
                "Desired EKS Version running"
            } else {
                "NodeGroup is not on the desired EKS version"
            };
            rows.push(row(
                cluster_version,
                "NodeGroup",
                nodegroup,
                current,
                &info.status,
                message,
            ));
        }
        Ok(rows)
    }

    async fn addon_rows(
        &self,
        cluster: &str,
        cluster_version: &str,
        desired: &str,
    ) -> Result<Vec<Vec<String>>> {
        let addons = self.provider.list_addons(cluster).await?;
        if addons.is_empty() {
            return Ok(vec![row(
                cluster_version,
                "Addon",
                "N/A",
                "N/A",
                "N/A",
                "No Addons present",
            )]);
        }

        let mut rows = Vec::with_capacity(addons.len());
        for addon in &addons {
            let info = self.provider.describe_addon(cluster, addon).await?;
            let catalog = self.provider.addon_versions(addon, desired).await?;
            let default = default_version(&catalog)?;
            let message = if info.version == default {
                "Default Version is being used".to_string()
            } else {
                format!("Addon is not on the default version for Kubernetes version {desired}")
            };
            rows.push(row(
                cluster_version,
                "Addon",
                addon,
                &info.version,
                &info.status,
                &message,
            ));
        }
        Ok(rows)
    }
}

#[async_trait]
impl Step for PostUpgradeStep {
    fn name(&self) -> &str {
        POST_UPGRADE_STEP
    }

    fn report_name(&self) -> &str {
        UPGRADE_REPORT
    }

    #[instrument(skip(self, ctx, item), fields(cluster = %item.cluster_name))]
    async fn run(&self, ctx: &StepContext, item: &WorkItem) -> Result<()> {
        let cluster = &item.cluster_name;
        let Some(options) = item.upgrade_options() else {
            return Err(Error::Invariant(format!(
                "{cluster} reached the upgrade pipeline without upgrade options"
            )));
        };
        let desired = &options.desired_eks_version;

        let info = self.provider.describe_cluster(cluster).await?;
        report::merge_json_report(
            &ctx.json_report_file(cluster, UPGRADE_REPORT),
            patch([("PostUpgradeClusterVersion", json!(info.version))]),
        )?;

        let mut rows = self.nodegroup_rows(cluster, &info.version, desired).await?;
        rows.extend(self.addon_rows(cluster, &info.version, desired).await?);
        report::write_csv(&ctx.csv_report_file(cluster, POST_UPGRADE_STEP), &CSV_HEADERS, &rows)?;
        info!(resources = rows.len(), "post-upgrade state collected");

        // The engine ships the clustersUpgrade directory; the verification
        // table lives under its own report name and goes up here.
        upload_reports(self.blobs.as_ref(), ctx, cluster, POST_UPGRADE_STEP).await
    }
}

fn row(
    cluster_version: &str,
    resource_type: &str,
    name: &str,
    current: &str,
    status: &str,
    message: &str,
) -> Vec<String> {
    vec![
        cluster_version.to_string(),
        resource_type.to_string(),
        name.to_string(),
        current.to_string(),
        status.to_string(),
        message.to_string(),
    ]
}
