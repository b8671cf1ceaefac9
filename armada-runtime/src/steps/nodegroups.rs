//! Managed nodegroup upgrade step.
//!
//! Per-nodegroup failures are recorded in the CSV table and tallied; they do
//! not abort the batch. The step only fails hard when a collaborator call
//! does.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info, instrument};

use armada_core::{Progress, WorkItem};

use crate::context::StepContext;
use crate::engine::Step;
use crate::providers::{ClusterProvider, ACTIVE_STATUS};
use crate::report::{self, patch};
use crate::shell::ProcessRunner;
use crate::steps::{NODE_GROUPS_UPGRADE_STEP, UPGRADE_REPORT};
use crate::{Error, Result};

const UPDATE_SCRIPT: &str = "update_managed_node_groups.sh";

const CSV_HEADERS: [&str; 4] = ["Name", "DesiredVersion", "UpdateStatus", "Message"];

pub struct NodegroupsUpgradeStep {
    provider: Arc<dyn ClusterProvider>,
    runner: Arc<dyn ProcessRunner>,
}

impl NodegroupsUpgradeStep {
    pub fn new(provider: Arc<dyn ClusterProvider>, runner: Arc<dyn ProcessRunner>) -> Self {
        NodegroupsUpgradeStep { provider, runner }
    }

    async fn update_nodegroup(
        &self,
        ctx: &StepContext,
        cluster: &str,
        nodegroup: &str,
        desired: &str,
        progress: &mut Progress,
    ) -> Result<Vec<String>> {
        progress.record_total();
        let info = self.provider.describe_nodegroup(cluster, nodegroup).await?;

        if info.status != ACTIVE_STATUS {
            progress.record_not_active();
            return Ok(row(
                nodegroup,
                desired,
                "Not Active",
                &format!("Status is {}. Update manually", info.status),
            ));
        }
        if info.version.as_deref() == Some(desired) {
            progress.record_no_action();
            return Ok(row(nodegroup, desired, "No Action", "Running with desired version"));
        }

        info!(cluster, nodegroup, desired, "updating managed node group");
        let args = vec![
            "-c".to_string(),
            cluster.to_string(),
            "-r".to_string(),
            ctx.region.clone(),
            "-e".to_string(),
            desired.to_string(),
            "-g".to_string(),
            nodegroup.to_string(),
        ];
        let code = self.runner.run(&ctx.script_file(UPDATE_SCRIPT), &args).await?;

        if code == 0 {
            progress.record_updated();
            Ok(row(nodegroup, desired, "Success", "Updated"))
        } else {
            progress.record_failed();
            error!(cluster, nodegroup, "update script failed");
            Ok(row(
                nodegroup,
                desired,
                "Failure",
                "Update nodegroup script failed",
            ))
        }
    }
}

#[async_trait]
impl Step for NodegroupsUpgradeStep {
    fn name(&self) -> &str {
        NODE_GROUPS_UPGRADE_STEP
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

        let csv_file = ctx.csv_report_file(cluster, NODE_GROUPS_UPGRADE_STEP);
        let nodegroups = self.provider.list_nodegroups(cluster).await?;
        let mut progress = Progress::new();

        if nodegroups.is_empty() {
            info!(cluster, "no managed node groups");
            report::write_csv_placeholder(
                &csv_file,
                &["Id", "Name", "DesiredVersion", "UpdateStatus", "Message"],
                &["1", "", "", "", "No NodeGroups present"],
            )?;
            self.merge_tallies(ctx, cluster, 0, &progress, "No managed node groups found.")?;
            return Ok(());
        }

        let mut rows = Vec::with_capacity(nodegroups.len());
        for nodegroup in &nodegroups {
            rows.push(
                self.update_nodegroup(ctx, cluster, nodegroup, desired, &mut progress)
                    .await?,
            );
        }
        report::write_csv(&csv_file, &CSV_HEADERS, &rows)?;

        let message = format!(
            "Node groups updated:- {}; Check the {NODE_GROUPS_UPGRADE_STEP} table for details.",
            progress.updated()
        );
        self.merge_tallies(ctx, cluster, nodegroups.len(), &progress, &message)?;
        Ok(())
    }
}

impl NodegroupsUpgradeStep {
    fn merge_tallies(
        &self,
        ctx: &StepContext,
        cluster: &str,
        total: usize,
        progress: &Progress,
        message: &str,
    ) -> Result<()> {
        report::merge_json_report(
            &ctx.json_report_file(cluster, UPGRADE_REPORT),
            patch([
                ("TotalNodeGroups", json!(total)),
                ("NodeGroupsUpdated", json!(progress.updated())),
                ("NodeGroupsFailed", json!(progress.failed())),
                ("NodeGroupsRunningDesired", json!(progress.no_action())),
                ("NodeGroupsNotActive", json!(progress.not_active())),
                ("Message", json!(message)),
            ]),
        )
    }
}

fn row(name: &str, desired: &str, status: &str, message: &str) -> Vec<String> {
    vec![
        name.to_string(),
        desired.to_string(),
        status.to_string(),
        message.to_string(),
    ]
}
