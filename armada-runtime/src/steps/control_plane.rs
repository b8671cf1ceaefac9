//! Control-plane upgrade step.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info, instrument};

use armada_core::version::is_one_minor_upgrade;
use armada_core::WorkItem;

use crate::context::StepContext;
use crate::engine::Step;
use crate::providers::ClusterProvider;
use crate::report::{self, patch};
use crate::shell::ProcessRunner;
use crate::steps::{CONTROL_PLANE_UPGRADE_STEP, UPGRADE_REPORT};
use crate::{Error, Result};

const UPDATE_SCRIPT: &str = "update_cluster.sh";

/// Moves a cluster's control plane one minor version forward. Multi-minor
/// jumps are rejected before anything is touched and abort the batch.
pub struct ControlPlaneUpgradeStep {
    provider: Arc<dyn ClusterProvider>,
    runner: Arc<dyn ProcessRunner>,
}

impl ControlPlaneUpgradeStep {
    pub fn new(provider: Arc<dyn ClusterProvider>, runner: Arc<dyn ProcessRunner>) -> Self {
        ControlPlaneUpgradeStep { provider, runner }
    }
}

#[async_trait]
impl Step for ControlPlaneUpgradeStep {
    fn name(&self) -> &str {
        CONTROL_PLANE_UPGRADE_STEP
    }

    fn report_name(&self) -> &str {
        UPGRADE_REPORT
    }

    #[instrument(skip(self, ctx, item), fields(cluster = %item.cluster_name))]
    async fn run(&self, ctx: &StepContext, item: &WorkItem) -> Result<()> {
        let cluster = &item.cluster_name;
        let report_file = ctx.json_report_file(cluster, UPGRADE_REPORT);

        let Some(options) = item.upgrade_options() else {
            return Err(Error::Invariant(format!(
                "{cluster} reached the upgrade pipeline without upgrade options"
            )));
        };
        let desired = &options.desired_eks_version;
        let current = self.provider.describe_cluster(cluster).await?.version;

        if !is_one_minor_upgrade(&current, desired)? {
            let message = format!(
                "Upgrading from {current} to {desired} is not supported. \
                 Only one minor version upgrade at a time is supported."
            );
            error!("{message}");
            report::merge_json_report(
                &report_file,
                patch([
                    ("CurrentEKSVersion", json!(current)),
                    ("DesiredEKSVersion", json!(desired)),
                    ("ControlPlaneUpdateStatus", json!("Not Supported")),
                    ("Message", json!(message)),
                ]),
            )?;
            return Err(Error::step_failure(self.name(), cluster, message));
        }

        let args = vec![
            "-c".to_string(),
            cluster.clone(),
            "-r".to_string(),
            ctx.region.clone(),
            "-e".to_string(),
            desired.clone(),
        ];
        let code = self.runner.run(&ctx.script_file(UPDATE_SCRIPT), &args).await?;

        if code == 0 {
            let message = format!("Control plane updated to {desired}.");
            info!("{message}");
            report::merge_json_report(
                &report_file,
                patch([
                    ("CurrentEKSVersion", json!(current)),
                    ("DesiredEKSVersion", json!(desired)),
                    ("ControlPlaneUpdateStatus", json!("Success")),
                    ("Message", json!(message)),
                ]),
            )?;
            Ok(())
        } else {
            let message = format!("Control plane update script failed for {cluster}");
            error!("{message}");
            report::merge_json_report(
                &report_file,
                patch([
                    ("CurrentEKSVersion", json!(current)),
                    ("DesiredEKSVersion", json!(desired)),
                    ("ControlPlaneUpdateStatus", json!("Failure")),
                    ("Message", json!(message)),
                ]),
            )?;
            Err(Error::step_failure(self.name(), cluster, message))
        }
    }
}
