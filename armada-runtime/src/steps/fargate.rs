//! Fargate workload restart step.
//!
//! After an upgrade, pods scheduled on Fargate keep running on the old
//! Kubernetes version until their deployments are rolled. This step walks
//! every Fargate profile on the cluster and restarts the workloads in each
//! namespace the profile selects.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, instrument};

use armada_core::WorkItem;

use crate::context::StepContext;
use crate::engine::Step;
use crate::providers::ClusterProvider;
use crate::report::{self, patch};
use crate::shell::ProcessRunner;
use crate::steps::{RESTART_FARGATE_PROFILES_STEP, UPGRADE_REPORT};
use crate::{Error, Result};

const RESTART_SCRIPT: &str = "restart_fargate_workloads.sh";

pub struct FargateProfilesRestartStep {
    provider: Arc<dyn ClusterProvider>,
    runner: Arc<dyn ProcessRunner>,
}

impl FargateProfilesRestartStep {
    pub fn new(provider: Arc<dyn ClusterProvider>, runner: Arc<dyn ProcessRunner>) -> Self {
        FargateProfilesRestartStep { provider, runner }
    }
}

#[async_trait]
impl Step for FargateProfilesRestartStep {
    fn name(&self) -> &str {
        RESTART_FARGATE_PROFILES_STEP
    }

    fn report_name(&self) -> &str {
        UPGRADE_REPORT
    }

    #[instrument(skip(self, ctx, item), fields(cluster = %item.cluster_name))]
    async fn run(&self, ctx: &StepContext, item: &WorkItem) -> Result<()> {
        let cluster = &item.cluster_name;
        let profiles = self.provider.list_fargate_profiles(cluster).await?;
        info!(profiles = profiles.len(), "fargate profiles present");

        let mut restarted = 0u32;
        for profile in &profiles {
            let info = self.provider.describe_fargate_profile(cluster, profile).await?;
            for namespace in &info.namespaces {
                let args = vec![
                    ctx.kube_config_path(cluster).to_string_lossy().into_owned(),
                    cluster.clone(),
                    namespace.clone(),
                ];
                let code = self.runner.run(&ctx.script_file(RESTART_SCRIPT), &args).await?;
                if code != 0 {
                    return Err(Error::step_failure(
                        self.name(),
                        cluster,
                        format!("restart script exited with {code} for namespace {namespace}"),
                    ));
                }
            }
            info!(profile = %profile, "fargate workloads restarted");
            restarted += 1;
        }

        report::merge_json_report(
            &ctx.json_report_file(cluster, UPGRADE_REPORT),
            patch([
                ("TotalFargateProfiles", json!(profiles.len())),
                ("Message", json!(format!("Restarted Fargate profiles: {restarted}."))),
            ]),
        )?;
        Ok(())
    }
}
