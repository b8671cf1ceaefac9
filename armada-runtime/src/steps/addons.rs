//! Addon upgrade step.
//!
//! Walks every addon installed on the cluster, classifies it against the
//! requested update set, and updates the eligible ones through `eksctl` with
//! a generated ClusterConfig document. Classifications land in the CSV
//! table; only collaborator failures abort the batch.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info, instrument};

use armada_core::version::{update_version, DEFAULT_ADDONS_FOR_UPDATE, SUPPORTED_ADDONS_FOR_UPDATE};
use armada_core::{Progress, UpgradeOptions, WorkItem};

use crate::context::StepContext;
use crate::engine::Step;
use crate::providers::{AddonInfo, ClusterProvider, ACTIVE_STATUS};
use crate::report::{self, patch};
use crate::shell::ProcessRunner;
use crate::steps::{ADDONS_UPGRADE_STEP, UPGRADE_REPORT};
use crate::{Error, Result};

const UPDATE_SCRIPT: &str = "update_aws_addons.sh";

const CSV_HEADERS: [&str; 5] = ["Name", "Version", "UpdatedVersion", "UpdateStatus", "Message"];

pub struct AddonsUpgradeStep {
    provider: Arc<dyn ClusterProvider>,
    runner: Arc<dyn ProcessRunner>,
}

impl AddonsUpgradeStep {
    pub fn new(provider: Arc<dyn ClusterProvider>, runner: Arc<dyn ProcessRunner>) -> Self {
        AddonsUpgradeStep { provider, runner }
    }

    async fn update_addon(
        &self,
        ctx: &StepContext,
        cluster: &str,
        desired_eks_version: &str,
        requested: &[String],
        info: &AddonInfo,
        progress: &mut Progress,
    ) -> Result<Vec<String>> {
        progress.record_total();
        let addon = info.name.as_str();

        if !requested.iter().any(|a| a == addon) {
            let message = if SUPPORTED_ADDONS_FOR_UPDATE.contains(&addon) {
                progress.record_not_requested();
                "Not present in the input addons to update"
            } else {
                progress.record_not_supported();
                "Not supported. Update manually"
            };
            info!(addon, "{message}");
            return Ok(row(addon, &info.version, "N/A", "Update Manually", message));
        }

        if info.status != ACTIVE_STATUS {
            progress.record_not_active();
            let message = "Status is not ACTIVE. Manually update the addon";
            info!(addon, status = %info.status, "{message}");
            return Ok(row(addon, &info.version, "N/A", "Update Manually", message));
        }

        let catalog = self.provider.addon_versions(addon, desired_eks_version).await?;
        let target = update_version(addon, &info.version, &catalog)?.to_string();

        if target == info.version {
            progress.record_no_action();
            let message = "Running with latest version";
            info!(addon, "{message}");
            return Ok(row(addon, &info.version, &target, "No Action", message));
        }

        let config = update_config_yaml(
            &ctx.region,
            cluster,
            addon,
            &target,
            info.service_account_role_arn.as_deref(),
        )?;
        let config_file = ctx.bash_scripts_path().join(format!("{cluster}-{addon}.yaml"));
        if let Some(parent) = config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&config_file, config)?;

        let args = vec![
            "-c".to_string(),
            cluster.to_string(),
            "-r".to_string(),
            ctx.region.clone(),
            "-a".to_string(),
            addon.to_string(),
            "-f".to_string(),
            config_file.to_string_lossy().into_owned(),
        ];
        let code = self.runner.run(&ctx.script_file(UPDATE_SCRIPT), &args).await?;

        if code == 0 {
            progress.record_updated();
            info!(addon, target, "addon updated");
            Ok(row(addon, &info.version, &target, "Success", "Updated"))
        } else {
            progress.record_failed();
            error!(addon, target, "update script failed");
            Ok(row(
                addon,
                &info.version,
                &target,
                "Failure",
                "Update addon script failed",
            ))
        }
    }
}

#[async_trait]
impl Step for AddonsUpgradeStep {
    fn name(&self) -> &str {
        ADDONS_UPGRADE_STEP
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
        let requested = requested_addons(options);

        let installed = self.provider.list_addons(cluster).await?;
        let mut progress = Progress::new();

        if installed.is_empty() {
            info!(cluster, "no addons to update");
            report::write_csv_placeholder(
                &ctx.csv_report_file(cluster, ADDONS_UPGRADE_STEP),
                &["Id", "Name", "Version", "UpdatedVersion", "UpdateStatus", "Message"],
                &["1", "", "", "", "", "No Addons present"],
            )?;
            self.merge_tallies(ctx, cluster, 0, &progress, "Addons not present")?;
            return Ok(());
        }

        let mut rows = Vec::with_capacity(installed.len());
        for addon in &installed {
            let info = self.provider.describe_addon(cluster, addon).await?;
            rows.push(
                self.update_addon(
                    ctx,
                    cluster,
                    &options.desired_eks_version,
                    &requested,
                    &info,
                    &mut progress,
                )
                .await?,
            );
        }
        report::write_csv(&ctx.csv_report_file(cluster, ADDONS_UPGRADE_STEP), &CSV_HEADERS, &rows)?;

        let message = format!(
            "Addons updated:- {}; Check the {ADDONS_UPGRADE_STEP} table for details.",
            progress.updated()
        );
        self.merge_tallies(ctx, cluster, installed.len(), &progress, &message)?;
        Ok(())
    }
}

impl AddonsUpgradeStep {
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
                ("TotalAddons", json!(total)),
                ("AddonsUpdated", json!(progress.updated())),
                ("AddonsFailed", json!(progress.failed())),
                ("AddonsRunningDesired", json!(progress.no_action())),
                ("AddonsNotActive", json!(progress.not_active())),
                ("AddonsNotRequested", json!(progress.not_requested())),
                ("AddonsNotSupported", json!(progress.not_supported())),
                ("Message", json!(message)),
            ]),
        )
    }
}

/// The update set the request asked for; an empty request falls back to the
/// default addon set.
fn requested_addons(options: &UpgradeOptions) -> Vec<String> {
    if options.addons_to_update.is_empty() {
        DEFAULT_ADDONS_FOR_UPDATE.iter().map(|a| a.to_string()).collect()
    } else {
        options.addons_to_update.clone()
    }
}

/// `eksctl` ClusterConfig document driving one addon update.
fn update_config_yaml(
    region: &str,
    cluster: &str,
    addon: &str,
    version: &str,
    service_account_role_arn: Option<&str>,
) -> Result<String> {
    let mut addon_entry = serde_yaml::Mapping::new();
    addon_entry.insert("name".into(), addon.into());
    addon_entry.insert("version".into(), version.into());
    addon_entry.insert("resolveConflicts".into(), "preserve".into());
    if let Some(role_arn) = service_account_role_arn.filter(|arn| !arn.is_empty()) {
        addon_entry.insert("serviceAccountRoleARN".into(), role_arn.into());
    }

    let mut metadata = serde_yaml::Mapping::new();
    metadata.insert("name".into(), cluster.into());
    metadata.insert("region".into(), region.into());

    let mut config = serde_yaml::Mapping::new();
    config.insert("apiVersion".into(), "eksctl.io/v1alpha5".into());
    config.insert("kind".into(), "ClusterConfig".into());
    config.insert("metadata".into(), serde_yaml::Value::Mapping(metadata));
    config.insert(
        "addons".into(),
        serde_yaml::Value::Sequence(vec![serde_yaml::Value::Mapping(addon_entry)]),
    );

    serde_yaml::to_string(&serde_yaml::Value::Mapping(config))
        .map_err(|e| Error::Validation(format!("failed to render addon config: {e}")))
}

fn row(name: &str, version: &str, updated: &str, status: &str, message: &str) -> Vec<String> {
    vec![
        name.to_string(),
        version.to_string(),
        updated.to_string(),
        status.to_string(),
        message.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_request_falls_back_to_default_addons() {
        let options = UpgradeOptions {
            desired_eks_version: "1.29".to_string(),
            addons_to_update: vec![],
            common_launch_template_version: None,
            managed_node_groups: vec![],
        };
        assert_eq!(requested_addons(&options), vec!["vpc-cni", "coredns", "kube-proxy"]);
    }

    #[test]
    fn config_yaml_includes_the_role_when_present() {
        let yaml = update_config_yaml(
            "us-east-1",
            "payments",
            "vpc-cni",
            "v1.16.0-eksbuild.1",
            Some("arn:aws:iam::111122223333:role/cni"),
        )
        .unwrap();
        assert!(yaml.contains("kind: ClusterConfig"));
        assert!(yaml.contains("name: vpc-cni"));
        assert!(yaml.contains("version: v1.16.0-eksbuild.1"));
        assert!(yaml.contains("resolveConflicts: preserve"));
        assert!(yaml.contains("serviceAccountRoleARN: arn:aws:iam::111122223333:role/cni"));
    }

    #[test]
    fn config_yaml_omits_an_absent_role() {
        let yaml =
            update_config_yaml("us-east-1", "payments", "coredns", "v1.10.1-eksbuild.2", None)
                .unwrap();
        assert!(!yaml.contains("serviceAccountRoleARN"));
    }
}
