//! Velero plugin install, backup, and restore steps.
//!
//! All three steps of the backup pipeline write into the shared
//! `backupAndRestore` report, so a cluster's row accumulates the plugin,
//! backup, and restore outcome fields across the pipeline.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

use armada_core::WorkItem;

use crate::context::StepContext;
use crate::engine::Step;
use crate::providers::{fargate_blocks_velero, ClusterProvider};
use crate::report::{self, patch};
use crate::shell::ProcessRunner;
use crate::steps::{
    args_from_map, BACKUP_REPORT, VELERO_BACKUP_STEP, VELERO_PLUGIN_STEP, VELERO_RESTORE_STEP,
};
use crate::{Error, Result};

const BACKUP_SCRIPT: &str = "create_backup.sh";
const RESTORE_SCRIPT: &str = "restore_backup.sh";
const PLUGIN_SCRIPT: &str = "install_velero.sh";

/// Phase velero reports for a finished backup or restore.
const COMPLETED_PHASE: &str = "Completed";

/// Takes a velero backup of each cluster requesting one.
pub struct VeleroBackupStep {
    provider: Arc<dyn ClusterProvider>,
    runner: Arc<dyn ProcessRunner>,
}

impl VeleroBackupStep {
    pub fn new(provider: Arc<dyn ClusterProvider>, runner: Arc<dyn ProcessRunner>) -> Self {
        VeleroBackupStep { provider, runner }
    }
}

#[async_trait]
impl Step for VeleroBackupStep {
    fn name(&self) -> &str {
        VELERO_BACKUP_STEP
    }

    fn report_name(&self) -> &str {
        BACKUP_REPORT
    }

    #[instrument(skip(self, ctx, item), fields(cluster = %item.cluster_name))]
    async fn run(&self, ctx: &StepContext, item: &WorkItem) -> Result<()> {
        let cluster = &item.cluster_name;
        let report_file = ctx.json_report_file(cluster, BACKUP_REPORT);
        let eks_version = self.provider.describe_cluster(cluster).await?.version;

        let Some(options) = item.backup_options() else {
            // Restore items travel through the same pipeline.
            let message = format!("Backup action is not present in input for {cluster}.");
            info!("{message}");
            report::merge_json_report(
                &report_file,
                patch([
                    ("BackupStatus", json!("No Action")),
                    ("BackupName", json!("N/A")),
                    ("BackupLocation", json!("N/A")),
                    ("ClusterVersion", json!(eks_version)),
                    ("Message", json!(message)),
                ]),
            )?;
            return Ok(());
        };

        let backup_name = &options.backup_name;

        if fargate_blocks_velero(self.provider.as_ref(), cluster, &options.velero_namespace).await? {
            let message = format!(
                "Fargate profile not present for {} namespace. Velero plugin may not be installed.",
                options.velero_namespace
            );
            error!("{message}");
            report::merge_json_report(
                &report_file,
                patch([
                    ("BackupStatus", json!("Failure")),
                    ("BackupName", json!(backup_name)),
                    ("BackupLocation", json!("N/A")),
                    ("ClusterVersion", json!(eks_version)),
                    ("Message", json!(message)),
                ]),
            )?;
            return Err(Error::step_failure(self.name(), cluster, message));
        }

        let reporting_dir = ctx.reporting_dir(cluster, BACKUP_REPORT);
        std::fs::create_dir_all(&reporting_dir)?;
        let status_file = reporting_dir.join("backup_status.json");

        let mut args = vec![
            ctx.kube_config_path(cluster).to_string_lossy().into_owned(),
            cluster.clone(),
            backup_name.clone(),
            status_file.to_string_lossy().into_owned(),
            options.velero_namespace.clone(),
        ];
        args.extend(args_from_map(&options.velero_arguments));

        let code = self.runner.run(&ctx.script_file(BACKUP_SCRIPT), &args).await?;

        let outcome = if code == 0 {
            let phase = read_phase(&status_file)?;
            if phase == COMPLETED_PHASE {
                let location = format!(
                    "{}/{cluster}/backups/{backup_name}",
                    ctx.backup_bucket_name()
                );
                let message =
                    format!("Backup creation completed. Check the BackupLocation: {location}");
                info!("{message}");
                report::merge_json_report(
                    &report_file,
                    patch([
                        ("BackupStatus", json!(phase)),
                        ("BackupName", json!(backup_name)),
                        ("BackupLocation", json!(location)),
                        ("ClusterVersion", json!(eks_version)),
                        ("Message", json!(message)),
                    ]),
                )?;
                Ok(())
            } else {
                let message = format!(
                    "Backup creation not completed. Check the logs using \
                     kubectl logs deploy/velero -n {}.",
                    options.velero_namespace
                );
                error!("{message}");
                report::merge_json_report(
                    &report_file,
                    patch([
                        ("BackupStatus", json!(phase)),
                        ("BackupName", json!(backup_name)),
                        ("BackupLocation", json!("N/A")),
                        ("ClusterVersion", json!(eks_version)),
                        ("Message", json!(message)),
                    ]),
                )?;
                Err(Error::step_failure(self.name(), cluster, message))
            }
        } else {
            let message = "Backup creation script failed".to_string();
            error!("{message}");
            report::merge_json_report(
                &report_file,
                patch([
                    ("BackupStatus", json!("Failed")),
                    ("BackupName", json!(backup_name)),
                    ("BackupLocation", json!("N/A")),
                    ("ClusterVersion", json!(eks_version)),
                    ("Message", json!(message)),
                ]),
            )?;
            Err(Error::step_failure(self.name(), cluster, message))
        };

        if status_file.is_file() {
            let _ = std::fs::remove_file(&status_file);
        }
        outcome
    }
}

/// Restores a named velero backup into each cluster requesting one.
pub struct VeleroRestoreStep {
    provider: Arc<dyn ClusterProvider>,
    runner: Arc<dyn ProcessRunner>,
}

impl VeleroRestoreStep {
    pub fn new(provider: Arc<dyn ClusterProvider>, runner: Arc<dyn ProcessRunner>) -> Self {
        VeleroRestoreStep { provider, runner }
    }
}

#[async_trait]
impl Step for VeleroRestoreStep {
    fn name(&self) -> &str {
        VELERO_RESTORE_STEP
    }

    fn report_name(&self) -> &str {
        BACKUP_REPORT
    }

    #[instrument(skip(self, ctx, item), fields(cluster = %item.cluster_name))]
    async fn run(&self, ctx: &StepContext, item: &WorkItem) -> Result<()> {
        let cluster = &item.cluster_name;
        let report_file = ctx.json_report_file(cluster, BACKUP_REPORT);
        let eks_version = self.provider.describe_cluster(cluster).await?.version;

        let Some(options) = item.restore_options() else {
            let message = format!("Restore action is not present in input for {cluster}.");
            info!("{message}");
            report::merge_json_report(
                &report_file,
                patch([
                    ("RestoreStatus", json!("No Action")),
                    ("ClusterVersion", json!(eks_version)),
                    ("Message", json!(message)),
                ]),
            )?;
            return Ok(());
        };

        let backup_name = &options.backup_name;
        let reporting_dir = ctx.reporting_dir(cluster, BACKUP_REPORT);
        std::fs::create_dir_all(&reporting_dir)?;
        let status_file = reporting_dir.join("restore_status.json");

        let mut args = vec![
            ctx.kube_config_path(cluster).to_string_lossy().into_owned(),
            cluster.clone(),
            backup_name.clone(),
            status_file.to_string_lossy().into_owned(),
        ];
        args.extend(args_from_map(&options.velero_arguments));

        let code = self.runner.run(&ctx.script_file(RESTORE_SCRIPT), &args).await?;

        let outcome = if code == 0 {
            let phase = read_phase(&status_file)?;
            if phase == COMPLETED_PHASE {
                let message = format!("Restore of backup {backup_name} completed.");
                info!("{message}");
                report::merge_json_report(
                    &report_file,
                    patch([
                        ("RestoreStatus", json!(phase)),
                        ("BackupName", json!(backup_name)),
                        ("ClusterVersion", json!(eks_version)),
                        ("Message", json!(message)),
                    ]),
                )?;
                Ok(())
            } else {
                let message = format!("Restore of backup {backup_name} not completed.");
                error!("{message}");
                report::merge_json_report(
                    &report_file,
                    patch([
                        ("RestoreStatus", json!(phase)),
                        ("BackupName", json!(backup_name)),
                        ("ClusterVersion", json!(eks_version)),
                        ("Message", json!(message)),
                    ]),
                )?;
                Err(Error::step_failure(self.name(), cluster, message))
            }
        } else {
            let message = "Restore script failed".to_string();
            error!("{message}");
            report::merge_json_report(
                &report_file,
                patch([
                    ("RestoreStatus", json!("Failed")),
                    ("BackupName", json!(backup_name)),
                    ("ClusterVersion", json!(eks_version)),
                    ("Message", json!(message)),
                ]),
            )?;
            Err(Error::step_failure(self.name(), cluster, message))
        };

        if status_file.is_file() {
            let _ = std::fs::remove_file(&status_file);
        }
        outcome
    }
}

/// Installs the velero plugin and wires the backup bucket policy to the
/// cluster's service-account role.
pub struct VeleroPluginStep {
    provider: Arc<dyn ClusterProvider>,
    blobs: Arc<dyn crate::providers::BlobStore>,
    runner: Arc<dyn ProcessRunner>,
}

impl VeleroPluginStep {
    pub fn new(
        provider: Arc<dyn ClusterProvider>,
        blobs: Arc<dyn crate::providers::BlobStore>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        VeleroPluginStep {
            provider,
            blobs,
            runner,
        }
    }

    /// Grant the service-account role access to the backup bucket unless the
    /// current policy already names it.
    async fn ensure_bucket_policy(&self, bucket: &str, role_arn: &str) -> Result<()> {
        let current = self.blobs.get_bucket_policy(bucket).await?;
        if let Some(policy) = &current {
            if policy.contains(role_arn) {
                return Ok(());
            }
        }
        let policy = backup_bucket_policy(bucket, role_arn)?;
        info!(bucket, role_arn, "granting backup bucket access");
        self.blobs.put_bucket_policy(bucket, &policy).await
    }
}

#[async_trait]
impl Step for VeleroPluginStep {
    fn name(&self) -> &str {
        VELERO_PLUGIN_STEP
    }

    fn report_name(&self) -> &str {
        BACKUP_REPORT
    }

    #[instrument(skip(self, ctx, item), fields(cluster = %item.cluster_name))]
    async fn run(&self, ctx: &StepContext, item: &WorkItem) -> Result<()> {
        let cluster = &item.cluster_name;
        let report_file = ctx.json_report_file(cluster, BACKUP_REPORT);

        let Some(options) = item.backup_options() else {
            let message = format!("Velero plugin install not requested for {cluster}.");
            info!("{message}");
            report::merge_json_report(
                &report_file,
                patch([
                    ("VeleroPluginStatus", json!("No Action")),
                    ("Message", json!(message)),
                ]),
            )?;
            return Ok(());
        };

        if fargate_blocks_velero(self.provider.as_ref(), cluster, &options.velero_namespace).await? {
            let message = format!(
                "Fargate profile not present for {} namespace. Velero plugin cannot run.",
                options.velero_namespace
            );
            error!("{message}");
            report::merge_json_report(
                &report_file,
                patch([
                    ("VeleroPluginStatus", json!("Failure")),
                    ("Message", json!(message)),
                ]),
            )?;
            return Err(Error::step_failure(self.name(), cluster, message));
        }

        let bucket = ctx.backup_bucket_name();
        let role_arn = format!(
            "arn:aws:iam::{}:role/{}",
            ctx.account_id, options.service_account_role_name
        );
        self.ensure_bucket_policy(&bucket, &role_arn).await?;

        let args = vec![
            ctx.kube_config_path(cluster).to_string_lossy().into_owned(),
            cluster.clone(),
            options.velero_namespace.clone(),
            options.service_account.clone(),
            role_arn,
            options.velero_plugin_version.clone(),
            bucket,
        ];

        let code = self.runner.run(&ctx.script_file(PLUGIN_SCRIPT), &args).await?;
        if code == 0 {
            let message = format!(
                "Velero plugin {} installed in {} namespace.",
                options.velero_plugin_version, options.velero_namespace
            );
            info!("{message}");
            report::merge_json_report(
                &report_file,
                patch([
                    ("VeleroPluginStatus", json!("Success")),
                    ("VeleroPluginVersion", json!(options.velero_plugin_version)),
                    ("Message", json!(message)),
                ]),
            )?;
            Ok(())
        } else {
            let message = "Velero plugin install script failed".to_string();
            error!("{message}");
            report::merge_json_report(
                &report_file,
                patch([
                    ("VeleroPluginStatus", json!("Failure")),
                    ("Message", json!(message)),
                ]),
            )?;
            Err(Error::step_failure(self.name(), cluster, message))
        }
    }
}

/// Phase reported by the velero status side-effect file; anything missing
/// reads as a failure.
fn read_phase(status_file: &Path) -> Result<String> {
    let status = report::read_json_report(status_file)?;
    let phase = status
        .get("phase")
        .and_then(Value::as_str)
        .unwrap_or("Failure");
    if status.is_empty() {
        warn!(file = %status_file.display(), "status file missing or empty");
    }
    Ok(phase.to_string())
}

fn backup_bucket_policy(bucket: &str, role_arn: &str) -> Result<String> {
    let policy = json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Sid": "VeleroBackupAccess",
            "Effect": "Allow",
            "Principal": {"AWS": role_arn},
            "Action": ["s3:GetObject", "s3:PutObject", "s3:ListBucket"],
            "Resource": [
                format!("arn:aws:s3:::{bucket}"),
                format!("arn:aws:s3:::{bucket}/*")
            ]
        }]
    });
    Ok(serde_json::to_string(&policy)?)
}
