//! Per-run execution context for the steps on one host.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use armada_core::WorkItem;

use crate::providers::Identity;
use crate::Result;

/// Folder under the working directory holding per-cluster kubeconfigs.
const KUBE_CONFIG_FOLDER: &str = "config";

/// Folder under the script base path holding the bash scripts.
const BASH_SCRIPTS_FOLDER: &str = "bash";

/// Bucket name prefix for the velero backup buckets when the run does not
/// override it.
pub const BACKUP_BUCKET_PREFIX: &str = "eksmanagement-automation-velero-backup";

/// Everything a step needs to know about the run it participates in: host
/// identity, staging paths, the report bucket, and the work items the
/// automation carries. Built once per step process and shared read-only.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub working_dir: PathBuf,
    pub account_id: String,
    pub region: String,
    /// Bucket receiving the uploaded reports.
    pub s3_bucket: String,
    /// Top-level folder inside the report bucket, one per pipeline.
    pub s3_folder: String,
    pub script_base_path: String,
    pub report_base_path: String,
    pub storage_bucket_prefix: Option<String>,
    /// Date stamped into report partitions and defaulted names.
    pub run_date: NaiveDate,
    pub input_items: Vec<WorkItem>,
}

impl StepContext {
    pub fn new(
        working_dir: impl Into<PathBuf>,
        account_id: &str,
        region: &str,
        s3_bucket: &str,
        s3_folder: &str,
    ) -> Self {
        StepContext {
            working_dir: working_dir.into(),
            account_id: account_id.to_string(),
            region: region.to_string(),
            s3_bucket: s3_bucket.to_string(),
            s3_folder: s3_folder.to_string(),
            script_base_path: format!("{s3_folder}/scripts"),
            report_base_path: format!("{s3_folder}/reports"),
            storage_bucket_prefix: None,
            run_date: chrono::Utc::now().date_naive(),
            input_items: Vec::new(),
        }
    }

    /// Build a context for the current host, resolving the account id
    /// through the caller's identity.
    pub async fn for_caller(
        identity: &dyn Identity,
        working_dir: impl Into<PathBuf>,
        region: &str,
        s3_bucket: &str,
        s3_folder: &str,
    ) -> Result<Self> {
        let account_id = identity.caller_account_id().await?;
        Ok(StepContext::new(
            working_dir,
            &account_id,
            region,
            s3_bucket,
            s3_folder,
        ))
    }

    pub fn with_input_items(mut self, items: Vec<WorkItem>) -> Self {
        self.input_items = items;
        self
    }

    pub fn with_run_date(mut self, run_date: NaiveDate) -> Self {
        self.run_date = run_date;
        self
    }

    pub fn bash_scripts_path(&self) -> PathBuf {
        self.working_dir
            .join(&self.script_base_path)
            .join(BASH_SCRIPTS_FOLDER)
    }

    pub fn script_file(&self, name: &str) -> PathBuf {
        self.bash_scripts_path().join(name)
    }

    pub fn kube_config_path(&self, cluster: &str) -> PathBuf {
        self.working_dir.join(KUBE_CONFIG_FOLDER).join(cluster)
    }

    /// Directory collecting every report file for one cluster and report
    /// name; uploaded as a unit.
    pub fn reporting_dir(&self, cluster: &str, report_name: &str) -> PathBuf {
        self.working_dir
            .join(&self.report_base_path)
            .join(report_name)
            .join(cluster)
    }

    pub fn json_report_file(&self, cluster: &str, report_name: &str) -> PathBuf {
        self.reporting_dir(cluster, report_name)
            .join(format!("{cluster}-{report_name}.json"))
    }

    pub fn csv_report_file(&self, cluster: &str, report_name: &str) -> PathBuf {
        self.reporting_dir(cluster, report_name)
            .join(format!("{cluster}-{report_name}.csv"))
    }

    /// Bucket velero writes cluster backups into.
    pub fn backup_bucket_name(&self) -> String {
        let prefix = self
            .storage_bucket_prefix
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(BACKUP_BUCKET_PREFIX);
        format!("{}-{}-{}", prefix, self.account_id, self.region)
    }

    /// S3 prefix the reporting directory of `cluster` is uploaded under,
    /// partitioned for downstream querying.
    pub fn report_upload_prefix(&self, cluster: &str, report_name: &str) -> String {
        format!(
            "{}/{}/accountId={}/region={}/clusterName={}/date={}",
            self.s3_folder,
            report_name,
            self.account_id,
            self.region,
            cluster,
            self.run_date.format("%Y-%m-%d")
        )
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> StepContext {
        StepContext::new(
            "/home/ec2-user/eks-management",
            "111122223333",
            "us-east-1",
            "armada-reports",
            "backup",
        )
        .with_run_date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
    }

    #[test]
    fn paths_hang_off_the_working_directory() {
        let ctx = context();
        assert_eq!(
            ctx.script_file("create_backup.sh"),
            PathBuf::from("/home/ec2-user/eks-management/backup/scripts/bash/create_backup.sh")
        );
        assert_eq!(
            ctx.json_report_file("payments", "backupAndRestore"),
            PathBuf::from(
                "/home/ec2-user/eks-management/backup/reports/backupAndRestore/payments/payments-backupAndRestore.json"
            )
        );
        assert_eq!(
            ctx.kube_config_path("payments"),
            PathBuf::from("/home/ec2-user/eks-management/config/payments")
        );
    }

    #[test]
    fn backup_bucket_uses_the_default_prefix_when_unset() {
        let ctx = context();
        assert_eq!(
            ctx.backup_bucket_name(),
            "eksmanagement-automation-velero-backup-111122223333-us-east-1"
        );
    }

    #[tokio::test]
    async fn caller_identity_fills_the_account_id() {
        struct StaticIdentity;

        #[async_trait::async_trait]
        impl Identity for StaticIdentity {
            async fn caller_account_id(&self) -> crate::Result<String> {
                Ok("111122223333".to_string())
            }
        }

        let ctx = StepContext::for_caller(
            &StaticIdentity,
            "/home/ec2-user/eks-management",
            "us-east-1",
            "armada-reports",
            "backup",
        )
        .await
        .unwrap();
        assert_eq!(ctx.account_id, "111122223333");
    }

    #[test]
    fn report_upload_prefix_is_partitioned() {
        let ctx = context();
        assert_eq!(
            ctx.report_upload_prefix("payments", "backupAndRestore"),
            "backup/backupAndRestore/accountId=111122223333/region=us-east-1/clusterName=payments/date=2024-05-01"
        );
    }
}
