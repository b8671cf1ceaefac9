//! Request normalization.
//!
//! Turns the raw `Clusters` buckets of an automation request into validated
//! [`WorkItem`]s for one pipeline. Pure transform: defaulting and validation
//! only, no side effects. Normalization is all-or-nothing; the first invalid
//! item fails the whole request rather than being skipped.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::work_item::{
    Action, BackupOptions, ManagedNodeGroup, RestoreOptions, UpgradeOptions, Work, WorkItem,
};
use crate::{Error, Result};

pub const MIN_ROLE_NAME_LENGTH: usize = 1;
pub const MAX_ROLE_NAME_LENGTH: usize = 64;

/// Which automation pipeline a request is driving. Selects the buckets the
/// normalizer reads; a pipeline never looks at another pipeline's buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    Summary,
    Backup,
    Upgrade,
}

impl Pipeline {
    pub fn name(&self) -> &'static str {
        match self {
            Pipeline::Summary => "summary",
            Pipeline::Backup => "backup",
            Pipeline::Upgrade => "upgrade",
        }
    }

    /// Whether the pipeline refuses to start without input clusters.
    pub fn input_required(&self) -> bool {
        !matches!(self, Pipeline::Summary)
    }
}

/// Run-level configuration used to fill absent optional fields.
#[derive(Debug, Clone)]
pub struct RunDefaults {
    pub resource_prefix: String,
    pub velero_namespace: String,
    pub service_account: String,
    pub role_prefix: String,
    pub velero_plugin_version: String,
    pub desired_eks_version: String,
}

impl RunDefaults {
    pub fn new(resource_prefix: &str, desired_eks_version: &str) -> Self {
        RunDefaults {
            resource_prefix: resource_prefix.to_string(),
            velero_namespace: "velero".to_string(),
            service_account: format!(
                "{}-velero-service-account",
                resource_prefix.to_lowercase()
            ),
            role_prefix: format!("{resource_prefix}-sa"),
            velero_plugin_version: "v1.10.1".to_string(),
            desired_eks_version: desired_eks_version.to_string(),
        }
    }
}

impl Default for RunDefaults {
    fn default() -> Self {
        RunDefaults::new("eks-management", "1.29")
    }
}

/// The `Clusters` object of a raw request. Every bucket is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ClusterBuckets {
    pub summary: Vec<RawClusterItem>,
    pub backup: Vec<RawClusterItem>,
    pub restore: Vec<RawClusterItem>,
    pub upgrade: Vec<RawClusterItem>,
}

/// One loosely-typed entry of a request bucket, tolerant of missing keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawClusterItem {
    pub account_id: Option<String>,
    pub region: Option<String>,
    pub cluster_name: Option<String>,
    pub action: Option<String>,
    pub backup_options: Option<RawBackupOptions>,
    pub restore_options: Option<RawRestoreOptions>,
    pub upgrade_options: Option<RawUpgradeOptions>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawBackupOptions {
    pub backup_name: Option<String>,
    pub velero_namespace: Option<String>,
    pub service_account: Option<String>,
    pub service_account_role_name: Option<String>,
    pub velero_plugin_version: Option<String>,
    pub velero_arguments: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawRestoreOptions {
    pub backup_name: Option<String>,
    pub velero_arguments: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawUpgradeOptions {
    #[serde(rename = "DesiredEKSVersion")]
    pub desired_eks_version: Option<String>,
    pub addons_to_update: Option<Vec<String>>,
    pub common_launch_template_version: Option<String>,
    pub managed_node_groups: Option<Vec<RawManagedNodeGroup>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawManagedNodeGroup {
    pub name: Option<String>,
    pub launch_template_version: Option<String>,
}

/// Normalize the buckets the given pipeline consumes into validated work
/// items. The backup pipeline consumes both the `Backup` and the `Restore`
/// bucket; the others consume their own bucket only.
pub fn normalize_request(
    pipeline: Pipeline,
    buckets: &ClusterBuckets,
    defaults: &RunDefaults,
    today: NaiveDate,
) -> Result<Vec<WorkItem>> {
    let mut items = Vec::new();
    match pipeline {
        Pipeline::Summary => {
            for raw in &buckets.summary {
                items.push(normalize_summary(raw)?);
            }
        }
        Pipeline::Backup => {
            for raw in &buckets.backup {
                items.push(normalize_backup(raw, defaults, today)?);
            }
            for raw in &buckets.restore {
                items.push(normalize_restore(raw)?);
            }
        }
        Pipeline::Upgrade => {
            for raw in &buckets.upgrade {
                items.push(normalize_upgrade(raw, defaults)?);
            }
        }
    }
    debug!(
        pipeline = pipeline.name(),
        count = items.len(),
        "normalized request buckets"
    );
    Ok(items)
}

// Summary items are valid regardless of the Action tag they carry.
fn normalize_summary(raw: &RawClusterItem) -> Result<WorkItem> {
    let (account_id, region, cluster_name) = identity(raw)?;
    Ok(WorkItem {
        account_id,
        region,
        cluster_name,
        work: Work::Summary,
    })
}

fn normalize_backup(
    raw: &RawClusterItem,
    defaults: &RunDefaults,
    today: NaiveDate,
) -> Result<WorkItem> {
    let (account_id, region, cluster_name) = identity(raw)?;
    check_action_tag(raw, Action::Backup, &cluster_name)?;

    let provided = raw.backup_options.clone().unwrap_or_default();
    let backup_name = provided
        .backup_name
        .unwrap_or_else(|| format!("{}-{}-{}", today.format("%Y-%m-%d"), region, cluster_name))
        .to_lowercase();
    let service_account_role_name = provided
        .service_account_role_name
        .unwrap_or_else(|| format!("{}-{}-Role", defaults.role_prefix, cluster_name));

    let role_length = service_account_role_name.len();
    if !(MIN_ROLE_NAME_LENGTH..=MAX_ROLE_NAME_LENGTH).contains(&role_length) {
        return Err(Error::Validation(format!(
            "service account role name for {cluster_name} must be between \
             {MIN_ROLE_NAME_LENGTH} and {MAX_ROLE_NAME_LENGTH} characters, got {role_length}"
        )));
    }

    Ok(WorkItem {
        account_id,
        region,
        cluster_name,
        work: Work::Backup(BackupOptions {
            backup_name,
            velero_namespace: provided
                .velero_namespace
                .unwrap_or_else(|| defaults.velero_namespace.clone()),
            service_account: provided
                .service_account
                .unwrap_or_else(|| defaults.service_account.clone()),
            service_account_role_name,
            velero_plugin_version: provided
                .velero_plugin_version
                .unwrap_or_else(|| defaults.velero_plugin_version.clone()),
            velero_arguments: provided.velero_arguments.unwrap_or_default(),
        }),
    })
}

fn normalize_restore(raw: &RawClusterItem) -> Result<WorkItem> {
    let (account_id, region, cluster_name) = identity(raw)?;
    check_action_tag(raw, Action::Restore, &cluster_name)?;

    let provided = raw.restore_options.clone().unwrap_or_default();
    let backup_name = provided.backup_name.ok_or_else(|| {
        Error::Validation(format!("BackupName is required to restore {cluster_name}"))
    })?;

    Ok(WorkItem {
        account_id,
        region,
        cluster_name,
        work: Work::Restore(RestoreOptions {
            backup_name: backup_name.to_lowercase(),
            velero_arguments: provided.velero_arguments.unwrap_or_default(),
        }),
    })
}

fn normalize_upgrade(raw: &RawClusterItem, defaults: &RunDefaults) -> Result<WorkItem> {
    let (account_id, region, cluster_name) = identity(raw)?;
    check_action_tag(raw, Action::Upgrade, &cluster_name)?;

    let provided = raw.upgrade_options.clone().unwrap_or_default();

    let mut managed_node_groups = Vec::new();
    for group in provided.managed_node_groups.unwrap_or_default() {
        let name = match group.name {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(Error::Validation(format!(
                    "every managed node group for {cluster_name} must carry a Name"
                )))
            }
        };
        managed_node_groups.push(ManagedNodeGroup {
            name,
            launch_template_version: group.launch_template_version,
        });
    }

    Ok(WorkItem {
        account_id,
        region,
        cluster_name,
        work: Work::Upgrade(UpgradeOptions {
            desired_eks_version: provided
                .desired_eks_version
                .unwrap_or_else(|| defaults.desired_eks_version.clone()),
            addons_to_update: provided.addons_to_update.unwrap_or_default(),
            common_launch_template_version: provided.common_launch_template_version,
            managed_node_groups,
        }),
    })
}

fn identity(raw: &RawClusterItem) -> Result<(String, String, String)> {
    let cluster_name = non_empty(&raw.cluster_name)
        .ok_or_else(|| Error::Validation("ClusterName is required for every item".to_string()))?;
    let account_id = non_empty(&raw.account_id).ok_or_else(|| {
        Error::Validation(format!("AccountId is required for {cluster_name}"))
    })?;
    let region = non_empty(&raw.region)
        .ok_or_else(|| Error::Validation(format!("Region is required for {cluster_name}")))?;
    Ok((account_id, region, cluster_name))
}

fn check_action_tag(raw: &RawClusterItem, expected: Action, cluster: &str) -> Result<()> {
    if let Some(tag) = &raw.action {
        let action: Action = tag.parse()?;
        if action != expected {
            return Err(Error::Validation(format!(
                "{cluster} carries action {action} but was submitted for {expected}"
            )));
        }
    }
    Ok(())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|v| !v.is_empty()).map(str::to_string)
}
