//! Canonical work items.
//!
//! A [`WorkItem`] is one validated (account, region, cluster, action) unit of
//! automation work. The action-specific options ride in the [`Work`] tagged
//! union so that a backup item cannot be asked for its upgrade options. On
//! the wire (the `EKSClusters` automation parameter) items keep the flat
//! PascalCase shape the execution hosts expect; conversion to and from that
//! shape lives in [`WireItem`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Pipeline action a work item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Summary,
    Backup,
    Restore,
    Upgrade,
    /// Synthesized by the cluster filter for no-input bulk runs.
    Default,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Summary => "SUMMARY",
            Action::Backup => "BACKUP",
            Action::Restore => "RESTORE",
            Action::Upgrade => "UPGRADE",
            Action::Default => "DEFAULT",
        }
    }
}

impl std::str::FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SUMMARY" => Ok(Action::Summary),
            "BACKUP" => Ok(Action::Backup),
            "RESTORE" => Ok(Action::Restore),
            "UPGRADE" => Ok(Action::Upgrade),
            "DEFAULT" => Ok(Action::Default),
            other => Err(Error::Validation(format!("unknown action '{other}'"))),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Velero backup options, fully defaulted by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BackupOptions {
    pub backup_name: String,
    pub velero_namespace: String,
    pub service_account: String,
    pub service_account_role_name: String,
    pub velero_plugin_version: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub velero_arguments: BTreeMap<String, String>,
}

/// Velero restore options. The backup name is mandatory; there is nothing
/// sensible to default it to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RestoreOptions {
    pub backup_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub velero_arguments: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManagedNodeGroup {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_template_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpgradeOptions {
    #[serde(rename = "DesiredEKSVersion")]
    pub desired_eks_version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addons_to_update: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_launch_template_version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub managed_node_groups: Vec<ManagedNodeGroup>,
}

/// Action-specific payload of a work item. Each instance owns its own
/// collections; nothing here is shared between items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Work {
    Summary,
    Backup(BackupOptions),
    Restore(RestoreOptions),
    Upgrade(UpgradeOptions),
    /// Cluster discovered on the host rather than named in the request.
    Default,
}

impl Work {
    pub fn action(&self) -> Action {
        match self {
            Work::Summary => Action::Summary,
            Work::Backup(_) => Action::Backup,
            Work::Restore(_) => Action::Restore,
            Work::Upgrade(_) => Action::Upgrade,
            Work::Default => Action::Default,
        }
    }
}

/// One validated unit of automation work. Immutable once built by the
/// normalizer; consumed once by the step engine; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireItem", into = "WireItem")]
pub struct WorkItem {
    pub account_id: String,
    pub region: String,
    pub cluster_name: String,
    pub work: Work,
}

impl WorkItem {
    pub fn action(&self) -> Action {
        self.work.action()
    }

    /// Item synthesized by the cluster filter for a host-visible cluster.
    pub fn discovered(account_id: &str, region: &str, cluster_name: &str) -> Self {
        WorkItem {
            account_id: account_id.to_string(),
            region: region.to_string(),
            cluster_name: cluster_name.to_string(),
            work: Work::Default,
        }
    }

    pub fn backup_options(&self) -> Option<&BackupOptions> {
        match &self.work {
            Work::Backup(opts) => Some(opts),
            _ => None,
        }
    }

    pub fn restore_options(&self) -> Option<&RestoreOptions> {
        match &self.work {
            Work::Restore(opts) => Some(opts),
            _ => None,
        }
    }

    pub fn upgrade_options(&self) -> Option<&UpgradeOptions> {
        match &self.work {
            Work::Upgrade(opts) => Some(opts),
            _ => None,
        }
    }
}

/// Flat wire shape shared with the execution hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireItem {
    account_id: String,
    region: String,
    cluster_name: String,
    action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    backup_options: Option<BackupOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    restore_options: Option<RestoreOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    upgrade_options: Option<UpgradeOptions>,
}

impl From<WorkItem> for WireItem {
    fn from(item: WorkItem) -> Self {
        let mut wire = WireItem {
            account_id: item.account_id,
            region: item.region,
            cluster_name: item.cluster_name,
            action: item.work.action(),
            backup_options: None,
            restore_options: None,
            upgrade_options: None,
        };
        match item.work {
            Work::Summary | Work::Default => {}
            Work::Backup(opts) => wire.backup_options = Some(opts),
            Work::Restore(opts) => wire.restore_options = Some(opts),
            Work::Upgrade(opts) => wire.upgrade_options = Some(opts),
        }
        wire
    }
}

impl TryFrom<WireItem> for WorkItem {
    type Error = Error;

    fn try_from(wire: WireItem) -> Result<Self> {
        let cluster = wire.cluster_name.clone();
        let missing = |what: &str| {
            Error::Validation(format!("{cluster} is missing {what}"))
        };
        let work = match wire.action {
            Action::Summary => Work::Summary,
            Action::Default => Work::Default,
            Action::Backup => Work::Backup(wire.backup_options.ok_or_else(|| missing("BackupOptions"))?),
            Action::Restore => {
                Work::Restore(wire.restore_options.ok_or_else(|| missing("RestoreOptions"))?)
            }
            Action::Upgrade => {
                Work::Upgrade(wire.upgrade_options.ok_or_else(|| missing("UpgradeOptions"))?)
            }
        };
        Ok(WorkItem {
            account_id: wire.account_id,
            region: wire.region,
            cluster_name: wire.cluster_name,
            work,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backup_item() -> WorkItem {
        WorkItem {
            account_id: "111122223333".to_string(),
            region: "us-east-1".to_string(),
            cluster_name: "payments".to_string(),
            work: Work::Backup(BackupOptions {
                backup_name: "2024-05-01-us-east-1-payments".to_string(),
                velero_namespace: "velero".to_string(),
                service_account: "eks-management-velero-service-account".to_string(),
                service_account_role_name: "eks-management-sa-payments-Role".to_string(),
                velero_plugin_version: "v1.10.1".to_string(),
                velero_arguments: BTreeMap::new(),
            }),
        }
    }

    #[test]
    fn wire_round_trip_preserves_backup_item() {
        let item = backup_item();
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["Action"], "BACKUP");
        assert_eq!(json["ClusterName"], "payments");
        assert_eq!(
            json["BackupOptions"]["BackupName"],
            "2024-05-01-us-east-1-payments"
        );
        assert!(json.get("UpgradeOptions").is_none());

        let parsed: WorkItem = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, item);
    }

    #[test]
    fn upgrade_wire_uses_eks_capitalization() {
        let item = WorkItem {
            account_id: "111122223333".to_string(),
            region: "eu-west-1".to_string(),
            cluster_name: "ledger".to_string(),
            work: Work::Upgrade(UpgradeOptions {
                desired_eks_version: "1.29".to_string(),
                addons_to_update: vec!["coredns".to_string()],
                common_launch_template_version: None,
                managed_node_groups: vec![],
            }),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["UpgradeOptions"]["DesiredEKSVersion"], "1.29");
    }

    #[test]
    fn action_mismatched_payload_is_rejected() {
        let json = serde_json::json!({
            "AccountId": "111122223333",
            "Region": "us-east-1",
            "ClusterName": "payments",
            "Action": "RESTORE"
        });
        let err = serde_json::from_value::<WorkItem>(json).unwrap_err();
        assert!(err.to_string().contains("RestoreOptions"));
    }

    #[test]
    fn action_parses_screaming_case() {
        assert_eq!("BACKUP".parse::<Action>().unwrap(), Action::Backup);
        assert!("backup".parse::<Action>().is_err());
    }
}
