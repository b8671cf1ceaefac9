//! Concrete pipeline steps.
//!
//! Step and report names are shared with the automation document and the
//! downstream report tables; changing them breaks both.

pub mod addons;
pub mod control_plane;
pub mod fargate;
pub mod insights;
pub mod nodegroups;
pub mod post_upgrade;
pub mod summary;
pub mod velero;

pub use addons::AddonsUpgradeStep;
pub use control_plane::ControlPlaneUpgradeStep;
pub use fargate::FargateProfilesRestartStep;
pub use insights::DeprecatedApisStep;
pub use nodegroups::NodegroupsUpgradeStep;
pub use post_upgrade::PostUpgradeStep;
pub use summary::ClusterMetadataStep;
pub use velero::{VeleroBackupStep, VeleroPluginStep, VeleroRestoreStep};

// Backup pipeline
pub const BACKUP_REPORT: &str = "backupAndRestore";
pub const VELERO_PLUGIN_STEP: &str = "veleroPlugin";
pub const VELERO_BACKUP_STEP: &str = "veleroBackup";
pub const VELERO_RESTORE_STEP: &str = "veleroRestore";
pub const BACKUP_S3_FOLDER: &str = "backup";

// Upgrade pipeline
pub const UPGRADE_REPORT: &str = "clustersUpgrade";
pub const CONTROL_PLANE_UPGRADE_STEP: &str = "controlPlaneUpgrade";
pub const NODE_GROUPS_UPGRADE_STEP: &str = "nodegroupsUpgrade";
pub const ADDONS_UPGRADE_STEP: &str = "addonsUpgrade";
pub const RESTART_FARGATE_PROFILES_STEP: &str = "restartFargateProfiles";
pub const POST_UPGRADE_STEP: &str = "postUpgrade";
pub const UPGRADE_S3_FOLDER: &str = "upgrade";

// Summary pipeline
pub const METADATA_STEP: &str = "clusterMetadata";
pub const WORKER_NODE_METADATA_STEP: &str = "workerNodeMetadata";
pub const DEPRECATED_APIS_STEP: &str = "deprecatedAPIs";
pub const SUMMARY_S3_FOLDER: &str = "summary";

/// Flatten a CLI argument map into the flag list handed to a script
/// (`{"--include-namespaces": "*"}` becomes `["--include-namespaces", "*"]`).
pub(crate) fn args_from_map(map: &std::collections::BTreeMap<String, String>) -> Vec<String> {
    let mut args = Vec::with_capacity(map.len() * 2);
    for (key, value) in map {
        args.push(key.clone());
        args.push(value.clone());
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn argument_maps_flatten_in_order() {
        let mut map = BTreeMap::new();
        map.insert("--include-namespaces".to_string(), "*".to_string());
        map.insert("--wait".to_string(), "true".to_string());
        assert_eq!(
            args_from_map(&map),
            vec!["--include-namespaces", "*", "--wait", "true"]
        );
    }
}
