//! Version arithmetic for control planes and addons.
//!
//! Control-plane versions look like `1.28`; addon versions look like
//! `v1.16.0-eksbuild.1`. Upgrades advance one minor version per run, so most
//! of this module is about extracting and comparing minor components.

use crate::{Error, Result};

/// Addons the update step knows how to drive. Anything else is reported as
/// "update manually".
pub const SUPPORTED_ADDONS_FOR_UPDATE: [&str; 11] = [
    "vpc-cni",
    "coredns",
    "kube-proxy",
    "aws-ebs-csi-driver",
    "aws-efs-csi-driver",
    "snapshot-controller",
    "adot",
    "aws-guardduty-agent",
    "amazon-cloudwatch-observability",
    "eks-pod-identity-agent",
    "aws-mountpoint-s3-csi-driver",
];

/// Addons updated when the request does not name any.
pub const DEFAULT_ADDONS_FOR_UPDATE: [&str; 3] = ["vpc-cni", "coredns", "kube-proxy"];

/// Addons that only tolerate one minor version step per update.
pub const MINOR_VERSION_UPDATE_ADDONS: [&str; 2] = ["vpc-cni", "eks-pod-identity-agent"];

/// One row of a provider's addon version catalog for a given Kubernetes
/// version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddonCatalogEntry {
    pub version: String,
    pub is_default: bool,
}

/// How the target version for an addon update is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStrategy {
    /// Take the catalog's default version for the desired Kubernetes version.
    DefaultVersion,
    /// Advance exactly one minor version from the currently installed one.
    MinorVersion,
}

pub fn strategy_for(addon: &str) -> UpdateStrategy {
    if MINOR_VERSION_UPDATE_ADDONS.contains(&addon) {
        UpdateStrategy::MinorVersion
    } else {
        UpdateStrategy::DefaultVersion
    }
}

/// Minor component of a control-plane version string such as `1.28`.
pub fn cluster_minor(version: &str) -> Result<u32> {
    let mut parts = version.split('.');
    let major = parts.next().unwrap_or_default();
    let minor = parts.next().ok_or_else(|| bad_version(version))?;
    if major.parse::<u32>().is_err() {
        return Err(bad_version(version));
    }
    minor.parse::<u32>().map_err(|_| bad_version(version))
}

/// A control-plane upgrade is eligible only when the desired version is
/// exactly one minor step above the current one.
pub fn is_one_minor_upgrade(current: &str, desired: &str) -> Result<bool> {
    let current_minor = cluster_minor(current)?;
    let desired_minor = cluster_minor(desired)?;
    Ok(desired_minor == current_minor + 1)
}

/// Minor component of an addon version string such as `v1.16.0-eksbuild.1`.
pub fn addon_minor(version: &str) -> Result<u32> {
    let stripped = version.strip_prefix('v').unwrap_or(version);
    let mut parts = stripped.split('.');
    let _major = parts.next().ok_or_else(|| bad_version(version))?;
    let minor = parts.next().ok_or_else(|| bad_version(version))?;
    minor.parse::<u32>().map_err(|_| bad_version(version))
}

/// The catalog entry flagged as default for the desired Kubernetes version.
pub fn default_version(catalog: &[AddonCatalogEntry]) -> Result<&str> {
    catalog
        .iter()
        .find(|entry| entry.is_default)
        .map(|entry| entry.version.as_str())
        .ok_or_else(|| Error::InvalidVersion("addon catalog has no default version".to_string()))
}

/// Target version for the one-minor-step strategy.
///
/// Prefers the catalog default when it sits on `current_minor + 1`, then the
/// lexicographically smallest entry on that minor. A catalog with nothing on
/// that minor falls back to the default version.
pub fn next_minor_version<'a>(current: &str, catalog: &'a [AddonCatalogEntry]) -> Result<&'a str> {
    let target_minor = addon_minor(current)? + 1;

    let mut smallest: Option<&'a str> = None;
    for entry in catalog {
        if addon_minor(&entry.version)? != target_minor {
            continue;
        }
        if entry.is_default {
            return Ok(&entry.version);
        }
        match smallest {
            Some(existing) if existing.as_bytes() <= entry.version.as_bytes() => {}
            _ => smallest = Some(&entry.version),
        }
    }

    match smallest {
        Some(version) => Ok(version),
        None => default_version(catalog),
    }
}

/// Target version for an addon update, chosen per the addon's strategy.
pub fn update_version<'a>(
    addon: &str,
    current: &str,
    catalog: &'a [AddonCatalogEntry],
) -> Result<&'a str> {
    match strategy_for(addon) {
        UpdateStrategy::DefaultVersion => default_version(catalog),
        UpdateStrategy::MinorVersion => next_minor_version(current, catalog),
    }
}

fn bad_version(version: &str) -> Error {
    Error::InvalidVersion(format!("cannot parse version '{version}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(version: &str, is_default: bool) -> AddonCatalogEntry {
        AddonCatalogEntry {
            version: version.to_string(),
            is_default,
        }
    }

    #[test]
    fn one_minor_step_is_eligible() {
        assert!(is_one_minor_upgrade("1.28", "1.29").unwrap());
    }

    #[test]
    fn multi_minor_jump_is_not_eligible() {
        assert!(!is_one_minor_upgrade("1.28", "1.30").unwrap());
        assert!(!is_one_minor_upgrade("1.28", "1.28").unwrap());
        assert!(!is_one_minor_upgrade("1.29", "1.28").unwrap());
    }

    #[test]
    fn malformed_cluster_version_is_rejected() {
        assert!(cluster_minor("latest").is_err());
        assert!(is_one_minor_upgrade("1.28", "one.29").is_err());
    }

    #[test]
    fn minor_strategy_prefers_default_on_the_boundary() {
        let catalog = vec![
            entry("v1.1.2-eksbuild.1", false),
            entry("v1.2.0-eksbuild.1", true),
            entry("v1.2.1-eksbuild.1", false),
        ];
        let picked = next_minor_version("v1.1.0-eksbuild.1", &catalog).unwrap();
        assert_eq!(picked, "v1.2.0-eksbuild.1");
    }

    #[test]
    fn minor_strategy_takes_smallest_without_a_default_on_the_boundary() {
        let catalog = vec![
            entry("v1.2.5-eksbuild.2", false),
            entry("v1.2.1-eksbuild.1", false),
            entry("v1.3.0-eksbuild.1", true),
        ];
        let picked = next_minor_version("v1.1.0-eksbuild.1", &catalog).unwrap();
        assert_eq!(picked, "v1.2.1-eksbuild.1");
    }

    #[test]
    fn minor_strategy_falls_back_to_default_when_boundary_is_empty() {
        let catalog = vec![
            entry("v1.4.0-eksbuild.1", true),
            entry("v1.4.1-eksbuild.1", false),
        ];
        let picked = next_minor_version("v1.1.0-eksbuild.1", &catalog).unwrap();
        assert_eq!(picked, "v1.4.0-eksbuild.1");
    }

    #[test]
    fn strategy_table_matches_addon_allow_list() {
        assert_eq!(strategy_for("vpc-cni"), UpdateStrategy::MinorVersion);
        assert_eq!(
            strategy_for("eks-pod-identity-agent"),
            UpdateStrategy::MinorVersion
        );
        assert_eq!(strategy_for("coredns"), UpdateStrategy::DefaultVersion);
    }

    #[test]
    fn addon_minor_parses_eksbuild_versions() {
        assert_eq!(addon_minor("v1.16.0-eksbuild.1").unwrap(), 16);
        assert!(addon_minor("nonsense").is_err());
    }
}
