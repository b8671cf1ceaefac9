//! Target resolution.
//!
//! A [`Target`] is one fan-out destination for the automation dispatcher.
//! Requests may name their targets explicitly; otherwise the resolver scans
//! the tenant directory and keeps the tenants the work items reference.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use armada_core::WorkItem;

use crate::directory::{scan_all, TenantDirectory, TenantRecord};
use crate::{Error, Result};

/// Role assumed in the tenant account when a record does not name one.
pub const DEFAULT_EXECUTION_ROLE: &str = "EKSManagement-SSMAutomationExecutionRole";

/// Per-target-location rollout bounds.
pub const TARGET_MAX_CONCURRENCY: &str = "10";
pub const TARGET_MAX_ERRORS: &str = "1";

/// One fan-out destination, in the dispatcher's wire shape. The account and
/// region lists are singletons in practice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Target {
    pub accounts: Vec<String>,
    pub regions: Vec<String>,
    pub execution_role_name: String,
    pub target_location_max_concurrency: String,
    pub target_location_max_errors: String,
}

impl Target {
    fn for_tenant(account_id: &str, region: &str, role: Option<&str>) -> Self {
        Target {
            accounts: vec![account_id.to_string()],
            regions: vec![region.to_string()],
            execution_role_name: role.unwrap_or(DEFAULT_EXECUTION_ROLE).to_string(),
            target_location_max_concurrency: TARGET_MAX_CONCURRENCY.to_string(),
            target_location_max_errors: TARGET_MAX_ERRORS.to_string(),
        }
    }
}

/// Explicit target entry of a raw request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RequestTarget {
    pub account_id: String,
    pub region: String,
    pub execution_role_name: Option<String>,
}

/// Resolve the fan-out targets for a request.
///
/// Explicit request targets convert 1:1 with no deduplication. Without
/// explicit targets the directory is scanned to exhaustion and, when the work
/// items are non-empty, narrowed to the account and region sets they
/// reference. Zero surviving targets is a `NotFound`; callers surface it as
/// the user-actionable "onboard the tenant first" condition.
#[instrument(skip_all, fields(explicit = requested.len(), items = items.len()))]
pub async fn resolve_targets(
    requested: &[RequestTarget],
    items: &[WorkItem],
    directory: &dyn TenantDirectory,
) -> Result<Vec<Target>> {
    if !requested.is_empty() {
        return Ok(requested
            .iter()
            .map(|t| Target::for_tenant(&t.account_id, &t.region, t.execution_role_name.as_deref()))
            .collect());
    }

    let records = scan_all(directory).await?;
    debug!(onboarded = records.len(), "scanned tenant directory");

    let accounts: BTreeSet<&str> = items.iter().map(|i| i.account_id.as_str()).collect();
    let regions: BTreeSet<&str> = items.iter().map(|i| i.region.as_str()).collect();

    let keep = |record: &TenantRecord| {
        items.is_empty()
            || (accounts.contains(record.account_id.as_str())
                && regions.contains(record.region.as_str()))
    };

    let targets: Vec<Target> = records
        .iter()
        .filter(|r| keep(r))
        .map(|r| Target::for_tenant(&r.account_id, &r.region, r.execution_role_name.as_deref()))
        .collect();

    if targets.is_empty() {
        return Err(Error::NotFound(
            "no onboarded tenants match the requested clusters".to_string(),
        ));
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use armada_core::{Work, WorkItem};
    use async_trait::async_trait;

    use crate::directory::{Page, ScanCursor};

    /// In-memory directory that serves records one per page, so resolver
    /// tests also exercise cursor continuation.
    struct StaticDirectory {
        records: Vec<TenantRecord>,
    }

    #[async_trait]
    impl TenantDirectory for StaticDirectory {
        async fn scan(&self, cursor: Option<ScanCursor>) -> Result<Page> {
            let offset: usize = match &cursor {
                Some(c) => c.as_str().parse().unwrap(),
                None => 0,
            };
            let records = self
                .records
                .get(offset..(offset + 1).min(self.records.len()))
                .map(<[TenantRecord]>::to_vec)
                .unwrap_or_default();
            let next =
                (offset + 1 < self.records.len()).then(|| ScanCursor::new((offset + 1).to_string()));
            Ok(Page {
                records,
                next_cursor: next,
            })
        }

        async fn put(&self, _record: TenantRecord) -> Result<()> {
            unimplemented!("read-only test directory")
        }
    }

    fn tenant(account: &str, region: &str) -> TenantRecord {
        TenantRecord {
            account_id: account.to_string(),
            region: region.to_string(),
            execution_role_name: None,
        }
    }

    fn summary_item(account: &str, region: &str, cluster: &str) -> WorkItem {
        WorkItem {
            account_id: account.to_string(),
            region: region.to_string(),
            cluster_name: cluster.to_string(),
            work: Work::Summary,
        }
    }

    #[tokio::test]
    async fn explicit_targets_convert_one_to_one() {
        let directory = StaticDirectory { records: vec![] };
        let requested = vec![RequestTarget {
            account_id: "111122223333".to_string(),
            region: "us-east-1".to_string(),
            execution_role_name: None,
        }];
        let targets = resolve_targets(&requested, &[], &directory).await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].accounts, vec!["111122223333"]);
        assert_eq!(targets[0].execution_role_name, DEFAULT_EXECUTION_ROLE);
        assert_eq!(targets[0].target_location_max_concurrency, "10");
        assert_eq!(targets[0].target_location_max_errors, "1");
    }

    #[tokio::test]
    async fn directory_scan_is_narrowed_by_work_items() {
        let directory = StaticDirectory {
            records: vec![
                tenant("111122223333", "us-east-1"),
                tenant("444455556666", "us-east-1"),
                tenant("111122223333", "eu-west-1"),
            ],
        };
        let items = vec![summary_item("111122223333", "us-east-1", "payments")];
        let targets = resolve_targets(&[], &items, &directory).await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].accounts, vec!["111122223333"]);
        assert_eq!(targets[0].regions, vec!["us-east-1"]);
    }

    #[tokio::test]
    async fn empty_work_items_keep_every_tenant() {
        let directory = StaticDirectory {
            records: vec![
                tenant("111122223333", "us-east-1"),
                tenant("444455556666", "eu-west-1"),
            ],
        };
        let targets = resolve_targets(&[], &[], &directory).await.unwrap();
        assert_eq!(targets.len(), 2);
    }

    #[tokio::test]
    async fn no_matching_tenant_is_not_found() {
        let directory = StaticDirectory {
            records: vec![tenant("111122223333", "us-east-1")],
        };
        let items = vec![summary_item("999988887777", "us-east-1", "payments")];
        let err = resolve_targets(&[], &items, &directory).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
