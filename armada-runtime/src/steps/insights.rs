//! Upgrade-readiness insight step.
//!
//! Lists the cluster's readiness insights for the desired Kubernetes
//! version, expands each into its deprecated API usages, and writes the
//! findings as a CSV table. A cluster with nothing to report still gets a
//! table with a single placeholder row.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use armada_core::WorkItem;

use crate::context::StepContext;
use crate::engine::Step;
use crate::providers::{ClusterProvider, DeprecatedApiUsage, InsightDetail};
use crate::report;
use crate::steps::DEPRECATED_APIS_STEP;
use crate::Result;

const CSV_HEADERS: [&str; 10] = [
    "Name",
    "ApiVersion",
    "RuleSet",
    "ReplaceWith",
    "SinceVersion",
    "StopVersion",
    "RequestsInLast30Days",
    "InsightStatus",
    "Message",
    "Data",
];

pub struct DeprecatedApisStep {
    provider: Arc<dyn ClusterProvider>,
    kubernetes_version: String,
}

impl DeprecatedApisStep {
    pub fn new(provider: Arc<dyn ClusterProvider>, kubernetes_version: &str) -> Self {
        DeprecatedApisStep {
            provider,
            kubernetes_version: kubernetes_version.to_string(),
        }
    }
}

#[async_trait]
impl Step for DeprecatedApisStep {
    fn name(&self) -> &str {
        DEPRECATED_APIS_STEP
    }

    #[instrument(skip(self, ctx, item), fields(cluster = %item.cluster_name))]
    async fn run(&self, ctx: &StepContext, item: &WorkItem) -> Result<()> {
        let cluster = &item.cluster_name;
        let csv_file = ctx.csv_report_file(cluster, DEPRECATED_APIS_STEP);

        let insights = self
            .provider
            .list_insights(cluster, &self.kubernetes_version)
            .await?;
        if insights.is_empty() {
            info!("no insights related to update readiness");
            return write_placeholder(&csv_file);
        }

        let mut rows = Vec::new();
        for insight in &insights {
            let detail = self.provider.describe_insight(cluster, &insight.id).await?;
            for deprecated in &detail.deprecations {
                rows.push(row(&detail, deprecated, &insight.name));
            }
        }

        if rows.is_empty() {
            info!("insights carry no deprecated API usages");
            return write_placeholder(&csv_file);
        }
        info!(findings = rows.len(), "deprecated API usages found");
        report::write_csv(&csv_file, &CSV_HEADERS, &rows)
    }
}

fn write_placeholder(csv_file: &std::path::Path) -> Result<()> {
    report::write_csv_placeholder(
        csv_file,
        &[
            "Id",
            "Name",
            "ApiVersion",
            "RuleSet",
            "ReplaceWith",
            "SinceVersion",
            "StopVersion",
            "RequestsInLast30Days",
            "InsightStatus",
            "Message",
            "Data",
        ],
        &["1", "", "", "", "", "", "", "0", "", "No deprecated API found", "N/A"],
    )
}

fn row(detail: &InsightDetail, deprecated: &DeprecatedApiUsage, rule_set: &str) -> Vec<String> {
    let (name, api_version) = split_usage(&deprecated.usage);
    let requests: u64 = deprecated.client_requests_last_30_days.iter().sum();
    vec![
        name,
        api_version,
        rule_set.to_string(),
        deprecated.replaced_with.clone().unwrap_or_default(),
        deprecated.since_version.clone().unwrap_or_default(),
        deprecated.stop_version.clone().unwrap_or_default(),
        requests.to_string(),
        detail.status.clone().unwrap_or_default(),
        detail.recommendation.clone().unwrap_or_default(),
        "A".to_string(),
    ]
}

/// Split a usage path like `/apis/policy/v1beta1/podsecuritypolicies` into
/// the resource name and its `group/version` pair.
fn split_usage(usage: &str) -> (String, String) {
    let parts: Vec<&str> = usage.split('/').collect();
    let name = parts.last().copied().unwrap_or_default().to_string();
    let api_version = match (parts.get(2), parts.get(3)) {
        (Some(group), Some(version)) => format!("{group}/{version}"),
        _ => String::new(),
    };
    (name, api_version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_paths_split_into_name_and_api_version() {
        let (name, api_version) = split_usage("/apis/policy/v1beta1/podsecuritypolicies");
        assert_eq!(name, "podsecuritypolicies");
        assert_eq!(api_version, "policy/v1beta1");
    }

    #[test]
    fn short_usage_paths_keep_the_last_segment() {
        let (name, api_version) = split_usage("podsecuritypolicies");
        assert_eq!(name, "podsecuritypolicies");
        assert_eq!(api_version, "");
    }

    #[test]
    fn request_counts_sum_across_clients() {
        let detail = InsightDetail {
            status: Some("WARNING".to_string()),
            recommendation: Some("Migrate before upgrading".to_string()),
            deprecations: vec![],
        };
        let deprecated = DeprecatedApiUsage {
            usage: "/apis/flowcontrol.apiserver.k8s.io/v1beta2/flowschemas".to_string(),
            replaced_with: Some("/apis/flowcontrol.apiserver.k8s.io/v1beta3/flowschemas".to_string()),
            since_version: Some("1.26".to_string()),
            stop_version: Some("1.29".to_string()),
            client_requests_last_30_days: vec![12, 3],
        };
        let row = row(&detail, &deprecated, "DEPRECATED_APIS");
        assert_eq!(row[0], "flowschemas");
        assert_eq!(row[1], "flowcontrol.apiserver.k8s.io/v1beta2");
        assert_eq!(row[6], "15");
        assert_eq!(row[7], "WARNING");
    }
}
