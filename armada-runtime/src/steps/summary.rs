//! Cluster metadata summary step.
//!
//! A bash script collects the raw cluster metadata into a JSON file; this
//! step reshapes that file into the flattened summary report and splits the
//! worker node inventory into its own CSV table.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use armada_core::WorkItem;

use crate::context::StepContext;
use crate::engine::Step;
use crate::providers::BlobStore;
use crate::report::{self, upload_reports, JsonMap};
use crate::shell::ProcessRunner;
use crate::steps::{METADATA_STEP, WORKER_NODE_METADATA_STEP};
use crate::{Error, Result};

const METADATA_SCRIPT: &str = "metadata.sh";

/// `AddonDetails` keys the script reports as `image|version` pairs.
const ADDON_DETAIL_KEYS: [&str; 3] = ["CoreDns", "KubeProxy", "AWSNode"];

const WORKER_NODES_KEY: &str = "WorkerNodes";

const WORKER_NODE_HEADERS: [&str; 3] = ["Name", "KubeletVersion", "Data"];

pub struct ClusterMetadataStep {
    blobs: Arc<dyn BlobStore>,
    runner: Arc<dyn ProcessRunner>,
}

impl ClusterMetadataStep {
    pub fn new(blobs: Arc<dyn BlobStore>, runner: Arc<dyn ProcessRunner>) -> Self {
        ClusterMetadataStep { blobs, runner }
    }
}

#[async_trait]
impl Step for ClusterMetadataStep {
    fn name(&self) -> &str {
        METADATA_STEP
    }

    #[instrument(skip(self, ctx, item), fields(cluster = %item.cluster_name))]
    async fn run(&self, ctx: &StepContext, item: &WorkItem) -> Result<()> {
        let cluster = &item.cluster_name;
        let report_file = ctx.json_report_file(cluster, METADATA_STEP);
        if let Some(parent) = report_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let args = vec![
            ctx.working_dir.to_string_lossy().into_owned(),
            cluster.clone(),
            report_file.to_string_lossy().into_owned(),
        ];
        let code = self.runner.run(&ctx.script_file(METADATA_SCRIPT), &args).await?;
        if code != 0 {
            return Err(Error::step_failure(
                self.name(),
                cluster,
                format!("metadata script exited with {code}"),
            ));
        }

        let mut report = report::read_json_report(&report_file)?;
        reshape_addon_details(&mut report);

        let worker_nodes = report
            .remove(WORKER_NODES_KEY)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let rows = parse_worker_nodes(&worker_nodes);
        let csv_file = ctx.csv_report_file(cluster, WORKER_NODE_METADATA_STEP);
        if rows.is_empty() {
            warn!("no worker nodes reported");
            report::write_csv_placeholder(
                &csv_file,
                &["Id", "Name", "KubeletVersion", "Data"],
                &["1", "", "", "N/A"],
            )?;
        } else {
            report::write_csv(&csv_file, &WORKER_NODE_HEADERS, &rows)?;
        }

        report::write_json_report(&report_file, &report::flatten_json(&report))?;
        info!(nodes = rows.len(), "cluster metadata collected");

        // The engine ships the clusterMetadata directory; the worker node
        // table lives under its own report name and goes up here.
        upload_reports(self.blobs.as_ref(), ctx, cluster, WORKER_NODE_METADATA_STEP).await
    }
}

/// Rewrite the `image|version` addon detail strings into `{Details: version}`
/// objects. An addon that is absent or blank keeps a null `Details`.
fn reshape_addon_details(report: &mut JsonMap) {
    let Some(Value::Object(details)) = report.get_mut("AddonDetails") else {
        return;
    };
    for key in ADDON_DETAIL_KEYS {
        let version = details
            .get(key)
            .and_then(Value::as_str)
            .and_then(split_detail_version);
        details.insert(
            key.to_string(),
            json!({ "Details": version }),
        );
    }
}

fn split_detail_version(raw: &str) -> Option<String> {
    let version = raw.split('|').nth(1)?;
    if version.is_empty() {
        None
    } else {
        Some(version.to_string())
    }
}

/// Parse the `name|kubeletVersion;name|kubeletVersion` inventory string the
/// metadata script emits into CSV rows.
fn parse_worker_nodes(raw: &str) -> Vec<Vec<String>> {
    raw.split(';')
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.splitn(2, '|');
            let name = parts.next().unwrap_or_default().to_string();
            let kubelet = parts.next().unwrap_or_default().to_string();
            vec![name, kubelet, "A".to_string()]
        })
        .collect()
}
