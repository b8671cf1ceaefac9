//! Step execution engine.
//!
//! ```text
//!   Init ──► resolve relevant clusters (filter / synthesize)
//!     │
//!     ▼  per cluster, in input order
//!   StatusCheck ──not ACTIVE──► write + upload report ──► Aborted
//!     │ ACTIVE (or check disabled)
//!     ▼
//!   Run ──► step body, Result
//!     │
//!     ▼
//!   Upload ──► always, even when Run failed
//!     │
//!     ├─ Run failed ──► Aborted (remaining clusters are not processed)
//!     └─ ok ──► next cluster
//! ```
//!
//! The abort policy is deliberately all-or-nothing: one cluster's hard
//! failure halts the batch after its report is uploaded. Partial outcomes
//! inside a step (an addon that is not ACTIVE, a nodegroup already on the
//! desired version) are classifications in the report, not failures.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use armada_core::WorkItem;

use crate::context::StepContext;
use crate::filter::relevant_items;
use crate::providers::{BlobStore, ClusterProvider, ACTIVE_STATUS};
use crate::report;
use crate::{Error, Result};

/// One pipeline step, driven per cluster by the engine.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    /// Report the step writes into; several steps of one pipeline may share
    /// a report so their fields accumulate.
    fn report_name(&self) -> &str {
        self.name()
    }

    /// Step body for one cluster. `Ok` means continue with the next
    /// cluster; `Err` aborts the batch after the report upload.
    async fn run(&self, ctx: &StepContext, item: &WorkItem) -> Result<()>;
}

/// Per-step driver policy flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepPolicy {
    /// Narrow the carried work items to this host's scope. Ignored when the
    /// step tolerates an empty input set and none was supplied.
    pub filter_input: bool,
    /// Refuse to run without at least one relevant work item.
    pub input_required: bool,
    /// Verify the cluster is ACTIVE before the body runs.
    pub check_cluster_status: bool,
}

/// Outcome of one engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// All relevant clusters processed; names in processing order.
    Completed { clusters: Vec<String> },
    /// The step required input clusters and none were relevant here.
    NoClusters,
}

/// Drives a [`Step`] across the clusters of one host.
pub struct StepEngine {
    provider: Arc<dyn ClusterProvider>,
    blobs: Arc<dyn BlobStore>,
}

impl StepEngine {
    pub fn new(provider: Arc<dyn ClusterProvider>, blobs: Arc<dyn BlobStore>) -> Self {
        StepEngine { provider, blobs }
    }

    #[instrument(skip(self, step, ctx), fields(step = step.name(), account_id = %ctx.account_id, region = %ctx.region))]
    pub async fn run(
        &self,
        step: &dyn Step,
        policy: StepPolicy,
        ctx: &StepContext,
    ) -> Result<BatchOutcome> {
        let valid_clusters = self.provider.list_clusters().await?;

        // A step that tolerates missing input falls back to every cluster
        // this host can see.
        let filter_input =
            policy.filter_input && (policy.input_required || !ctx.input_items.is_empty());
        let items = relevant_items(
            filter_input,
            &valid_clusters,
            &ctx.input_items,
            &ctx.account_id,
            &ctx.region,
        );

        if items.is_empty() && policy.input_required {
            warn!(step = step.name(), "no relevant clusters to process");
            return Ok(BatchOutcome::NoClusters);
        }

        info!(step = step.name(), clusters = items.len(), "starting step");
        let mut processed = Vec::with_capacity(items.len());

        for item in &items {
            if policy.check_cluster_status {
                self.check_cluster_status(step, ctx, item).await?;
            }

            info!(step = step.name(), cluster = %item.cluster_name, "running step");
            let body = step.run(ctx, item).await;

            // Upload is guaranteed: it happens whether or not the body
            // failed, and a body failure wins over an upload failure.
            let upload =
                report::upload_reports(self.blobs.as_ref(), ctx, &item.cluster_name, step.report_name())
                    .await;

            if let Err(e) = body {
                error!(step = step.name(), cluster = %item.cluster_name, error = %e, "step failed, aborting batch");
                return Err(e);
            }
            upload?;
            processed.push(item.cluster_name.clone());
        }

        info!(step = step.name(), "step completed");
        Ok(BatchOutcome::Completed { clusters: processed })
    }

    /// Record the live cluster status in the report; a non-ACTIVE cluster
    /// aborts the batch after its report is uploaded.
    async fn check_cluster_status(
        &self,
        step: &dyn Step,
        ctx: &StepContext,
        item: &WorkItem,
    ) -> Result<()> {
        let cluster = &item.cluster_name;
        let info = self.provider.describe_cluster(cluster).await?;

        let report_file = ctx.json_report_file(cluster, step.report_name());
        let mut patch = report::JsonMap::new();
        patch.insert("ClusterStatus".to_string(), json!(info.status));
        report::merge_json_report(&report_file, patch)?;

        if info.status != ACTIVE_STATUS {
            error!(cluster = %cluster, status = %info.status, "cluster is not active, no actions can be performed");
            report::upload_reports(self.blobs.as_ref(), ctx, cluster, step.report_name()).await?;
            return Err(Error::step_failure(
                step.name(),
                cluster,
                format!("cluster status is {}", info.status),
            ));
        }
        Ok(())
    }
}
