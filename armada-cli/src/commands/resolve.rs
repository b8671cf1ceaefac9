//! Resolve command
//!
//! Dry run of the front door: normalize the request for a pipeline and
//! resolve its targets, without starting anything.

use anyhow::Result;
use serde_json::json;

use armada_core::normalize::{normalize_request, Pipeline, RunDefaults};
use armada_directory::{resolve_targets, FileDirectory};
use armada_dispatch::AutomationRequest;

pub async fn execute(directory_file: &str, request_file: &str, pipeline: &str) -> Result<()> {
    let pipeline = match pipeline {
        "summary" => Pipeline::Summary,
        "backup" => Pipeline::Backup,
        "upgrade" => Pipeline::Upgrade,
        other => anyhow::bail!("unknown pipeline '{other}' (expected summary, backup, or upgrade)"),
    };

    let raw = std::fs::read_to_string(request_file)?;
    let request: AutomationRequest = serde_json::from_str(&raw)?;

    let today = chrono::Utc::now().date_naive();
    let items = normalize_request(pipeline, &request.clusters, &RunDefaults::default(), today)?;

    let directory = FileDirectory::new(directory_file);
    let targets = resolve_targets(&request.targets, &items, &directory).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "Pipeline": pipeline.name(),
            "WorkItems": items,
            "Targets": targets,
        }))?
    );
    Ok(())
}
