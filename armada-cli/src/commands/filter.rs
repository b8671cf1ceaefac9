//! Filter command

use anyhow::Result;

use armada_core::WorkItem;
use armada_runtime::filter::relevant_items;

pub fn execute(input_file: &str, clusters: &str, account: &str, region: &str) -> Result<()> {
    let raw = std::fs::read_to_string(input_file)?;
    let items: Vec<WorkItem> = serde_json::from_str(&raw)?;
    let valid_clusters: Vec<String> = clusters
        .split(',')
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();

    let kept = relevant_items(true, &valid_clusters, &items, account, region);
    tracing::info!("{} of {} items are relevant here", kept.len(), items.len());
    println!("{}", serde_json::to_string_pretty(&kept)?);
    Ok(())
}
