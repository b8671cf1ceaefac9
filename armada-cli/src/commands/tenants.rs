//! Tenants command

use anyhow::Result;
use armada_directory::directory::scan_all;
use armada_directory::FileDirectory;

pub async fn execute(directory_file: &str) -> Result<()> {
    let directory = FileDirectory::new(directory_file);
    let records = scan_all(&directory).await?;

    if records.is_empty() {
        tracing::info!("No tenants onboarded");
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
