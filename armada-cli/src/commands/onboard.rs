//! Onboard command

use anyhow::Result;
use armada_directory::{FileDirectory, TenantDirectory, TenantRecord};

pub async fn execute(
    directory_file: &str,
    account: &str,
    region: &str,
    role: Option<&str>,
) -> Result<()> {
    let directory = FileDirectory::new(directory_file);
    directory
        .put(TenantRecord {
            account_id: account.to_string(),
            region: region.to_string(),
            execution_role_name: role.map(str::to_string),
        })
        .await?;

    tracing::info!("Onboarded {} / {}", account, region);
    Ok(())
}
