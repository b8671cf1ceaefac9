//! Pre-built test data

use armada_core::normalize::RunDefaults;
use armada_directory::TenantRecord;
use armada_dispatch::DispatchSettings;

pub const ACCOUNT_A: &str = "111122223333";
pub const ACCOUNT_B: &str = "444455556666";
pub const REGION_A: &str = "us-east-1";
pub const REGION_B: &str = "eu-west-1";

pub fn tenant(account: &str, region: &str) -> TenantRecord {
    TenantRecord {
        account_id: account.to_string(),
        region: region.to_string(),
        execution_role_name: None,
    }
}

pub fn tenant_with_role(account: &str, region: &str, role: &str) -> TenantRecord {
    TenantRecord {
        execution_role_name: Some(role.to_string()),
        ..tenant(account, region)
    }
}

pub fn defaults() -> RunDefaults {
    RunDefaults::default()
}

pub fn settings() -> DispatchSettings {
    DispatchSettings {
        document_name: "Armada-FleetOperations".to_string(),
        assume_role: format!("arn:aws:iam::{ACCOUNT_A}:role/Armada-Admin"),
        s3_bucket: "armada-reports".to_string(),
    }
}
