//! Launch-path tests against an in-memory directory and dispatcher.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use armada_core::normalize::{Pipeline, RunDefaults};
use armada_directory::directory::{Page, ScanCursor};
use armada_directory::{TenantDirectory, TenantRecord};
use armada_dispatch::dispatcher::{
    AutomationDispatcher, ExecutionDetail, ExecutionStatus, StartAutomation,
};
use armada_dispatch::request::ApiResponse;
use armada_dispatch::{launch, AutomationRequest, DispatchSettings, Error, Result};

struct MemoryDirectory {
    records: Vec<TenantRecord>,
}

#[async_trait]
impl TenantDirectory for MemoryDirectory {
    async fn scan(&self, _cursor: Option<ScanCursor>) -> armada_directory::Result<Page> {
        Ok(Page {
            records: self.records.clone(),
            next_cursor: None,
        })
    }

    async fn put(&self, _record: TenantRecord) -> armada_directory::Result<()> {
        unimplemented!("read-only test directory")
    }
}

#[derive(Default)]
struct CapturingDispatcher {
    started: Mutex<Vec<StartAutomation>>,
}

impl CapturingDispatcher {
    fn started(&self) -> Vec<StartAutomation> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl AutomationDispatcher for CapturingDispatcher {
    async fn start(&self, request: StartAutomation) -> Result<String> {
        self.started.lock().unwrap().push(request);
        Ok("exec-42".to_string())
    }

    async fn describe(&self, execution_id: &str) -> Result<ExecutionDetail> {
        Ok(ExecutionDetail::of_status(execution_id, ExecutionStatus::Success))
    }

    async fn stop(&self, _execution_id: &str) -> Result<()> {
        Ok(())
    }
}

fn settings() -> DispatchSettings {
    DispatchSettings {
        document_name: "Armada-FleetOperations".to_string(),
        assume_role: "arn:aws:iam::111122223333:role/Armada-Admin".to_string(),
        s3_bucket: "armada-reports".to_string(),
    }
}

fn tenant(account: &str, region: &str) -> TenantRecord {
    TenantRecord {
        account_id: account.to_string(),
        region: region.to_string(),
        execution_role_name: None,
    }
}

fn backup_request(account: &str, region: &str, cluster: &str) -> AutomationRequest {
    serde_json::from_value(json!({
        "Clusters": {
            "Backup": [{
                "AccountId": account,
                "Region": region,
                "ClusterName": cluster
            }]
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn successful_launch_carries_defaults_and_the_items() {
    let directory = MemoryDirectory {
        records: vec![tenant("111122223333", "us-east-1")],
    };
    let dispatcher = CapturingDispatcher::default();
    let request = backup_request("111122223333", "us-east-1", "payments");

    let outcome = launch(
        Pipeline::Backup,
        &request,
        &RunDefaults::default(),
        &settings(),
        &directory,
        &dispatcher,
    )
    .await
    .unwrap();

    assert_eq!(outcome.automation_execution_id, "exec-42");
    assert_eq!(outcome.request.max_concurrency, "10");
    assert_eq!(outcome.request.max_errors, "0");
    assert_eq!(outcome.request.target_locations.len(), 1);

    let started = dispatcher.started();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].target_parameter_name, "InstanceId");
    assert_eq!(started[0].parameters["ExecutionTimeout"], "18000");
    assert_eq!(started[0].parameters["S3Bucket"], "armada-reports");
    assert!(started[0].parameters["S3OutputLogsPrefix"].starts_with("logs/ssm/backup/"));

    // The carried items round-trip through the EKSClusters parameter.
    let items: serde_json::Value =
        serde_json::from_str(&started[0].parameters["EKSClusters"]).unwrap();
    assert_eq!(items[0]["ClusterName"], "payments");
    assert_eq!(items[0]["Action"], "BACKUP");
    assert!(items[0]["BackupOptions"]["BackupName"]
        .as_str()
        .unwrap()
        .ends_with("-us-east-1-payments"));
}

#[tokio::test]
async fn empty_backup_request_is_a_404() {
    let directory = MemoryDirectory {
        records: vec![tenant("111122223333", "us-east-1")],
    };
    let dispatcher = CapturingDispatcher::default();

    let err = launch(
        Pipeline::Backup,
        &AutomationRequest::default(),
        &RunDefaults::default(),
        &settings(),
        &directory,
        &dispatcher,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::NoClusters));
    let response = ApiResponse::from(&err);
    assert_eq!(response.status_code, 404);
    assert_eq!(
        response.response["Error"]["Message"],
        "No clusters provided"
    );
    assert!(dispatcher.started().is_empty());
}

#[tokio::test]
async fn unonboarded_tenant_is_a_404_with_an_onboarding_hint() {
    let directory = MemoryDirectory { records: vec![] };
    let dispatcher = CapturingDispatcher::default();
    let request = backup_request("999988887777", "us-east-1", "payments");

    let err = launch(
        Pipeline::Backup,
        &request,
        &RunDefaults::default(),
        &settings(),
        &directory,
        &dispatcher,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::TenantsNotOnboarded));
    let response = ApiResponse::from(&err);
    assert_eq!(response.status_code, 404);
    assert!(response.response["Error"]["Message"]
        .as_str()
        .unwrap()
        .contains("onboard"));
}

#[tokio::test]
async fn invalid_item_is_a_422() {
    let directory = MemoryDirectory {
        records: vec![tenant("111122223333", "us-east-1")],
    };
    let dispatcher = CapturingDispatcher::default();
    // Restore without a backup name fails validation for the whole batch.
    let request: AutomationRequest = serde_json::from_value(json!({
        "Clusters": {
            "Restore": [{
                "AccountId": "111122223333",
                "Region": "us-east-1",
                "ClusterName": "payments"
            }]
        }
    }))
    .unwrap();

    let err = launch(
        Pipeline::Backup,
        &request,
        &RunDefaults::default(),
        &settings(),
        &directory,
        &dispatcher,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(ApiResponse::from(&err).status_code, 422);
}

#[tokio::test]
async fn summary_tolerates_an_empty_request() {
    let directory = MemoryDirectory {
        records: vec![tenant("111122223333", "us-east-1"), tenant("444455556666", "eu-west-1")],
    };
    let dispatcher = CapturingDispatcher::default();

    let outcome = launch(
        Pipeline::Summary,
        &AutomationRequest::default(),
        &RunDefaults::default(),
        &settings(),
        &directory,
        &dispatcher,
    )
    .await
    .unwrap();

    // No input clusters: every onboarded tenant becomes a target.
    assert_eq!(outcome.request.target_locations.len(), 2);
    assert_eq!(dispatcher.started()[0].parameters["EKSClusters"], "[]");
}
