//! End-to-end front-door flows: onboarding, resolution, launch, polling.

use armada_core::normalize::Pipeline;
use armada_directory::{FileDirectory, TenantDirectory, DEFAULT_EXECUTION_ROLE};
use armada_dispatch::dispatcher::ExecutionStatus;
use armada_dispatch::request::ApiResponse;
use armada_dispatch::{launch, wait_for_completion, Error};
use armada_tests::fixtures::{self, ACCOUNT_A, ACCOUNT_B, REGION_A, REGION_B};
use armada_tests::{AutomationRequestBuilder, MockDispatcher};

#[tokio::test]
async fn request_spanning_two_onboarded_tenants_targets_both() {
    let dir = tempfile::tempdir().unwrap();
    let directory = FileDirectory::new(dir.path().join("tenants.json"));
    directory.put(fixtures::tenant(ACCOUNT_A, REGION_A)).await.unwrap();
    directory
        .put(fixtures::tenant_with_role(ACCOUNT_B, REGION_B, "OpsRole"))
        .await
        .unwrap();

    let request = AutomationRequestBuilder::new()
        .backup_cluster(ACCOUNT_A, REGION_A, "payments")
        .backup_cluster(ACCOUNT_B, REGION_B, "ledger")
        .build();
    let dispatcher = MockDispatcher::default();

    let outcome = launch(
        Pipeline::Backup,
        &request,
        &fixtures::defaults(),
        &fixtures::settings(),
        &directory,
        &dispatcher,
    )
    .await
    .unwrap();

    let targets = &outcome.request.target_locations;
    assert_eq!(targets.len(), 2);
    assert_eq!(targets[0].execution_role_name, DEFAULT_EXECUTION_ROLE);
    assert_eq!(targets[1].execution_role_name, "OpsRole");
    assert!(targets
        .iter()
        .all(|t| t.target_location_max_concurrency == "10" && t.target_location_max_errors == "1"));
}

#[tokio::test]
async fn partially_onboarded_request_narrows_to_the_known_subset() {
    let dir = tempfile::tempdir().unwrap();
    let directory = FileDirectory::new(dir.path().join("tenants.json"));
    directory.put(fixtures::tenant(ACCOUNT_A, REGION_A)).await.unwrap();

    let request = AutomationRequestBuilder::new()
        .backup_cluster(ACCOUNT_A, REGION_A, "payments")
        .backup_cluster(ACCOUNT_B, REGION_B, "ledger")
        .build();
    let dispatcher = MockDispatcher::default();

    let outcome = launch(
        Pipeline::Backup,
        &request,
        &fixtures::defaults(),
        &fixtures::settings(),
        &directory,
        &dispatcher,
    )
    .await
    .unwrap();

    let targets = &outcome.request.target_locations;
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].accounts, vec![ACCOUNT_A]);
    assert_eq!(targets[0].regions, vec![REGION_A]);

    // The un-onboarded cluster still rides along in the carried items; its
    // host-side filter drops it there.
    let items: serde_json::Value =
        serde_json::from_str(&dispatcher.started()[0].parameters["EKSClusters"]).unwrap();
    assert_eq!(items.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn nothing_onboarded_is_a_404_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let directory = FileDirectory::new(dir.path().join("tenants.json"));

    let request = AutomationRequestBuilder::new()
        .backup_cluster(ACCOUNT_A, REGION_A, "payments")
        .build();
    let dispatcher = MockDispatcher::default();

    let result = launch(
        Pipeline::Backup,
        &request,
        &fixtures::defaults(),
        &fixtures::settings(),
        &directory,
        &dispatcher,
    )
    .await;

    let response = ApiResponse::from(result);
    assert_eq!(response.status_code, 404);
    assert!(response.response["Error"]["Message"]
        .as_str()
        .unwrap()
        .contains("onboard"));
    assert!(dispatcher.started().is_empty());
}

#[tokio::test]
async fn launch_response_echoes_the_dispatched_request() {
    let dir = tempfile::tempdir().unwrap();
    let directory = FileDirectory::new(dir.path().join("tenants.json"));
    directory.put(fixtures::tenant(ACCOUNT_A, REGION_A)).await.unwrap();

    let request = AutomationRequestBuilder::new()
        .upgrade_cluster(ACCOUNT_A, REGION_A, "payments", "1.29")
        .max_concurrency("3")
        .build();
    let dispatcher = MockDispatcher::default();

    let result = launch(
        Pipeline::Upgrade,
        &request,
        &fixtures::defaults(),
        &fixtures::settings(),
        &directory,
        &dispatcher,
    )
    .await;

    let response = ApiResponse::from(result);
    assert_eq!(response.status_code, 200);
    assert_eq!(response.response["AutomationExecutionId"], "exec-1");
    assert_eq!(response.response["Request"]["MaxConcurrency"], "3");
    assert_eq!(response.response["Request"]["MaxErrors"], "0");
    assert_eq!(
        response.response["Request"]["Parameters"]["ExecutionTimeout"],
        "18000"
    );
}

#[tokio::test(start_paused = true)]
async fn launched_execution_is_polled_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let directory = FileDirectory::new(dir.path().join("tenants.json"));
    directory.put(fixtures::tenant(ACCOUNT_A, REGION_A)).await.unwrap();

    let request = AutomationRequestBuilder::new()
        .summary_cluster(ACCOUNT_A, REGION_A, "payments")
        .build();
    let dispatcher = MockDispatcher::with_statuses(vec![
        ExecutionStatus::Pending,
        ExecutionStatus::InProgress,
        ExecutionStatus::Success,
    ]);

    let outcome = launch(
        Pipeline::Summary,
        &request,
        &fixtures::defaults(),
        &fixtures::settings(),
        &directory,
        &dispatcher,
    )
    .await
    .unwrap();

    let status = wait_for_completion(&dispatcher, &outcome.automation_execution_id, 10)
        .await
        .unwrap();
    assert!(status.is_success());
    assert!(dispatcher.stopped().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stuck_execution_is_stopped_after_the_polling_budget() {
    let dispatcher = MockDispatcher::with_statuses(vec![ExecutionStatus::InProgress]);
    let err = wait_for_completion(&dispatcher, "exec-9", 4).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { attempts: 4, .. }));
    assert_eq!(dispatcher.stopped(), vec!["exec-9"]);
}
