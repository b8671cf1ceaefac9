//! Automation launch.
//!
//! One function carries a raw request from validation to a started
//! execution. Every failure surfaces as a typed error the response envelope
//! knows how to map; nothing here exits the process.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{info, instrument, warn};

use armada_core::normalize::{normalize_request, Pipeline, RunDefaults};
use armada_directory::{resolve_targets, TenantDirectory};

use crate::dispatcher::{
    AutomationDispatcher, StartAutomation, DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_ERRORS,
    TARGET_PARAMETER_NAME,
};
use crate::request::{AutomationRequest, LaunchEcho, LaunchOutcome};
use crate::{Error, Result};

const EXECUTION_TIMEOUT_SECONDS: &str = "18000";

/// Deployment-level settings a launch needs beyond the request itself.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Automation document started for every pipeline run.
    pub document_name: String,
    /// Role the automation assumes in the management account.
    pub assume_role: String,
    /// Bucket receiving reports and execution logs.
    pub s3_bucket: String,
}

/// Normalize, resolve, and start one automation run.
#[instrument(skip_all, fields(pipeline = pipeline.name()))]
pub async fn launch(
    pipeline: Pipeline,
    request: &AutomationRequest,
    defaults: &RunDefaults,
    settings: &DispatchSettings,
    directory: &dyn TenantDirectory,
    dispatcher: &dyn AutomationDispatcher,
) -> Result<LaunchOutcome> {
    let today = Utc::now().date_naive();
    let items = normalize_request(pipeline, &request.clusters, defaults, today)
        .map_err(|e| Error::Validation(e.to_string()))?;

    if pipeline.input_required() && items.is_empty() {
        warn!("request carries no clusters for this pipeline");
        return Err(Error::NoClusters);
    }

    let targets = resolve_targets(&request.targets, &items, directory).await?;
    info!(items = items.len(), targets = targets.len(), "request resolved");

    let mut parameters = request.parameters.clone();
    let default = |parameters: &mut BTreeMap<String, String>, key: &str, value: String| {
        parameters.entry(key.to_string()).or_insert(value);
    };
    default(&mut parameters, "AssumeRole", settings.assume_role.clone());
    default(&mut parameters, "S3Bucket", settings.s3_bucket.clone());
    default(
        &mut parameters,
        "S3OutputLogsPrefix",
        format!("logs/ssm/{}/{}", pipeline.name(), today.format("%Y-%m-%d")),
    );
    default(
        &mut parameters,
        "ExecutionTimeout",
        EXECUTION_TIMEOUT_SECONDS.to_string(),
    );
    parameters.insert("EKSClusters".to_string(), serde_json::to_string(&items)?);

    let max_concurrency = request
        .max_concurrency
        .clone()
        .unwrap_or_else(|| DEFAULT_MAX_CONCURRENCY.to_string());
    let max_errors = request
        .max_errors
        .clone()
        .unwrap_or_else(|| DEFAULT_MAX_ERRORS.to_string());

    let start = StartAutomation {
        document_name: settings.document_name.clone(),
        target_parameter_name: TARGET_PARAMETER_NAME.to_string(),
        parameters: parameters.clone(),
        target_locations: targets.clone(),
        max_concurrency: max_concurrency.clone(),
        max_errors: max_errors.clone(),
    };
    let execution_id = dispatcher.start(start).await?;
    info!(execution_id, "automation started");

    Ok(LaunchOutcome {
        automation_execution_id: execution_id,
        request: LaunchEcho {
            target_locations: targets,
            parameters,
            max_concurrency,
            max_errors,
        },
    })
}
