//! Request and response envelopes.
//!
//! The wire shapes are shared with the existing callers and the execution
//! hosts; field names and the `StatusCode`/`Response` nesting are load
//! bearing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use armada_core::normalize::ClusterBuckets;
use armada_directory::{RequestTarget, Target};

use crate::Error;

/// One raw automation request as submitted by a caller. Every field is
/// optional; absent buckets and targets are empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AutomationRequest {
    pub clusters: ClusterBuckets,
    pub targets: Vec<RequestTarget>,
    /// Document parameter overrides; unset parameters are defaulted at
    /// launch.
    pub parameters: BTreeMap<String, String>,
    pub max_concurrency: Option<String>,
    pub max_errors: Option<String>,
}

/// What a successful launch handed to the dispatcher, echoed back to the
/// caller next to the execution id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LaunchEcho {
    pub target_locations: Vec<Target>,
    pub parameters: BTreeMap<String, String>,
    pub max_concurrency: String,
    pub max_errors: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LaunchOutcome {
    pub automation_execution_id: String,
    pub request: LaunchEcho,
}

/// HTTP-style response envelope: `{"StatusCode": ..., "Response": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub response: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        ApiResponse {
            status_code: 200,
            response: body,
        }
    }

    pub fn error(status_code: u16, message: &str) -> Self {
        ApiResponse {
            status_code,
            response: json!({ "Error": { "Message": message } }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

impl From<crate::Result<LaunchOutcome>> for ApiResponse {
    fn from(result: crate::Result<LaunchOutcome>) -> Self {
        match result {
            Ok(outcome) => ApiResponse::ok(json!({
                "AutomationExecutionId": outcome.automation_execution_id,
                "Request": outcome.request,
            })),
            Err(e) => ApiResponse::error(e.status_code(), &e.to_string()),
        }
    }
}

impl From<&Error> for ApiResponse {
    fn from(e: &Error) -> Self {
        ApiResponse::error(e.status_code(), &e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_nests_the_message() {
        let response = ApiResponse::error(404, "No clusters provided");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["StatusCode"], 404);
        assert_eq!(json["Response"]["Error"]["Message"], "No clusters provided");
    }

    #[test]
    fn empty_request_parses() {
        let request: AutomationRequest = serde_json::from_str("{}").unwrap();
        assert!(request.targets.is_empty());
        assert!(request.clusters.backup.is_empty());
        assert!(request.max_concurrency.is_none());
    }

    #[test]
    fn request_parses_pascal_case_fields() {
        let request: AutomationRequest = serde_json::from_value(serde_json::json!({
            "Clusters": {
                "Backup": [{"AccountId": "111122223333", "Region": "us-east-1", "ClusterName": "payments"}]
            },
            "MaxConcurrency": "5"
        }))
        .unwrap();
        assert_eq!(request.clusters.backup.len(), 1);
        assert_eq!(request.max_concurrency.as_deref(), Some("5"));
    }
}
