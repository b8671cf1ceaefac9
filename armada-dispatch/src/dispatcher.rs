//! Automation dispatcher interface.
//!
//! The real implementation wraps the SSM automation API; tests inject an
//! in-memory fake. The dispatcher only starts, polls, and stops executions;
//! building the launch payload is [`crate::launch`]'s job.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use armada_directory::Target;

use crate::Result;

/// Parameter the fan-out targets are keyed by on the execution hosts.
pub const TARGET_PARAMETER_NAME: &str = "InstanceId";

/// Dispatch-level rollout bounds when the request does not set them.
pub const DEFAULT_MAX_CONCURRENCY: &str = "10";
pub const DEFAULT_MAX_ERRORS: &str = "0";

/// Fully-assembled launch payload for one automation execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartAutomation {
    pub document_name: String,
    pub target_parameter_name: String,
    pub parameters: BTreeMap<String, String>,
    pub target_locations: Vec<Target>,
    pub max_concurrency: String,
    pub max_errors: String,
}

/// Lifecycle states of one automation execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Pending,
    InProgress,
    Waiting,
    Success,
    Failed,
    Cancelled,
    TimedOut,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Success
                | ExecutionStatus::Failed
                | ExecutionStatus::Cancelled
                | ExecutionStatus::TimedOut
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }
}

/// One step of a running execution, as reported by the automation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepExecution {
    pub name: String,
    pub status: String,
    pub step_execution_id: String,
}

/// Rollout counters across the execution's target fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionProgress {
    pub total: u32,
    pub success: u32,
    pub failed: u32,
    pub cancelled: u32,
    pub timed_out: u32,
}

/// Full state of one execution: overall status plus the per-step and
/// per-target detail callers surface to operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionDetail {
    pub execution_id: String,
    pub document_name: Option<String>,
    pub status: ExecutionStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub progress: Option<ExecutionProgress>,
    pub steps: Vec<StepExecution>,
}

impl ExecutionDetail {
    /// Detail for an execution only its status is known about.
    pub fn of_status(execution_id: &str, status: ExecutionStatus) -> Self {
        ExecutionDetail {
            execution_id: execution_id.to_string(),
            document_name: None,
            status,
            start_time: None,
            end_time: None,
            progress: None,
            steps: Vec::new(),
        }
    }
}

#[async_trait]
pub trait AutomationDispatcher: Send + Sync {
    /// Start an execution and return its id.
    async fn start(&self, request: StartAutomation) -> Result<String>;

    /// Full execution state, including step and progress detail.
    async fn describe(&self, execution_id: &str) -> Result<ExecutionDetail>;

    async fn status(&self, execution_id: &str) -> Result<ExecutionStatus> {
        Ok(self.describe(execution_id).await?.status)
    }

    async fn stop(&self, execution_id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_finished_states_are_terminal() {
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::InProgress.is_terminal());
        assert!(!ExecutionStatus::Waiting.is_terminal());
        assert!(ExecutionStatus::Success.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
        assert!(ExecutionStatus::TimedOut.is_terminal());
    }

    #[tokio::test]
    async fn status_comes_from_the_execution_detail() {
        struct DetailOnly;

        #[async_trait]
        impl AutomationDispatcher for DetailOnly {
            async fn start(&self, _request: StartAutomation) -> Result<String> {
                Ok("exec-1".to_string())
            }

            async fn describe(&self, execution_id: &str) -> Result<ExecutionDetail> {
                let mut detail =
                    ExecutionDetail::of_status(execution_id, ExecutionStatus::InProgress);
                detail.steps.push(StepExecution {
                    name: "runBackup".to_string(),
                    status: "InProgress".to_string(),
                    step_execution_id: "step-1".to_string(),
                });
                detail.progress = Some(ExecutionProgress {
                    total: 4,
                    success: 1,
                    ..ExecutionProgress::default()
                });
                Ok(detail)
            }

            async fn stop(&self, _execution_id: &str) -> Result<()> {
                Ok(())
            }
        }

        let dispatcher = DetailOnly;
        assert_eq!(
            dispatcher.status("exec-1").await.unwrap(),
            ExecutionStatus::InProgress
        );
        let detail = dispatcher.describe("exec-1").await.unwrap();
        assert_eq!(detail.steps.len(), 1);
        assert_eq!(detail.progress.unwrap().total, 4);
    }
}
