//! Execution status polling.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, instrument, warn};

use crate::dispatcher::{AutomationDispatcher, ExecutionStatus};
use crate::{Error, Result};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Poll an execution until it finishes, backing off linearly: attempt `n`
/// waits `n` seconds first. On exhaustion the execution is stopped and the
/// wait reports a timeout.
#[instrument(skip(dispatcher))]
pub async fn wait_for_completion(
    dispatcher: &dyn AutomationDispatcher,
    execution_id: &str,
    max_attempts: u32,
) -> Result<ExecutionStatus> {
    for attempt in 1..=max_attempts {
        sleep(Duration::from_secs(attempt as u64)).await;

        let status = dispatcher.status(execution_id).await?;
        info!(attempt, ?status, "polled execution");

        if status.is_success() {
            return Ok(status);
        }
        if status.is_terminal() {
            return Err(Error::ExecutionFailed {
                id: execution_id.to_string(),
                status,
            });
        }
    }

    warn!(max_attempts, "execution still running, stopping it");
    dispatcher.stop(execution_id).await?;
    Err(Error::Timeout {
        id: execution_id.to_string(),
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::dispatcher::{ExecutionDetail, StartAutomation};

    /// Serves a scripted sequence of statuses and records stop calls.
    struct ScriptedDispatcher {
        statuses: Mutex<Vec<ExecutionStatus>>,
        stopped: Mutex<bool>,
    }

    impl ScriptedDispatcher {
        fn new(statuses: Vec<ExecutionStatus>) -> Self {
            ScriptedDispatcher {
                statuses: Mutex::new(statuses),
                stopped: Mutex::new(false),
            }
        }

        fn was_stopped(&self) -> bool {
            *self.stopped.lock().unwrap()
        }
    }

    #[async_trait]
    impl AutomationDispatcher for ScriptedDispatcher {
        async fn start(&self, _request: StartAutomation) -> Result<String> {
            Ok("exec-1".to_string())
        }

        async fn describe(&self, execution_id: &str) -> Result<ExecutionDetail> {
            let mut statuses = self.statuses.lock().unwrap();
            let status = if statuses.len() > 1 {
                statuses.remove(0)
            } else {
                statuses[0]
            };
            Ok(ExecutionDetail::of_status(execution_id, status))
        }

        async fn stop(&self, _execution_id: &str) -> Result<()> {
            *self.stopped.lock().unwrap() = true;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn waits_through_progress_to_success() {
        let dispatcher = ScriptedDispatcher::new(vec![
            ExecutionStatus::Pending,
            ExecutionStatus::InProgress,
            ExecutionStatus::Success,
        ]);
        let status = wait_for_completion(&dispatcher, "exec-1", DEFAULT_MAX_ATTEMPTS)
            .await
            .unwrap();
        assert!(status.is_success());
        assert!(!dispatcher.was_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_execution_surfaces_its_status() {
        let dispatcher =
            ScriptedDispatcher::new(vec![ExecutionStatus::InProgress, ExecutionStatus::Failed]);
        let err = wait_for_completion(&dispatcher, "exec-1", DEFAULT_MAX_ATTEMPTS)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ExecutionFailed {
                status: ExecutionStatus::Failed,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_stop_the_execution() {
        let dispatcher = ScriptedDispatcher::new(vec![ExecutionStatus::InProgress]);
        let err = wait_for_completion(&dispatcher, "exec-1", 3).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { attempts: 3, .. }));
        assert!(dispatcher.was_stopped());
    }
}
