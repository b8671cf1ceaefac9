//! Subprocess execution for step scripts.
//!
//! Steps drive the actual cluster mutations through bash scripts staged on
//! the host. The runner's only contract is the exit code; anything
//! structured comes back through a side-effect file the step reads itself.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::{Error, Result};

/// Cap on captured output per stream.
const MAX_OUTPUT_SIZE: u64 = 1024 * 1024; // 1MB

/// Default wall-clock limit for one script invocation.
const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(3600);

static SAFE_ARGUMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9 ._:/=@,*\-]*$").expect("argument regex must compile"));

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run a script to completion and return its exit code.
    async fn run(&self, script: &Path, args: &[String]) -> Result<i32>;
}

/// [`ProcessRunner`] backed by real subprocesses.
pub struct ShellRunner {
    script_timeout: Duration,
}

impl ShellRunner {
    pub fn new() -> Self {
        ShellRunner {
            script_timeout: DEFAULT_SCRIPT_TIMEOUT,
        }
    }

    pub fn with_timeout(script_timeout: Duration) -> Self {
        ShellRunner { script_timeout }
    }

    fn validate_args(args: &[String]) -> Result<()> {
        for arg in args {
            if !SAFE_ARGUMENT.is_match(arg) {
                return Err(Error::Validation(format!(
                    "script argument contains unsupported characters: {arg:?}"
                )));
            }
        }
        Ok(())
    }

    /// Scripts arrive from the artifact download without the execute bit.
    #[cfg(unix)]
    fn make_executable(script: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let metadata = std::fs::metadata(script)?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(permissions.mode() | 0o700);
        std::fs::set_permissions(script, permissions)?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn make_executable(_script: &Path) -> Result<()> {
        Ok(())
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        ShellRunner::new()
    }
}

#[async_trait]
impl ProcessRunner for ShellRunner {
    #[instrument(skip(self, args), fields(script = %script.display()))]
    async fn run(&self, script: &Path, args: &[String]) -> Result<i32> {
        Self::validate_args(args)?;
        Self::make_executable(script)?;

        info!("running script");
        debug!(?args, "script arguments");

        let mut child = Command::new(script)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::ExternalCall(format!("failed to spawn {}: {e}", script.display())))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let capture = |stream: Option<tokio::process::ChildStdout>| async move {
            let mut buf = Vec::new();
            if let Some(stream) = stream {
                let _ = stream.take(MAX_OUTPUT_SIZE).read_to_end(&mut buf).await;
            }
            buf
        };
        let capture_err = |stream: Option<tokio::process::ChildStderr>| async move {
            let mut buf = Vec::new();
            if let Some(stream) = stream {
                let _ = stream.take(MAX_OUTPUT_SIZE).read_to_end(&mut buf).await;
            }
            buf
        };

        let outcome = timeout(self.script_timeout, async {
            let (status, out, err) =
                tokio::join!(child.wait(), capture(stdout), capture_err(stderr));
            (status, out, err)
        })
        .await;

        let (status, out, err) = match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!("script exceeded timeout, killing");
                let _ = child.kill().await;
                return Err(Error::ExternalCall(format!(
                    "{} timed out after {:?}",
                    script.display(),
                    self.script_timeout
                )));
            }
        };

        let status = status
            .map_err(|e| Error::ExternalCall(format!("failed to wait on {}: {e}", script.display())))?;
        let code = status.code().unwrap_or(-1);

        if !out.is_empty() {
            info!(stdout = %String::from_utf8_lossy(&out), "script output");
        }
        if code == 0 {
            info!(code, "script completed");
        } else {
            error!(code, stderr = %String::from_utf8_lossy(&err), "script failed");
        }
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn script_with(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("step.sh");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh\n{body}").unwrap();
        path
    }

    #[tokio::test]
    async fn exit_code_is_propagated() {
        let dir = tempfile::tempdir().unwrap();
        let script = script_with(&dir, "exit 3");
        let runner = ShellRunner::new();
        let code = runner.run(&script, &[]).await.unwrap();
        assert_eq!(code, 3);
    }

    #[tokio::test]
    async fn success_returns_zero() {
        let dir = tempfile::tempdir().unwrap();
        let script = script_with(&dir, "echo hello");
        let runner = ShellRunner::new();
        let code = runner.run(&script, &["-c".to_string(), "payments".to_string()]).await.unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn hung_script_is_killed_on_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let script = script_with(&dir, "sleep 30");
        let runner = ShellRunner::with_timeout(Duration::from_millis(200));
        let err = runner.run(&script, &[]).await.unwrap_err();
        assert!(matches!(err, Error::ExternalCall(_)));
    }

    #[tokio::test]
    async fn shell_metacharacters_in_args_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let script = script_with(&dir, "exit 0");
        let runner = ShellRunner::new();
        let err = runner
            .run(&script, &["$(rm -rf /)".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn missing_script_is_an_external_call_error() {
        let runner = ShellRunner::new();
        let err = runner
            .run(Path::new("/nonexistent/step.sh"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_) | Error::ExternalCall(_)));
    }
}
