// Subprocess execution seam. Components never spawn `git` or `gh` directly;
// they go through a ProcessExecutor so tests can script outputs and so
// timeouts are enforced in exactly one place.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Default timeout applied when a caller does not override it.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

// ──────────────────────────────────────────────
// Request / result types
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

impl ProcessSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("{command} timed out after {seconds} s")]
    TimedOut { command: String, seconds: u64 },
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
}

// ──────────────────────────────────────────────
// Trait + default implementation
// ──────────────────────────────────────────────

#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    async fn execute(&self, spec: ProcessSpec) -> Result<ProcessResult, ProcessError>;
}

/// Runs the process on the tokio runtime. The child is killed if the future
/// is dropped or the timeout elapses, so a hung `git` can never pin an actor.
#[derive(Debug, Default)]
pub struct TokioProcessExecutor;

#[async_trait]
impl ProcessExecutor for TokioProcessExecutor {
    async fn execute(&self, spec: ProcessSpec) -> Result<ProcessResult, ProcessError> {
        let mut command = tokio::process::Command::new(&spec.command);
        command.args(&spec.args);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }
        command.stdin(std::process::Stdio::null());
        command.kill_on_drop(true);

        let output = match tokio::time::timeout(spec.timeout, command.output()).await {
            Err(_) => {
                return Err(ProcessError::TimedOut {
                    command: spec.command,
                    seconds: spec.timeout.as_secs(),
                })
            }
            Ok(Err(source)) => {
                return Err(ProcessError::Spawn {
                    command: spec.command,
                    source,
                })
            }
            Ok(Ok(output)) => output,
        };

        Ok(ProcessResult {
            // Terminated-by-signal has no exit code; report it as a plain
            // failure rather than a separate variant.
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_execute_captures_stdout_and_exit_code() {
        let executor = TokioProcessExecutor;
        let result = executor
            .execute(ProcessSpec::new("echo").arg("hello"))
            .await
            .unwrap();
        assert!(result.succeeded());
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_execute_reports_nonzero_exit() {
        let executor = TokioProcessExecutor;
        let result = executor
            .execute(ProcessSpec::new("sh").args(["-c", "exit 3"]))
            .await
            .unwrap();
        assert!(!result.succeeded());
        assert_eq!(result.exit_code, 3);
    }

    #[tokio::test]
    async fn test_execute_times_out() {
        let executor = TokioProcessExecutor;
        let err = executor
            .execute(
                ProcessSpec::new("sleep")
                    .arg("5")
                    .timeout(Duration::from_millis(50)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn test_execute_missing_binary_is_spawn_error() {
        let executor = TokioProcessExecutor;
        let err = executor
            .execute(ProcessSpec::new("quay-no-such-binary"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }
}
