// Default status provider: shell out to `git` through the process executor.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use quay_core::{
    GitWorkingTreeStatusProvider, ProcessExecutor, ProcessSpec, WorkingTreeStatus,
};

use crate::status::parse_porcelain;

const STATUS_TIMEOUT: Duration = Duration::from_secs(2);

pub struct ShellGitStatusProvider {
    executor: Arc<dyn ProcessExecutor>,
    timeout: Duration,
}

impl ShellGitStatusProvider {
    pub fn new(executor: Arc<dyn ProcessExecutor>) -> Self {
        Self {
            executor,
            timeout: STATUS_TIMEOUT,
        }
    }

    pub fn with_timeout(executor: Arc<dyn ProcessExecutor>, timeout: Duration) -> Self {
        Self { executor, timeout }
    }
}

#[async_trait]
impl GitWorkingTreeStatusProvider for ShellGitStatusProvider {
    async fn status(&self, root_path: &Path) -> Option<WorkingTreeStatus> {
        let root = root_path.to_string_lossy().into_owned();
        let spec = ProcessSpec::new("git")
            .args(["-C", &root])
            .args([
                "status",
                "--porcelain=v1",
                "--branch",
                "--untracked-files=normal",
            ])
            .timeout(self.timeout);
        let output = match self.executor.execute(spec).await {
            Ok(output) => output,
            Err(err) => {
                warn!("git status failed for {root}: {err}");
                return None;
            }
        };
        if !output.succeeded() {
            debug!(
                "git status exited {} for {root}: {}",
                output.exit_code,
                output.stderr.trim()
            );
            return None;
        }
        let (summary, branch) = parse_porcelain(&output.stdout);

        // Best effort; a worktree with no origin remote is perfectly normal.
        let origin_spec = ProcessSpec::new("git")
            .args(["-C", &root])
            .args(["config", "--get", "remote.origin.url"])
            .timeout(self.timeout);
        let origin = match self.executor.execute(origin_spec).await {
            Ok(output) if output.succeeded() => {
                let url = output.stdout.trim();
                if url.is_empty() {
                    None
                } else {
                    Some(url.to_string())
                }
            }
            _ => None,
        };

        Some(WorkingTreeStatus {
            summary,
            branch,
            origin,
        })
    }
}
