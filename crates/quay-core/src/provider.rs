// Provider seams for the OS watcher and the git/forge CLIs. Real
// implementations live in quay-fs, quay-git, and quay-forge; the noop
// variants here are enough to bring a workspace up in tests.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use thiserror::Error;

use crate::event::StatusSummary;
use crate::{RepoId, WorktreeId};

// ──────────────────────────────────────────────
// Filesystem watcher
// ──────────────────────────────────────────────

/// One burst of raw paths reported by the OS watcher, attributed to the
/// registration it was delivered against. Paths may be absolute or relative
/// and may belong to a different (nested) registered root; the filesystem
/// actor re-routes them.
#[derive(Debug, Clone)]
pub struct FsEventBatch {
    pub worktree_id: WorktreeId,
    pub paths: Vec<String>,
}

pub trait FsEventStreamClient: Send + Sync {
    /// Stream of raw event batches. The stream stays open until `shutdown`.
    fn subscribe(&self) -> BoxStream<'static, FsEventBatch>;
    fn register(&self, worktree_id: WorktreeId, repo_id: RepoId, root_path: &Path);
    fn unregister(&self, worktree_id: WorktreeId);
    fn shutdown(&self);
}

/// Watches nothing. Registration calls are accepted and forgotten.
#[derive(Debug, Default)]
pub struct NoopFsEventStreamClient;

impl FsEventStreamClient for NoopFsEventStreamClient {
    fn subscribe(&self) -> BoxStream<'static, FsEventBatch> {
        Box::pin(stream::pending())
    }

    fn register(&self, _worktree_id: WorktreeId, _repo_id: RepoId, _root_path: &Path) {}

    fn unregister(&self, _worktree_id: WorktreeId) {}

    fn shutdown(&self) {}
}

// ──────────────────────────────────────────────
// Git working-tree status
// ──────────────────────────────────────────────

/// What one `git status` observation yields.
#[derive(Debug, Clone, Default)]
pub struct WorkingTreeStatus {
    pub summary: StatusSummary,
    pub branch: Option<String>,
    pub origin: Option<String>,
}

#[async_trait]
pub trait GitWorkingTreeStatusProvider: Send + Sync {
    /// `None` means the observation failed (timeout, non-zero exit, parse
    /// failure); the projector logs and emits nothing for that change.
    async fn status(&self, root_path: &Path) -> Option<WorkingTreeStatus>;
}

// ──────────────────────────────────────────────
// Forge
// ──────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("forge command failed: {0}")]
    Command(String),
    #[error("could not parse forge output: {0}")]
    Parse(String),
    #[error("origin {0:?} is not recognized by this provider")]
    UnsupportedOrigin(String),
}

#[async_trait]
pub trait ForgeStatusProvider: Send + Sync {
    /// Short provider name recorded in envelope source facets, e.g.
    /// `"github-cli"` or `"noop"`.
    fn name(&self) -> &'static str;

    /// Open pull-request counts keyed by head branch. Tracked branches with
    /// no open PR must be reported as zero.
    async fn pull_request_counts(
        &self,
        origin: &str,
        branches: &BTreeSet<String>,
    ) -> Result<HashMap<String, u32>, ForgeError>;
}

/// Reports zero open pull requests for every tracked branch.
#[derive(Debug, Default)]
pub struct NoopForgeProvider;

#[async_trait]
impl ForgeStatusProvider for NoopForgeProvider {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn pull_request_counts(
        &self,
        _origin: &str,
        branches: &BTreeSet<String>,
    ) -> Result<HashMap<String, u32>, ForgeError> {
        Ok(branches.iter().map(|branch| (branch.clone(), 0)).collect())
    }
}
