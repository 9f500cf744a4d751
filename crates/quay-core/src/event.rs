// Event taxonomy and the envelope every bus message travels in.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Instant, SystemTime};

use uuid::Uuid;

use crate::{RepoId, WorktreeId};

// ──────────────────────────────────────────────
// Timestamps
// ──────────────────────────────────────────────

/// A monotonic instant for ordering, plus a wall clock captured at the same
/// moment for display. Only `instant` participates in any comparison logic.
#[derive(Debug, Clone, Copy)]
pub struct EventTimestamp {
    pub instant: Instant,
    pub wall: Option<SystemTime>,
}

impl EventTimestamp {
    pub fn now() -> Self {
        Self {
            instant: Instant::now(),
            wall: Some(SystemTime::now()),
        }
    }
}

// ──────────────────────────────────────────────
// Envelope
// ──────────────────────────────────────────────

/// Wrapper stamped onto every event before it is posted.
///
/// `seq` is monotonic per producing component only. Consumers that need a
/// causal view must key off `(source, seq)` or domain identifiers, never
/// assume a global order.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub source: &'static str,
    pub source_facets: Vec<String>,
    pub seq: u64,
    pub correlation_id: Option<Uuid>,
    pub timestamp: EventTimestamp,
    pub event: WorkspaceEvent,
}

// ──────────────────────────────────────────────
// Events
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum WorkspaceEvent {
    Filesystem(FsEvent),
    GitWorkingDirectory(GitEvent),
    Forge(ForgeEvent),
}

#[derive(Debug, Clone)]
pub enum FsEvent {
    WorktreeRegistered {
        worktree_id: WorktreeId,
        repo_id: RepoId,
        root_path: PathBuf,
    },
    WorktreeUnregistered {
        worktree_id: WorktreeId,
        repo_id: RepoId,
    },
    FilesChanged(Changeset),
}

/// One debounced flush of filesystem activity for a single worktree.
///
/// `paths` are worktree-relative, sorted, and deduplicated. A changeset with
/// an empty `paths` vector is still meaningful: it carries suppression
/// counters for activity that was entirely git-internal or ignored.
#[derive(Debug, Clone)]
pub struct Changeset {
    pub worktree_id: WorktreeId,
    pub repo_id: RepoId,
    pub root_path: PathBuf,
    pub paths: Vec<String>,
    pub contains_git_internal: bool,
    pub suppressed_ignored_count: u64,
    pub suppressed_git_internal_count: u64,
    pub timestamp: EventTimestamp,
    /// Strictly monotonic per worktree, incremented once per emitted envelope.
    pub batch_seq: u64,
}

#[derive(Debug, Clone)]
pub enum GitEvent {
    SnapshotChanged(WorkingTreeSnapshot),
    BranchChanged {
        worktree_id: WorktreeId,
        repo_id: RepoId,
        from: String,
        to: String,
    },
}

/// Derived git working-tree state for one worktree at one point in time.
#[derive(Debug, Clone)]
pub struct WorkingTreeSnapshot {
    pub worktree_id: WorktreeId,
    pub repo_id: RepoId,
    pub summary: StatusSummary,
    pub branch: Option<String>,
    pub origin: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub changed: u32,
    pub staged: u32,
    pub untracked: u32,
}

#[derive(Debug, Clone)]
pub enum ForgeEvent {
    PullRequestCountsChanged {
        repo_id: RepoId,
        counts_by_branch: HashMap<String, u32>,
    },
    RefreshFailed {
        repo_id: RepoId,
        error_text: String,
    },
}

// ──────────────────────────────────────────────
// Source names
// ──────────────────────────────────────────────

pub mod source {
    pub const FILESYSTEM: &str = "filesystem-watcher";
    pub const GIT_WORKING_DIRECTORY: &str = "git-working-directory";
    pub const FORGE: &str = "forge";
    pub const WORKSPACE_STORE: &str = "workspace-store";
}
