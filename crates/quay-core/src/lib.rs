// Core types and traits shared by every Quay crate: identifiers, the event
// taxonomy carried on the bus, and the provider seams behind which the OS
// watcher and the git/gh CLIs live.

pub mod event;
pub mod process;
pub mod provider;

pub use event::{
    Changeset, Envelope, EventTimestamp, ForgeEvent, FsEvent, GitEvent, StatusSummary,
    WorkingTreeSnapshot, WorkspaceEvent,
};
pub use process::{ProcessError, ProcessResult, ProcessSpec, ProcessExecutor, TokioProcessExecutor};
pub use provider::{
    ForgeError, ForgeStatusProvider, FsEventBatch, FsEventStreamClient,
    GitWorkingTreeStatusProvider, NoopForgeProvider, NoopFsEventStreamClient, WorkingTreeStatus,
};

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ──────────────────────────────────────────────
// Identity
// ──────────────────────────────────────────────

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

define_id!(
    /// Identifies one registered worktree (a checkout of a repo at a path).
    WorktreeId
);
define_id!(
    /// Identifies the repository a worktree belongs to. Several worktrees
    /// may share a `RepoId`.
    RepoId
);
define_id!(PaneId);
define_id!(TabId);
define_id!(SplitId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_roundtrip() {
        let id = WorktreeId::new();
        let parsed = WorktreeId::from_uuid(id.to_string().parse().unwrap());
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_id_ordering_matches_string_ordering() {
        // Tie-breaks in the ownership router rely on `Ord` agreeing with the
        // hyphenated string form.
        let mut ids: Vec<WorktreeId> = (0..32).map(|_| WorktreeId::new()).collect();
        ids.sort();
        let strings: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        let mut sorted = strings.clone();
        sorted.sort();
        assert_eq!(strings, sorted);
    }
}
