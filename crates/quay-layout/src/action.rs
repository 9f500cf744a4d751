// The closed vocabulary of validated layout mutations, and the errors the
// validator can return.

use quay_core::{PaneId, SplitId, TabId, WorktreeId};
use thiserror::Error;

/// Where an inserted pane comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneSource {
    ExistingPane {
        pane_id: PaneId,
        source_tab_id: TabId,
    },
    NewTerminal,
    /// A fresh terminal session bound to a registered worktree; the store
    /// registers the worktree with the filesystem actor on apply.
    WorktreeSession { worktree_id: WorktreeId },
}

/// Side of the target pane an insert lands on. Commands and drops only
/// produce horizontal arrangements; the bottom of a pane belongs to its
/// drawer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertDirection {
    Left,
    Right,
}

/// Self-healing actions produced when a snapshot integrity check finds a
/// stale reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairAction {
    /// `active_pane_id` no longer names a leaf of the tab's tree.
    ResetActivePane { tab_id: TabId, pane_id: PaneId },
    /// `zoomed_pane_id` no longer names a leaf of the tab's tree.
    ClearZoom { tab_id: TabId },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaneAction {
    InsertPane {
        source: PaneSource,
        target_tab_id: TabId,
        target_pane_id: PaneId,
        direction: InsertDirection,
    },
    ClosePane {
        tab_id: TabId,
        pane_id: PaneId,
    },
    ExtractPaneToTab {
        tab_id: TabId,
        pane_id: PaneId,
    },
    MergeTab {
        source_tab_id: TabId,
        target_tab_id: TabId,
        target_pane_id: PaneId,
        direction: InsertDirection,
    },
    MoveTab {
        tab_id: TabId,
        to_index: usize,
    },
    /// Atomic compound for dragging a pane out of a multi-pane tab onto the
    /// tab bar: no observer may see the extracted tab at the wrong index.
    ExtractPaneToTabThenMove {
        pane_id: PaneId,
        source_tab_id: TabId,
        to_index: usize,
    },
    CloseTab {
        tab_id: TabId,
    },
    SelectTab {
        tab_id: TabId,
    },
    EqualizePanes {
        tab_id: TabId,
    },
    BreakUpTab {
        tab_id: TabId,
    },
    FocusPane {
        tab_id: TabId,
        pane_id: PaneId,
    },
    ResizePane {
        tab_id: TabId,
        split_id: SplitId,
        ratio: f64,
    },
    MinimizePane {
        tab_id: TabId,
        pane_id: PaneId,
    },
    ExpandPane {
        tab_id: TabId,
        pane_id: PaneId,
    },
    AddDrawerPane {
        parent_pane_id: PaneId,
    },
    RemoveDrawerPane {
        parent_pane_id: PaneId,
        drawer_pane_id: PaneId,
    },
    MoveDrawerPane {
        parent_pane_id: PaneId,
        drawer_pane_id: PaneId,
        target_drawer_pane_id: PaneId,
        direction: InsertDirection,
    },
    InsertDrawerPane {
        parent_pane_id: PaneId,
        target_drawer_pane_id: PaneId,
        direction: InsertDirection,
    },
    MinimizeDrawerPane {
        parent_pane_id: PaneId,
        drawer_pane_id: PaneId,
    },
    ExpandDrawerPane {
        parent_pane_id: PaneId,
        drawer_pane_id: PaneId,
    },
    ResizeDrawerPane {
        parent_pane_id: PaneId,
        split_id: SplitId,
        ratio: f64,
    },
    EqualizeDrawerPanes {
        parent_pane_id: PaneId,
    },
    SetActiveDrawerPane {
        parent_pane_id: PaneId,
        drawer_pane_id: PaneId,
    },
    ToggleDrawer {
        pane_id: PaneId,
    },
    Repair(RepairAction),
    ExpireUndoEntry {
        pane_id: PaneId,
    },
}

/// Closed validation vocabulary. `validate` is total: every action yields
/// `Ok` or one of these, never a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("referenced tab does not exist")]
    UnknownTab,
    #[error("referenced pane does not exist")]
    UnknownPane,
    #[error("split ratio outside [0.1, 0.9]")]
    RatioOutOfRange,
    #[error("a tab cannot be merged into itself")]
    SelfTabMerge,
    #[error("management mode is required for drag-originated actions")]
    ManagementModeRequired,
    #[error("drawer panes cannot leave their parent pane")]
    DrawerConstraintViolation,
    #[error("referenced worktree is not registered")]
    UnknownWorktree,
}
