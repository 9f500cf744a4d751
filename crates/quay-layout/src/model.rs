// Workspace layout model and the immutable snapshot the resolver sees.

use std::collections::{BTreeMap, BTreeSet};

use quay_core::{PaneId, TabId, WorktreeId};
use serde::{Deserialize, Serialize};

use crate::tree::SplitTree;

// ──────────────────────────────────────────────
// Mutable model (owned by the store)
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    pub tree: SplitTree,
    pub active_pane_id: PaneId,
    pub zoomed_pane_id: Option<PaneId>,
    pub minimized_pane_ids: BTreeSet<PaneId>,
}

impl Tab {
    pub fn with_single_pane(id: TabId, pane: PaneId) -> Self {
        Self {
            id,
            tree: SplitTree::leaf(pane),
            active_pane_id: pane,
            zoomed_pane_id: None,
            minimized_pane_ids: BTreeSet::new(),
        }
    }

    pub fn pane_count(&self) -> usize {
        self.tree.pane_count()
    }
}

/// A nested tree overlaying the bottom of its parent pane. Drawer panes are
/// never siblings of layout panes; they live only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawer {
    pub tree: SplitTree,
    pub active_pane_id: PaneId,
    pub is_open: bool,
    pub minimized_pane_ids: BTreeSet<PaneId>,
}

impl Drawer {
    pub fn with_single_pane(pane: PaneId) -> Self {
        Self {
            tree: SplitTree::leaf(pane),
            active_pane_id: pane,
            is_open: true,
            minimized_pane_ids: BTreeSet::new(),
        }
    }
}

// ──────────────────────────────────────────────
// Snapshot (input to the resolver / validator)
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TabSnapshot {
    pub id: TabId,
    pub tree: SplitTree,
    pub active_pane_id: PaneId,
    pub zoomed_pane_id: Option<PaneId>,
    pub minimized_pane_ids: BTreeSet<PaneId>,
    /// Drawer trees keyed by the owning layout pane.
    pub drawer_trees: BTreeMap<PaneId, SplitTree>,
}

impl TabSnapshot {
    pub fn with_tree(id: TabId, tree: SplitTree) -> Self {
        let active_pane_id = tree.first_pane();
        Self {
            id,
            tree,
            active_pane_id,
            zoomed_pane_id: None,
            minimized_pane_ids: BTreeSet::new(),
            drawer_trees: BTreeMap::new(),
        }
    }

    pub fn pane_count(&self) -> usize {
        self.tree.pane_count()
    }

    pub fn contains_layout_pane(&self, pane: PaneId) -> bool {
        self.tree.contains(pane)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActionStateSnapshot {
    pub tabs: Vec<TabSnapshot>,
    pub active_tab_id: Option<TabId>,
    pub is_management_mode_active: bool,
    pub known_worktree_ids: BTreeSet<WorktreeId>,
    /// For every drawer pane, the layout pane whose drawer it lives in.
    pub drawer_parent_by_pane_id: BTreeMap<PaneId, PaneId>,
}

impl ActionStateSnapshot {
    pub fn tab(&self, id: TabId) -> Option<&TabSnapshot> {
        self.tabs.iter().find(|tab| tab.id == id)
    }

    pub fn tab_index(&self, id: TabId) -> Option<usize> {
        self.tabs.iter().position(|tab| tab.id == id)
    }

    pub fn active_tab(&self) -> Option<&TabSnapshot> {
        self.tab(self.active_tab_id?)
    }

    /// The tab whose layout tree holds `pane`, if any.
    pub fn tab_of_layout_pane(&self, pane: PaneId) -> Option<&TabSnapshot> {
        self.tabs.iter().find(|tab| tab.contains_layout_pane(pane))
    }

    pub fn is_drawer_pane(&self, pane: PaneId) -> bool {
        self.drawer_parent_by_pane_id.contains_key(&pane)
    }

    /// True when `pane` exists anywhere: a tab's layout tree or a drawer.
    pub fn pane_exists(&self, pane: PaneId) -> bool {
        self.is_drawer_pane(pane) || self.tab_of_layout_pane(pane).is_some()
    }
}
