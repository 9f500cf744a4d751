// The layout model the store owns, plus the pure mutation layer. Actions
// arrive pre-validated; mutations are still defensive (a stale reference
// degrades to a no-op, never a panic) because validation and application
// read the model at different instants.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use quay_core::{PaneId, RepoId, TabId, WorktreeId};
use quay_layout::{
    ActionStateSnapshot, Drawer, InsertDirection, PaneAction, PaneSource, RepairAction,
    SplitDirection, SplitTree, Tab, TabSnapshot,
};
use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Model
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorktreeBinding {
    pub worktree_id: WorktreeId,
    pub repo_id: RepoId,
    pub root_path: PathBuf,
}

/// Per-pane metadata carried alongside the layout trees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaneRecord {
    pub worktree: Option<WorktreeBinding>,
}

/// A worktree the application knows about (discovered or configured),
/// whether or not any pane currently shows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownWorktree {
    pub repo_id: RepoId,
    pub root_path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub tabs: Vec<Tab>,
    pub active_tab_id: Option<TabId>,
    pub is_management_mode_active: bool,
    /// Drawer trees keyed by their owning layout pane.
    pub drawers: BTreeMap<PaneId, Drawer>,
    pub panes: BTreeMap<PaneId, PaneRecord>,
    pub known_worktrees: BTreeMap<WorktreeId, KnownWorktree>,
}

impl Workspace {
    pub fn tab(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.id == id)
    }

    fn tab_mut(&mut self, id: TabId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|tab| tab.id == id)
    }

    fn tab_index(&self, id: TabId) -> Option<usize> {
        self.tabs.iter().position(|tab| tab.id == id)
    }

    /// Worktrees referenced by at least one live pane.
    pub fn referenced_worktrees(&self) -> BTreeSet<WorktreeId> {
        self.panes
            .values()
            .filter_map(|record| record.worktree.as_ref())
            .map(|binding| binding.worktree_id)
            .collect()
    }

    pub fn worktree_of_pane(&self, pane: PaneId) -> Option<WorktreeId> {
        self.panes
            .get(&pane)?
            .worktree
            .as_ref()
            .map(|binding| binding.worktree_id)
    }

    /// Immutable view for the resolver and validator.
    pub fn snapshot(&self) -> ActionStateSnapshot {
        let tabs = self
            .tabs
            .iter()
            .map(|tab| {
                let drawer_trees = tab
                    .tree
                    .pane_ids()
                    .into_iter()
                    .filter_map(|pane| {
                        self.drawers
                            .get(&pane)
                            .map(|drawer| (pane, drawer.tree.clone()))
                    })
                    .collect();
                TabSnapshot {
                    id: tab.id,
                    tree: tab.tree.clone(),
                    active_pane_id: tab.active_pane_id,
                    zoomed_pane_id: tab.zoomed_pane_id,
                    minimized_pane_ids: tab.minimized_pane_ids.clone(),
                    drawer_trees,
                }
            })
            .collect();
        let drawer_parent_by_pane_id = self
            .drawers
            .iter()
            .flat_map(|(parent, drawer)| {
                let parent = *parent;
                drawer
                    .tree
                    .pane_ids()
                    .into_iter()
                    .map(move |pane| (pane, parent))
            })
            .collect();
        ActionStateSnapshot {
            tabs,
            active_tab_id: self.active_tab_id,
            is_management_mode_active: self.is_management_mode_active,
            known_worktree_ids: self.known_worktrees.keys().copied().collect(),
            drawer_parent_by_pane_id,
        }
    }
}

// ──────────────────────────────────────────────
// Effects
// ──────────────────────────────────────────────

/// Side effects a mutation asks the store to perform after the model write
/// is complete.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Effect {
    RegisterWorktree(WorktreeBinding),
    UnregisterWorktree(WorktreeId),
    /// The focused pane changed; `None` when it has no worktree.
    FocusWorktree(Option<WorktreeId>),
    /// A pane entered the undo buffer and needs an expiry timer.
    ScheduleUndoExpiry(PaneId),
}

// ──────────────────────────────────────────────
// Application
// ──────────────────────────────────────────────

pub(crate) fn apply_action(workspace: &mut Workspace, action: PaneAction) -> Vec<Effect> {
    let mut effects = Vec::new();
    match action {
        PaneAction::InsertPane {
            source,
            target_tab_id,
            target_pane_id,
            direction,
        } => insert_pane(
            workspace,
            source,
            target_tab_id,
            target_pane_id,
            direction,
            &mut effects,
        ),
        PaneAction::ClosePane { tab_id, pane_id } => {
            close_pane(workspace, tab_id, pane_id, &mut effects)
        }
        PaneAction::CloseTab { tab_id } => close_tab(workspace, tab_id, &mut effects),
        PaneAction::ExtractPaneToTab { tab_id, pane_id } => {
            extract_pane_to_tab(workspace, tab_id, pane_id, None);
        }
        PaneAction::ExtractPaneToTabThenMove {
            pane_id,
            source_tab_id,
            to_index,
        } => {
            extract_pane_to_tab(workspace, source_tab_id, pane_id, Some(to_index));
        }
        PaneAction::MergeTab {
            source_tab_id,
            target_tab_id,
            target_pane_id,
            direction,
        } => merge_tab(workspace, source_tab_id, target_tab_id, target_pane_id, direction),
        PaneAction::MoveTab { tab_id, to_index } => {
            if let Some(from) = workspace.tab_index(tab_id) {
                let tab = workspace.tabs.remove(from);
                let to_index = to_index.min(workspace.tabs.len());
                workspace.tabs.insert(to_index, tab);
            }
        }
        PaneAction::SelectTab { tab_id } => {
            if workspace.tab(tab_id).is_some() {
                workspace.active_tab_id = Some(tab_id);
            }
        }
        PaneAction::EqualizePanes { tab_id } => {
            if let Some(tab) = workspace.tab_mut(tab_id) {
                tab.tree.equalize();
            }
        }
        PaneAction::BreakUpTab { tab_id } => break_up_tab(workspace, tab_id),
        PaneAction::FocusPane { tab_id, pane_id } => {
            if let Some(tab) = workspace.tab_mut(tab_id) {
                if tab.tree.contains(pane_id) {
                    tab.active_pane_id = pane_id;
                    workspace.active_tab_id = Some(tab_id);
                    effects.push(Effect::FocusWorktree(workspace.worktree_of_pane(pane_id)));
                }
            }
        }
        PaneAction::ResizePane {
            tab_id,
            split_id,
            ratio,
        } => {
            if let Some(tab) = workspace.tab_mut(tab_id) {
                tab.tree.set_ratio(split_id, ratio);
            }
        }
        PaneAction::MinimizePane { tab_id, pane_id } => {
            if let Some(tab) = workspace.tab_mut(tab_id) {
                if tab.tree.contains(pane_id) {
                    tab.minimized_pane_ids.insert(pane_id);
                }
            }
        }
        PaneAction::ExpandPane { tab_id, pane_id } => {
            if let Some(tab) = workspace.tab_mut(tab_id) {
                tab.minimized_pane_ids.remove(&pane_id);
            }
        }
        PaneAction::AddDrawerPane { parent_pane_id } => {
            add_drawer_pane(workspace, parent_pane_id)
        }
        PaneAction::RemoveDrawerPane {
            parent_pane_id,
            drawer_pane_id,
        } => remove_drawer_pane(workspace, parent_pane_id, drawer_pane_id, &mut effects),
        PaneAction::MoveDrawerPane {
            parent_pane_id,
            drawer_pane_id,
            target_drawer_pane_id,
            direction,
        } => {
            if let Some(drawer) = workspace.drawers.get_mut(&parent_pane_id) {
                move_within_tree(
                    &mut drawer.tree,
                    drawer_pane_id,
                    target_drawer_pane_id,
                    direction,
                );
            }
        }
        PaneAction::InsertDrawerPane {
            parent_pane_id,
            target_drawer_pane_id,
            direction,
        } => {
            if let Some(drawer) = workspace.drawers.get_mut(&parent_pane_id) {
                let new_pane = PaneId::new();
                if drawer.tree.insert_pane_at(
                    target_drawer_pane_id,
                    new_pane,
                    SplitDirection::Horizontal,
                    direction == InsertDirection::Left,
                ) {
                    drawer.active_pane_id = new_pane;
                    workspace.panes.insert(new_pane, PaneRecord::default());
                }
            }
        }
        PaneAction::MinimizeDrawerPane {
            parent_pane_id,
            drawer_pane_id,
        } => {
            if let Some(drawer) = workspace.drawers.get_mut(&parent_pane_id) {
                if drawer.tree.contains(drawer_pane_id) {
                    drawer.minimized_pane_ids.insert(drawer_pane_id);
                }
            }
        }
        PaneAction::ExpandDrawerPane {
            parent_pane_id,
            drawer_pane_id,
        } => {
            if let Some(drawer) = workspace.drawers.get_mut(&parent_pane_id) {
                drawer.minimized_pane_ids.remove(&drawer_pane_id);
            }
        }
        PaneAction::ResizeDrawerPane {
            parent_pane_id,
            split_id,
            ratio,
        } => {
            if let Some(drawer) = workspace.drawers.get_mut(&parent_pane_id) {
                drawer.tree.set_ratio(split_id, ratio);
            }
        }
        PaneAction::EqualizeDrawerPanes { parent_pane_id } => {
            if let Some(drawer) = workspace.drawers.get_mut(&parent_pane_id) {
                drawer.tree.equalize();
            }
        }
        PaneAction::SetActiveDrawerPane {
            parent_pane_id,
            drawer_pane_id,
        } => {
            if let Some(drawer) = workspace.drawers.get_mut(&parent_pane_id) {
                if drawer.tree.contains(drawer_pane_id) {
                    drawer.active_pane_id = drawer_pane_id;
                }
            }
        }
        PaneAction::ToggleDrawer { pane_id } => {
            if let Some(drawer) = workspace.drawers.get_mut(&pane_id) {
                drawer.is_open = !drawer.is_open;
            }
        }
        PaneAction::Repair(repair) => match repair {
            RepairAction::ResetActivePane { tab_id, pane_id } => {
                if let Some(tab) = workspace.tab_mut(tab_id) {
                    if tab.tree.contains(pane_id) {
                        tab.active_pane_id = pane_id;
                    }
                }
            }
            RepairAction::ClearZoom { tab_id } => {
                if let Some(tab) = workspace.tab_mut(tab_id) {
                    tab.zoomed_pane_id = None;
                }
            }
        },
        PaneAction::ExpireUndoEntry { .. } => {
            // Bookkeeping lives in the store's undo buffer; the model itself
            // has nothing to forget.
        }
    }
    effects
}

// ──────────────────────────────────────────────
// Pane creation and insertion
// ──────────────────────────────────────────────

/// Materialize the pane a source describes: a brand-new pane (possibly
/// bound to a worktree) or an existing pane detached from its current tab.
pub(crate) fn materialize_source(
    workspace: &mut Workspace,
    source: PaneSource,
    effects: &mut Vec<Effect>,
) -> Option<PaneId> {
    match source {
        PaneSource::NewTerminal => {
            let pane = PaneId::new();
            workspace.panes.insert(pane, PaneRecord::default());
            Some(pane)
        }
        PaneSource::WorktreeSession { worktree_id } => {
            let known = workspace.known_worktrees.get(&worktree_id)?;
            let binding = WorktreeBinding {
                worktree_id,
                repo_id: known.repo_id,
                root_path: known.root_path.clone(),
            };
            let pane = PaneId::new();
            workspace.panes.insert(
                pane,
                PaneRecord {
                    worktree: Some(binding.clone()),
                },
            );
            effects.push(Effect::RegisterWorktree(binding));
            Some(pane)
        }
        PaneSource::ExistingPane {
            pane_id,
            source_tab_id,
        } => {
            detach_pane(workspace, source_tab_id, pane_id)?;
            Some(pane_id)
        }
    }
}

/// Remove `pane` from its tab's tree, dissolving the tab if it empties.
/// The pane's record and drawer stay intact; it is about to land elsewhere.
fn detach_pane(workspace: &mut Workspace, tab_id: TabId, pane: PaneId) -> Option<()> {
    let index = workspace.tab_index(tab_id)?;
    let tab = &mut workspace.tabs[index];
    match tab.tree.remove_pane(pane)? {
        Some(remaining) => {
            tab.tree = remaining;
            if tab.active_pane_id == pane {
                tab.active_pane_id = tab.tree.first_pane();
            }
            if tab.zoomed_pane_id == Some(pane) {
                tab.zoomed_pane_id = None;
            }
            tab.minimized_pane_ids.remove(&pane);
        }
        None => {
            let removed = workspace.tabs.remove(index);
            if workspace.active_tab_id == Some(removed.id) {
                workspace.active_tab_id = workspace.tabs.first().map(|tab| tab.id);
            }
        }
    }
    Some(())
}

fn insert_pane(
    workspace: &mut Workspace,
    source: PaneSource,
    target_tab_id: TabId,
    target_pane_id: PaneId,
    direction: InsertDirection,
    effects: &mut Vec<Effect>,
) {
    let Some(pane) = materialize_source(workspace, source, effects) else {
        return;
    };
    let Some(tab) = workspace.tab_mut(target_tab_id) else {
        return;
    };
    if tab.tree.insert_pane_at(
        target_pane_id,
        pane,
        SplitDirection::Horizontal,
        direction == InsertDirection::Left,
    ) {
        tab.active_pane_id = pane;
        workspace.active_tab_id = Some(target_tab_id);
        effects.push(Effect::FocusWorktree(workspace.worktree_of_pane(pane)));
    }
}

// ──────────────────────────────────────────────
// Closing
// ──────────────────────────────────────────────

/// Drop a pane's record (and its drawer subtree) from the workspace,
/// emitting unregister effects for worktrees nothing references anymore.
fn discard_pane(
    workspace: &mut Workspace,
    pane: PaneId,
    undo: bool,
    effects: &mut Vec<Effect>,
) {
    if let Some(drawer) = workspace.drawers.remove(&pane) {
        for drawer_pane in drawer.tree.pane_ids() {
            workspace.panes.remove(&drawer_pane);
        }
    }
    let record = workspace.panes.remove(&pane);
    if undo {
        effects.push(Effect::ScheduleUndoExpiry(pane));
    }
    if let Some(binding) = record.and_then(|record| record.worktree) {
        if !workspace
            .referenced_worktrees()
            .contains(&binding.worktree_id)
        {
            effects.push(Effect::UnregisterWorktree(binding.worktree_id));
        }
    }
}

fn close_pane(workspace: &mut Workspace, tab_id: TabId, pane: PaneId, effects: &mut Vec<Effect>) {
    if detach_pane(workspace, tab_id, pane).is_none() {
        return;
    }
    discard_pane(workspace, pane, true, effects);
}

fn close_tab(workspace: &mut Workspace, tab_id: TabId, effects: &mut Vec<Effect>) {
    let Some(index) = workspace.tab_index(tab_id) else {
        return;
    };
    let tab = workspace.tabs.remove(index);
    if workspace.active_tab_id == Some(tab_id) {
        workspace.active_tab_id = workspace.tabs.first().map(|tab| tab.id);
    }
    for pane in tab.tree.pane_ids() {
        discard_pane(workspace, pane, true, effects);
    }
}

// ──────────────────────────────────────────────
// Tab surgery
// ──────────────────────────────────────────────

fn extract_pane_to_tab(
    workspace: &mut Workspace,
    source_tab_id: TabId,
    pane: PaneId,
    to_index: Option<usize>,
) {
    // Extracting the only pane of a tab is just a tab move.
    if let Some(tab) = workspace.tab(source_tab_id) {
        if tab.pane_count() == 1 && tab.tree.contains(pane) {
            if let Some(to_index) = to_index {
                if let Some(from) = workspace.tab_index(source_tab_id) {
                    let tab = workspace.tabs.remove(from);
                    let to_index = to_index.min(workspace.tabs.len());
                    workspace.tabs.insert(to_index, tab);
                }
            }
            return;
        }
    }
    if detach_pane(workspace, source_tab_id, pane).is_none() {
        return;
    }
    let new_tab = Tab::with_single_pane(TabId::new(), pane);
    let new_tab_id = new_tab.id;
    let index = to_index
        .unwrap_or(workspace.tabs.len())
        .min(workspace.tabs.len());
    workspace.tabs.insert(index, new_tab);
    workspace.active_tab_id = Some(new_tab_id);
}

fn merge_tab(
    workspace: &mut Workspace,
    source_tab_id: TabId,
    target_tab_id: TabId,
    target_pane_id: PaneId,
    direction: InsertDirection,
) {
    if source_tab_id == target_tab_id {
        return;
    }
    let Some(source_index) = workspace.tab_index(source_tab_id) else {
        return;
    };
    if workspace.tab(target_tab_id).is_none() {
        return;
    }
    let source = workspace.tabs.remove(source_index);
    if workspace.active_tab_id == Some(source_tab_id) {
        workspace.active_tab_id = Some(target_tab_id);
    }

    let Some(target_index) = workspace.tab_index(target_tab_id) else {
        // Defensive: put the source back rather than lose panes.
        workspace.tabs.insert(source_index, source);
        return;
    };
    let target = &mut workspace.tabs[target_index];
    // Insert the source panes in traversal order. Inserting on the left
    // keeps the anchor fixed; on the right the anchor advances so order is
    // preserved.
    let mut anchor = target_pane_id;
    for pane in source.tree.pane_ids() {
        if target.tree.insert_pane_at(
            anchor,
            pane,
            SplitDirection::Horizontal,
            direction == InsertDirection::Left,
        ) && direction == InsertDirection::Right
        {
            anchor = pane;
        }
    }
}

fn break_up_tab(workspace: &mut Workspace, tab_id: TabId) {
    let Some(index) = workspace.tab_index(tab_id) else {
        return;
    };
    if workspace.tabs[index].pane_count() < 2 {
        return;
    }
    let tab = workspace.tabs.remove(index);
    let mut first_new_tab = None;
    for (offset, pane) in tab.tree.pane_ids().into_iter().enumerate() {
        let new_tab = Tab::with_single_pane(TabId::new(), pane);
        if offset == 0 {
            first_new_tab = Some(new_tab.id);
        }
        workspace.tabs.insert(index + offset, new_tab);
    }
    if workspace.active_tab_id == Some(tab_id) {
        workspace.active_tab_id = first_new_tab;
    }
}

// ──────────────────────────────────────────────
// Drawers
// ──────────────────────────────────────────────

fn add_drawer_pane(workspace: &mut Workspace, parent: PaneId) {
    let new_pane = PaneId::new();
    match workspace.drawers.get_mut(&parent) {
        Some(drawer) => {
            let anchor = drawer.active_pane_id;
            if drawer
                .tree
                .insert_pane_at(anchor, new_pane, SplitDirection::Horizontal, false)
            {
                drawer.active_pane_id = new_pane;
                drawer.is_open = true;
                workspace.panes.insert(new_pane, PaneRecord::default());
            }
        }
        None => {
            workspace
                .drawers
                .insert(parent, Drawer::with_single_pane(new_pane));
            workspace.panes.insert(new_pane, PaneRecord::default());
        }
    }
}

fn remove_drawer_pane(
    workspace: &mut Workspace,
    parent: PaneId,
    drawer_pane: PaneId,
    effects: &mut Vec<Effect>,
) {
    let Some(drawer) = workspace.drawers.get_mut(&parent) else {
        return;
    };
    match drawer.tree.remove_pane(drawer_pane) {
        Some(Some(remaining)) => {
            drawer.tree = remaining;
            if drawer.active_pane_id == drawer_pane {
                drawer.active_pane_id = drawer.tree.first_pane();
            }
            drawer.minimized_pane_ids.remove(&drawer_pane);
        }
        Some(None) => {
            workspace.drawers.remove(&parent);
        }
        None => return,
    }
    discard_pane(workspace, drawer_pane, false, effects);
}

fn move_within_tree(
    tree: &mut SplitTree,
    pane: PaneId,
    target: PaneId,
    direction: InsertDirection,
) {
    if pane == target || !tree.contains(target) {
        return;
    }
    let detached = match tree.remove_pane(pane) {
        Some(Some(remaining)) => {
            *tree = remaining;
            true
        }
        // A lone pane has nowhere else to go.
        Some(None) | None => false,
    };
    if detached {
        tree.insert_pane_at(
            target,
            pane,
            SplitDirection::Horizontal,
            direction == InsertDirection::Left,
        );
    }
}
