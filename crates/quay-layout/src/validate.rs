// Invariant checks for actions before the store applies them. Total: every
// input yields Ok or a ValidationError, never a panic.

use quay_core::{PaneId, TabId};

use crate::action::{PaneAction, PaneSource, RepairAction, ValidationError};
use crate::model::{ActionStateSnapshot, TabSnapshot};
use crate::tree::{MAX_RATIO, MIN_RATIO};

type Checked = Result<(), ValidationError>;

pub fn validate(snapshot: &ActionStateSnapshot, action: &PaneAction) -> Checked {
    match action {
        PaneAction::InsertPane {
            source,
            target_tab_id,
            target_pane_id,
            ..
        } => {
            let target_tab = require_tab(snapshot, *target_tab_id)?;
            require_layout_pane(target_tab, *target_pane_id)?;
            check_source(snapshot, source)
        }
        PaneAction::ClosePane { tab_id, pane_id }
        | PaneAction::FocusPane { tab_id, pane_id }
        | PaneAction::MinimizePane { tab_id, pane_id }
        | PaneAction::ExpandPane { tab_id, pane_id } => {
            let tab = require_tab(snapshot, *tab_id)?;
            require_layout_pane(tab, *pane_id)
        }
        PaneAction::ExtractPaneToTab { tab_id, pane_id } => {
            let tab = require_tab(snapshot, *tab_id)?;
            require_layout_pane(tab, *pane_id)
        }
        PaneAction::MergeTab {
            source_tab_id,
            target_tab_id,
            target_pane_id,
            ..
        } => {
            require_management_mode(snapshot)?;
            if source_tab_id == target_tab_id {
                return Err(ValidationError::SelfTabMerge);
            }
            require_tab(snapshot, *source_tab_id)?;
            let target_tab = require_tab(snapshot, *target_tab_id)?;
            require_layout_pane(target_tab, *target_pane_id)
        }
        PaneAction::MoveTab { tab_id, to_index } => {
            require_management_mode(snapshot)?;
            require_tab(snapshot, *tab_id)?;
            if *to_index >= snapshot.tabs.len() {
                return Err(ValidationError::UnknownTab);
            }
            Ok(())
        }
        PaneAction::ExtractPaneToTabThenMove {
            pane_id,
            source_tab_id,
            to_index,
        } => {
            require_management_mode(snapshot)?;
            let source_tab = require_tab(snapshot, *source_tab_id)?;
            require_layout_pane(source_tab, *pane_id)?;
            // The extracted pane becomes a new tab, so one more index is
            // addressable than for a plain move.
            if *to_index > snapshot.tabs.len() {
                return Err(ValidationError::UnknownTab);
            }
            Ok(())
        }
        PaneAction::CloseTab { tab_id }
        | PaneAction::SelectTab { tab_id }
        | PaneAction::EqualizePanes { tab_id }
        | PaneAction::BreakUpTab { tab_id } => {
            require_tab(snapshot, *tab_id)?;
            Ok(())
        }
        PaneAction::ResizePane {
            tab_id,
            split_id,
            ratio,
        } => {
            let tab = require_tab(snapshot, *tab_id)?;
            check_ratio(*ratio)?;
            if !tab.tree.has_split(*split_id) {
                return Err(ValidationError::UnknownPane);
            }
            Ok(())
        }
        PaneAction::AddDrawerPane { parent_pane_id } | PaneAction::ToggleDrawer {
            pane_id: parent_pane_id,
        } => {
            if snapshot.is_drawer_pane(*parent_pane_id) {
                // Drawers do not nest.
                return Err(ValidationError::DrawerConstraintViolation);
            }
            if snapshot.tab_of_layout_pane(*parent_pane_id).is_none() {
                return Err(ValidationError::UnknownPane);
            }
            Ok(())
        }
        PaneAction::RemoveDrawerPane {
            parent_pane_id,
            drawer_pane_id,
        }
        | PaneAction::MinimizeDrawerPane {
            parent_pane_id,
            drawer_pane_id,
        }
        | PaneAction::ExpandDrawerPane {
            parent_pane_id,
            drawer_pane_id,
        }
        | PaneAction::SetActiveDrawerPane {
            parent_pane_id,
            drawer_pane_id,
        } => require_drawer_member(snapshot, *parent_pane_id, *drawer_pane_id),
        PaneAction::MoveDrawerPane {
            parent_pane_id,
            drawer_pane_id,
            target_drawer_pane_id,
            ..
        } => {
            require_management_mode(snapshot)?;
            require_drawer_member(snapshot, *parent_pane_id, *drawer_pane_id)?;
            require_drawer_member(snapshot, *parent_pane_id, *target_drawer_pane_id)
        }
        PaneAction::InsertDrawerPane {
            parent_pane_id,
            target_drawer_pane_id,
            ..
        } => require_drawer_member(snapshot, *parent_pane_id, *target_drawer_pane_id),
        PaneAction::EqualizeDrawerPanes { parent_pane_id } => {
            require_drawer(snapshot, *parent_pane_id)?;
            Ok(())
        }
        PaneAction::ResizeDrawerPane {
            parent_pane_id,
            split_id,
            ratio,
        } => {
            check_ratio(*ratio)?;
            let tree = require_drawer(snapshot, *parent_pane_id)?;
            if !tree.has_split(*split_id) {
                return Err(ValidationError::UnknownPane);
            }
            Ok(())
        }
        PaneAction::Repair(repair) => match repair {
            RepairAction::ResetActivePane { tab_id, pane_id } => {
                let tab = require_tab(snapshot, *tab_id)?;
                require_layout_pane(tab, *pane_id)
            }
            RepairAction::ClearZoom { tab_id } => {
                require_tab(snapshot, *tab_id)?;
                Ok(())
            }
        },
        // The pane is gone from the layout by definition; nothing to check.
        PaneAction::ExpireUndoEntry { .. } => Ok(()),
    }
}

fn require_tab(
    snapshot: &ActionStateSnapshot,
    tab_id: TabId,
) -> Result<&TabSnapshot, ValidationError> {
    snapshot.tab(tab_id).ok_or(ValidationError::UnknownTab)
}

fn require_layout_pane(tab: &TabSnapshot, pane_id: PaneId) -> Checked {
    if tab.contains_layout_pane(pane_id) {
        Ok(())
    } else {
        Err(ValidationError::UnknownPane)
    }
}

fn require_management_mode(snapshot: &ActionStateSnapshot) -> Checked {
    if snapshot.is_management_mode_active {
        Ok(())
    } else {
        Err(ValidationError::ManagementModeRequired)
    }
}

fn require_drawer<'a>(
    snapshot: &'a ActionStateSnapshot,
    parent_pane_id: PaneId,
) -> Result<&'a crate::tree::SplitTree, ValidationError> {
    let tab = snapshot
        .tab_of_layout_pane(parent_pane_id)
        .ok_or(ValidationError::UnknownPane)?;
    tab.drawer_trees
        .get(&parent_pane_id)
        .ok_or(ValidationError::DrawerConstraintViolation)
}

fn require_drawer_member(
    snapshot: &ActionStateSnapshot,
    parent_pane_id: PaneId,
    drawer_pane_id: PaneId,
) -> Checked {
    let tree = require_drawer(snapshot, parent_pane_id)?;
    if snapshot.drawer_parent_by_pane_id.get(&drawer_pane_id) != Some(&parent_pane_id)
        || !tree.contains(drawer_pane_id)
    {
        return Err(ValidationError::DrawerConstraintViolation);
    }
    Ok(())
}

fn check_ratio(ratio: f64) -> Checked {
    if (MIN_RATIO..=MAX_RATIO).contains(&ratio) {
        Ok(())
    } else {
        Err(ValidationError::RatioOutOfRange)
    }
}

fn check_source(snapshot: &ActionStateSnapshot, source: &PaneSource) -> Checked {
    match source {
        PaneSource::NewTerminal => Ok(()),
        PaneSource::ExistingPane {
            pane_id,
            source_tab_id,
        } => {
            if snapshot.is_drawer_pane(*pane_id) {
                return Err(ValidationError::DrawerConstraintViolation);
            }
            let source_tab = require_tab(snapshot, *source_tab_id)?;
            require_layout_pane(source_tab, *pane_id)
        }
        PaneSource::WorktreeSession { worktree_id } => {
            if snapshot.known_worktree_ids.contains(worktree_id) {
                Ok(())
            } else {
                Err(ValidationError::UnknownWorktree)
            }
        }
    }
}
