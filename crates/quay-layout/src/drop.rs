// Drag-and-drop planning: (snapshot, payload, destination) → a validated
// action or `Ineligible`. Outside management mode every drop is ineligible,
// so a stray drag can never mutate the layout.

use quay_core::{PaneId, TabId};

use crate::action::{InsertDirection, PaneAction, PaneSource};
use crate::model::ActionStateSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitDropPayload {
    /// A whole tab dragged off the tab bar.
    ExistingTab { tab_id: TabId },
    /// A single pane dragged out of its tab.
    ExistingPane {
        pane_id: PaneId,
        source_tab_id: TabId,
    },
    /// The new-terminal affordance dragged into the layout.
    NewTerminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneDropDestination {
    Split {
        target_tab_id: TabId,
        target_pane_id: PaneId,
        direction: InsertDirection,
        /// `Some` when the drop landed inside a drawer; the value is the
        /// drawer's owning layout pane.
        target_drawer_parent_pane_id: Option<PaneId>,
    },
    TabBarInsertion { target_tab_index: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropDecision {
    Resolved(PaneAction),
    Ineligible,
}

pub fn plan_drop(
    snapshot: &ActionStateSnapshot,
    payload: SplitDropPayload,
    destination: PaneDropDestination,
) -> DropDecision {
    if !snapshot.is_management_mode_active {
        return DropDecision::Ineligible;
    }
    match destination {
        PaneDropDestination::TabBarInsertion { target_tab_index } => {
            plan_tab_bar_drop(snapshot, payload, target_tab_index)
        }
        PaneDropDestination::Split {
            target_tab_id: _,
            target_pane_id,
            direction,
            target_drawer_parent_pane_id: Some(parent),
        } => plan_drawer_drop(snapshot, payload, parent, target_pane_id, direction),
        PaneDropDestination::Split {
            target_tab_id,
            target_pane_id,
            direction,
            target_drawer_parent_pane_id: None,
        } => plan_layout_drop(snapshot, payload, target_tab_id, target_pane_id, direction),
    }
}

fn plan_tab_bar_drop(
    snapshot: &ActionStateSnapshot,
    payload: SplitDropPayload,
    to_index: usize,
) -> DropDecision {
    match payload {
        SplitDropPayload::ExistingTab { tab_id } => {
            if snapshot.tab(tab_id).is_none() || to_index >= snapshot.tabs.len() {
                return DropDecision::Ineligible;
            }
            DropDecision::Resolved(PaneAction::MoveTab { tab_id, to_index })
        }
        SplitDropPayload::ExistingPane {
            pane_id,
            source_tab_id,
        } => {
            // Drawer panes never leave their parent, least of all to become
            // a tab.
            if snapshot.is_drawer_pane(pane_id) {
                return DropDecision::Ineligible;
            }
            let Some(source_tab) = snapshot.tab(source_tab_id) else {
                return DropDecision::Ineligible;
            };
            if !source_tab.contains_layout_pane(pane_id) {
                return DropDecision::Ineligible;
            }
            if source_tab.pane_count() == 1 {
                // The pane is the tab: just move the tab.
                if to_index >= snapshot.tabs.len() {
                    return DropDecision::Ineligible;
                }
                DropDecision::Resolved(PaneAction::MoveTab {
                    tab_id: source_tab_id,
                    to_index,
                })
            } else {
                if to_index > snapshot.tabs.len() {
                    return DropDecision::Ineligible;
                }
                DropDecision::Resolved(PaneAction::ExtractPaneToTabThenMove {
                    pane_id,
                    source_tab_id,
                    to_index,
                })
            }
        }
        SplitDropPayload::NewTerminal => DropDecision::Ineligible,
    }
}

fn plan_drawer_drop(
    snapshot: &ActionStateSnapshot,
    payload: SplitDropPayload,
    parent: PaneId,
    target_pane_id: PaneId,
    direction: InsertDirection,
) -> DropDecision {
    // Only rearrangement within one drawer is allowed. Layout panes, tabs,
    // and other drawers' panes stay out.
    let SplitDropPayload::ExistingPane { pane_id, .. } = payload else {
        return DropDecision::Ineligible;
    };
    let source_parent = snapshot.drawer_parent_by_pane_id.get(&pane_id);
    let target_parent = snapshot.drawer_parent_by_pane_id.get(&target_pane_id);
    if source_parent != Some(&parent) || target_parent != Some(&parent) {
        return DropDecision::Ineligible;
    }
    if pane_id == target_pane_id {
        return DropDecision::Ineligible;
    }
    DropDecision::Resolved(PaneAction::MoveDrawerPane {
        parent_pane_id: parent,
        drawer_pane_id: pane_id,
        target_drawer_pane_id: target_pane_id,
        direction,
    })
}

fn plan_layout_drop(
    snapshot: &ActionStateSnapshot,
    payload: SplitDropPayload,
    target_tab_id: TabId,
    target_pane_id: PaneId,
    direction: InsertDirection,
) -> DropDecision {
    let Some(target_tab) = snapshot.tab(target_tab_id) else {
        return DropDecision::Ineligible;
    };
    if !target_tab.contains_layout_pane(target_pane_id) {
        return DropDecision::Ineligible;
    }

    match payload {
        SplitDropPayload::NewTerminal => DropDecision::Resolved(PaneAction::InsertPane {
            source: PaneSource::NewTerminal,
            target_tab_id,
            target_pane_id,
            direction,
        }),
        SplitDropPayload::ExistingPane {
            pane_id,
            source_tab_id,
        } => {
            if snapshot.is_drawer_pane(pane_id) {
                return DropDecision::Ineligible;
            }
            let Some(source_tab) = snapshot.tab(source_tab_id) else {
                return DropDecision::Ineligible;
            };
            if !source_tab.contains_layout_pane(pane_id) {
                return DropDecision::Ineligible;
            }
            // Inserting a pane next to itself is a no-op dressed up as a
            // mutation.
            if pane_id == target_pane_id {
                return DropDecision::Ineligible;
            }
            DropDecision::Resolved(PaneAction::InsertPane {
                source: PaneSource::ExistingPane {
                    pane_id,
                    source_tab_id,
                },
                target_tab_id,
                target_pane_id,
                direction,
            })
        }
        SplitDropPayload::ExistingTab { tab_id } => {
            let Some(source_tab) = snapshot.tab(tab_id) else {
                return DropDecision::Ineligible;
            };
            // Self-merge: a tab dropped onto one of its own panes.
            if tab_id == target_tab_id {
                return DropDecision::Ineligible;
            }
            if source_tab.pane_count() > 1 {
                DropDecision::Resolved(PaneAction::MergeTab {
                    source_tab_id: tab_id,
                    target_tab_id,
                    target_pane_id,
                    direction,
                })
            } else {
                // A single-pane tab relocates as a pane, not a whole-tab
                // merge.
                DropDecision::Resolved(PaneAction::InsertPane {
                    source: PaneSource::ExistingPane {
                        pane_id: source_tab.tree.first_pane(),
                        source_tab_id: tab_id,
                    },
                    target_tab_id,
                    target_pane_id,
                    direction,
                })
            }
        }
    }
}
