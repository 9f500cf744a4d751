// Keyboard command resolution: (snapshot, command) → Option<PaneAction>.
// Pure and deterministic; anything the snapshot cannot support resolves to
// `None` rather than an error.

use quay_core::PaneId;

use crate::action::{InsertDirection, PaneAction, PaneSource, RepairAction};
use crate::model::{ActionStateSnapshot, TabSnapshot};
use crate::tree::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusDirection {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    CloseTab,
    ClosePane,
    SplitRight,
    /// Vertical splits are not produced by commands; the bottom of a pane
    /// belongs to its drawer.
    SplitBelow,
    FocusPaneLeft,
    FocusPaneRight,
    FocusPaneUp,
    FocusPaneDown,
    NextTab,
    PrevTab,
    /// 1-based tab selection; 0 and out-of-range resolve to nothing.
    SelectTab(u8),
    EqualizePanes,
    BreakUpTab,
    ExtractPaneToTab,
    MinimizePane,
    ExpandPane,
    AddDrawerPane,
    ToggleDrawer,
}

pub fn resolve(snapshot: &ActionStateSnapshot, command: AppCommand) -> Option<PaneAction> {
    let tab = snapshot.active_tab();
    match command {
        AppCommand::CloseTab => {
            let tab = tab?;
            Some(PaneAction::CloseTab { tab_id: tab.id })
        }
        AppCommand::ClosePane => {
            let tab = tab?;
            // Closing the last pane of a tab closes the tab.
            if tab.pane_count() == 1 {
                Some(PaneAction::CloseTab { tab_id: tab.id })
            } else {
                Some(PaneAction::ClosePane {
                    tab_id: tab.id,
                    pane_id: tab.active_pane_id,
                })
            }
        }
        AppCommand::SplitRight => {
            let tab = tab?;
            Some(PaneAction::InsertPane {
                source: PaneSource::NewTerminal,
                target_tab_id: tab.id,
                target_pane_id: tab.active_pane_id,
                direction: InsertDirection::Right,
            })
        }
        AppCommand::SplitBelow => None,
        AppCommand::FocusPaneLeft => focus_neighbor(tab?, FocusDirection::Left),
        AppCommand::FocusPaneRight => focus_neighbor(tab?, FocusDirection::Right),
        AppCommand::FocusPaneUp => focus_neighbor(tab?, FocusDirection::Up),
        AppCommand::FocusPaneDown => focus_neighbor(tab?, FocusDirection::Down),
        AppCommand::NextTab => cycle_tab(snapshot, 1),
        AppCommand::PrevTab => cycle_tab(snapshot, -1),
        AppCommand::SelectTab(n) => {
            let index = (n as usize).checked_sub(1)?;
            let tab = snapshot.tabs.get(index)?;
            Some(PaneAction::SelectTab { tab_id: tab.id })
        }
        AppCommand::EqualizePanes => {
            let tab = tab?;
            Some(PaneAction::EqualizePanes { tab_id: tab.id })
        }
        AppCommand::BreakUpTab => {
            let tab = tab?;
            if tab.pane_count() < 2 {
                return None;
            }
            Some(PaneAction::BreakUpTab { tab_id: tab.id })
        }
        AppCommand::ExtractPaneToTab => {
            let tab = tab?;
            if tab.pane_count() < 2 {
                return None;
            }
            Some(PaneAction::ExtractPaneToTab {
                tab_id: tab.id,
                pane_id: tab.active_pane_id,
            })
        }
        AppCommand::MinimizePane => {
            let tab = tab?;
            if tab.minimized_pane_ids.contains(&tab.active_pane_id) {
                return None;
            }
            Some(PaneAction::MinimizePane {
                tab_id: tab.id,
                pane_id: tab.active_pane_id,
            })
        }
        AppCommand::ExpandPane => {
            let tab = tab?;
            if !tab.minimized_pane_ids.contains(&tab.active_pane_id) {
                return None;
            }
            Some(PaneAction::ExpandPane {
                tab_id: tab.id,
                pane_id: tab.active_pane_id,
            })
        }
        AppCommand::AddDrawerPane => {
            let tab = tab?;
            Some(PaneAction::AddDrawerPane {
                parent_pane_id: tab.active_pane_id,
            })
        }
        AppCommand::ToggleDrawer => {
            let tab = tab?;
            Some(PaneAction::ToggleDrawer {
                pane_id: tab.active_pane_id,
            })
        }
    }
}

fn cycle_tab(snapshot: &ActionStateSnapshot, step: isize) -> Option<PaneAction> {
    let current = snapshot.tab_index(snapshot.active_tab_id?)?;
    let count = snapshot.tabs.len() as isize;
    let next = (current as isize + step).rem_euclid(count) as usize;
    Some(PaneAction::SelectTab {
        tab_id: snapshot.tabs[next].id,
    })
}

/// Spatial neighbor search over the tab's unit-square layout: prefer panes
/// whose extent overlaps the current one on the perpendicular axis, then the
/// nearest center distance along the movement axis.
fn focus_neighbor(tab: &TabSnapshot, direction: FocusDirection) -> Option<PaneAction> {
    let rects = tab.tree.compute_rects(Rect::UNIT);
    if rects.len() < 2 {
        return None;
    }
    let (_, current) = rects
        .iter()
        .find(|(pane, _)| *pane == tab.active_pane_id)?;
    let current = *current;
    let center_x = current.x + current.width / 2.0;
    let center_y = current.y + current.height / 2.0;

    const EPSILON: f64 = 1e-6;
    const NO_OVERLAP_PENALTY: f64 = 1000.0;

    let mut best: Option<(PaneId, f64)> = None;
    for (pane, rect) in &rects {
        if *pane == tab.active_pane_id {
            continue;
        }
        let dx = (rect.x + rect.width / 2.0) - center_x;
        let dy = (rect.y + rect.height / 2.0) - center_y;
        let (valid, overlaps, distance) = match direction {
            FocusDirection::Left => (
                dx < -EPSILON,
                rect.y < current.y + current.height && rect.y + rect.height > current.y,
                dx.abs(),
            ),
            FocusDirection::Right => (
                dx > EPSILON,
                rect.y < current.y + current.height && rect.y + rect.height > current.y,
                dx.abs(),
            ),
            FocusDirection::Up => (
                dy < -EPSILON,
                rect.x < current.x + current.width && rect.x + rect.width > current.x,
                dy.abs(),
            ),
            FocusDirection::Down => (
                dy > EPSILON,
                rect.x < current.x + current.width && rect.x + rect.width > current.x,
                dy.abs(),
            ),
        };
        if !valid {
            continue;
        }
        let score = if overlaps {
            distance
        } else {
            distance + NO_OVERLAP_PENALTY
        };
        if best.is_none_or(|(_, best_score)| score < best_score) {
            best = Some((*pane, score));
        }
    }

    best.map(|(pane_id, _)| PaneAction::FocusPane {
        tab_id: tab.id,
        pane_id,
    })
}

/// Integrity sweep: stale active-pane and zoom references become repair
/// actions the store can apply like any other.
pub fn plan_repairs(snapshot: &ActionStateSnapshot) -> Vec<PaneAction> {
    let mut repairs = Vec::new();
    for tab in &snapshot.tabs {
        if !tab.contains_layout_pane(tab.active_pane_id) {
            repairs.push(PaneAction::Repair(RepairAction::ResetActivePane {
                tab_id: tab.id,
                pane_id: tab.tree.first_pane(),
            }));
        }
        if let Some(zoomed) = tab.zoomed_pane_id {
            if !tab.contains_layout_pane(zoomed) {
                repairs.push(PaneAction::Repair(RepairAction::ClearZoom { tab_id: tab.id }));
            }
        }
    }
    repairs
}
