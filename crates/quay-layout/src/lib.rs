// Layout engine and action planning. Everything here is pure: functions of
// an immutable workspace snapshot, no I/O, no global state. The store applies
// whatever comes out; the UI merely renders it.

mod action;
mod drop;
mod model;
mod resolver;
mod tree;
mod validate;

#[cfg(test)]
mod tests;

pub use action::{InsertDirection, PaneAction, PaneSource, RepairAction, ValidationError};
pub use drop::{plan_drop, DropDecision, PaneDropDestination, SplitDropPayload};
pub use model::{ActionStateSnapshot, Drawer, Tab, TabSnapshot};
pub use resolver::{plan_repairs, resolve, AppCommand, FocusDirection};
pub use tree::{clamp_ratio, Rect, SplitDirection, SplitTree, MAX_RATIO, MIN_RATIO};
pub use validate::validate;
