// Binary split tree. Each split carries a stable id (for resize actions), a
// direction, and a clamped ratio. The shape mirrors what the store persists
// and what the resolver inspects.

use quay_core::{PaneId, SplitId};
use serde::{Deserialize, Serialize};

/// Ratio bounds: neither side of a split may drop below a tenth of the
/// available extent.
pub const MIN_RATIO: f64 = 0.1;
pub const MAX_RATIO: f64 = 0.9;

pub fn clamp_ratio(ratio: f64) -> f64 {
    ratio.clamp(MIN_RATIO, MAX_RATIO)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitDirection {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SplitTree {
    Leaf(PaneId),
    Split {
        id: SplitId,
        direction: SplitDirection,
        ratio: f64,
        left: Box<SplitTree>,
        right: Box<SplitTree>,
    },
}

/// Axis-aligned rectangle in the unit square, used for spatial focus
/// navigation. No pixels here; the UI scales as it pleases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const UNIT: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };
}

impl SplitTree {
    pub fn leaf(pane: PaneId) -> Self {
        SplitTree::Leaf(pane)
    }

    pub fn contains(&self, pane: PaneId) -> bool {
        match self {
            SplitTree::Leaf(id) => *id == pane,
            SplitTree::Split { left, right, .. } => left.contains(pane) || right.contains(pane),
        }
    }

    /// Leaf pane ids in left-to-right traversal order.
    pub fn pane_ids(&self) -> Vec<PaneId> {
        let mut out = Vec::new();
        self.collect_pane_ids(&mut out);
        out
    }

    fn collect_pane_ids(&self, out: &mut Vec<PaneId>) {
        match self {
            SplitTree::Leaf(id) => out.push(*id),
            SplitTree::Split { left, right, .. } => {
                left.collect_pane_ids(out);
                right.collect_pane_ids(out);
            }
        }
    }

    pub fn pane_count(&self) -> usize {
        match self {
            SplitTree::Leaf(_) => 1,
            SplitTree::Split { left, right, .. } => left.pane_count() + right.pane_count(),
        }
    }

    pub fn first_pane(&self) -> PaneId {
        match self {
            SplitTree::Leaf(id) => *id,
            SplitTree::Split { left, .. } => left.first_pane(),
        }
    }

    /// Count leaves reachable through consecutive same-direction splits; a
    /// differently-directed split or a leaf counts as one.
    fn count_chain_leaves(&self, direction: SplitDirection) -> usize {
        match self {
            SplitTree::Leaf(_) => 1,
            SplitTree::Split {
                direction: split_direction,
                left,
                right,
                ..
            } if *split_direction == direction => {
                left.count_chain_leaves(direction) + right.count_chain_leaves(direction)
            }
            _ => 1,
        }
    }

    /// Replace the `target` leaf with a split holding `target` and
    /// `new_pane`. When the new split extends a same-direction chain, the
    /// chain's ratios are re-balanced so every leaf gets equal space.
    pub fn insert_pane_at(
        &mut self,
        target: PaneId,
        new_pane: PaneId,
        direction: SplitDirection,
        insert_first: bool,
    ) -> bool {
        match self {
            SplitTree::Leaf(id) if *id == target => {
                let target_node = SplitTree::Leaf(target);
                let new_node = SplitTree::Leaf(new_pane);
                let (left, right) = if insert_first {
                    (new_node, target_node)
                } else {
                    (target_node, new_node)
                };
                *self = SplitTree::Split {
                    id: SplitId::new(),
                    direction,
                    ratio: 0.5,
                    left: Box::new(left),
                    right: Box::new(right),
                };
                true
            }
            SplitTree::Leaf(_) => false,
            SplitTree::Split {
                direction: split_direction,
                ratio,
                left,
                right,
                ..
            } => {
                let inserted = left.insert_pane_at(target, new_pane, direction, insert_first)
                    || right.insert_pane_at(target, new_pane, direction, insert_first);
                if inserted && *split_direction == direction {
                    let n_left = left.count_chain_leaves(direction);
                    let n_right = right.count_chain_leaves(direction);
                    *ratio = clamp_ratio(n_left as f64 / (n_left + n_right) as f64);
                }
                inserted
            }
        }
    }

    /// Remove a pane. Returns:
    /// - `Some(Some(tree))` if found and a sibling subtree remains
    /// - `Some(None)` if found and this whole node disappears (lone leaf)
    /// - `None` if the pane is not in this subtree
    pub fn remove_pane(&mut self, target: PaneId) -> Option<Option<SplitTree>> {
        match self {
            SplitTree::Leaf(id) if *id == target => Some(None),
            SplitTree::Leaf(_) => None,
            SplitTree::Split {
                direction,
                ratio,
                left,
                right,
                ..
            } => {
                let direction = *direction;

                let left_before = left.count_chain_leaves(direction);
                if let Some(replacement) = left.remove_pane(target) {
                    return match replacement {
                        Some(node) => {
                            **left = node;
                            if left.count_chain_leaves(direction) != left_before {
                                let n_left = left.count_chain_leaves(direction);
                                let n_right = right.count_chain_leaves(direction);
                                *ratio = clamp_ratio(n_left as f64 / (n_left + n_right) as f64);
                            }
                            Some(Some(self.clone()))
                        }
                        None => Some(Some(right.as_ref().clone())),
                    };
                }
                let right_before = right.count_chain_leaves(direction);
                if let Some(replacement) = right.remove_pane(target) {
                    return match replacement {
                        Some(node) => {
                            **right = node;
                            if right.count_chain_leaves(direction) != right_before {
                                let n_left = left.count_chain_leaves(direction);
                                let n_right = right.count_chain_leaves(direction);
                                *ratio = clamp_ratio(n_left as f64 / (n_left + n_right) as f64);
                            }
                            Some(Some(self.clone()))
                        }
                        None => Some(Some(left.as_ref().clone())),
                    };
                }
                None
            }
        }
    }

    /// Re-balance every same-direction chain so sibling leaves share space
    /// equally.
    pub fn equalize(&mut self) {
        if let SplitTree::Split {
            direction,
            ratio,
            left,
            right,
            ..
        } = self
        {
            let n_left = left.count_chain_leaves(*direction);
            let n_right = right.count_chain_leaves(*direction);
            *ratio = clamp_ratio(n_left as f64 / (n_left + n_right) as f64);
            left.equalize();
            right.equalize();
        }
    }

    /// Set the ratio of the split with the given id. The value is clamped on
    /// write. Returns false when the split does not exist.
    pub fn set_ratio(&mut self, split_id: SplitId, new_ratio: f64) -> bool {
        match self {
            SplitTree::Leaf(_) => false,
            SplitTree::Split {
                id,
                ratio,
                left,
                right,
                ..
            } => {
                if *id == split_id {
                    *ratio = clamp_ratio(new_ratio);
                    true
                } else {
                    left.set_ratio(split_id, new_ratio) || right.set_ratio(split_id, new_ratio)
                }
            }
        }
    }

    pub fn has_split(&self, split_id: SplitId) -> bool {
        match self {
            SplitTree::Leaf(_) => false,
            SplitTree::Split {
                id, left, right, ..
            } => *id == split_id || left.has_split(split_id) || right.has_split(split_id),
        }
    }

    /// Rectangles for every leaf within `rect`, in traversal order.
    pub fn compute_rects(&self, rect: Rect) -> Vec<(PaneId, Rect)> {
        let mut out = Vec::new();
        self.collect_rects(rect, &mut out);
        out
    }

    fn collect_rects(&self, rect: Rect, out: &mut Vec<(PaneId, Rect)>) {
        match self {
            SplitTree::Leaf(id) => out.push((*id, rect)),
            SplitTree::Split {
                direction,
                ratio,
                left,
                right,
                ..
            } => {
                let (left_rect, right_rect) = split_rect(rect, *direction, *ratio);
                left.collect_rects(left_rect, out);
                right.collect_rects(right_rect, out);
            }
        }
    }
}

fn split_rect(rect: Rect, direction: SplitDirection, ratio: f64) -> (Rect, Rect) {
    match direction {
        SplitDirection::Horizontal => {
            let left_width = rect.width * ratio;
            (
                Rect {
                    x: rect.x,
                    y: rect.y,
                    width: left_width,
                    height: rect.height,
                },
                Rect {
                    x: rect.x + left_width,
                    y: rect.y,
                    width: rect.width - left_width,
                    height: rect.height,
                },
            )
        }
        SplitDirection::Vertical => {
            let top_height = rect.height * ratio;
            (
                Rect {
                    x: rect.x,
                    y: rect.y,
                    width: rect.width,
                    height: top_height,
                },
                Rect {
                    x: rect.x,
                    y: rect.y + top_height,
                    width: rect.width,
                    height: rect.height - top_height,
                },
            )
        }
    }
}
