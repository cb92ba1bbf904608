// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor tools: the pointer-drag transform controller.

use crate::state::Selection;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use telop_model::{ElementId, Template};

/// An element moved by a drag, with its position when the drag began
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DragTarget {
    /// Dragged element
    pub element: ElementId,
    /// Resting x when the drag began
    pub origin_x: f64,
    /// Resting y when the drag began
    pub origin_y: f64,
}

impl DragTarget {
    /// Position after applying a delta
    pub fn moved(&self, delta: [f64; 2]) -> [f64; 2] {
        [self.origin_x + delta[0], self.origin_y + delta[1]]
    }
}

/// Elements a drag or nudge of the selection moves.
///
/// Locked elements and elements whose ancestor is also selected are left
/// out; the primary (most recently selected) element comes first.
pub fn drag_targets(template: &Template, selection: &Selection) -> Vec<DragTarget> {
    let parents: HashMap<ElementId, Option<ElementId>> = template
        .walk()
        .iter()
        .map(|entry| (entry.element.id, entry.parent))
        .collect();
    let selected: HashSet<ElementId> = selection.iter().copied().collect();

    let has_selected_ancestor = |id: ElementId| {
        let mut current = parents.get(&id).copied().flatten();
        while let Some(parent) = current {
            if selected.contains(&parent) {
                return true;
            }
            current = parents.get(&parent).copied().flatten();
        }
        false
    };

    selection
        .iter()
        .rev()
        .filter_map(|id| template.element(*id))
        .filter(|element| !element.locked && !has_selected_ancestor(element.id))
        .map(|element| DragTarget {
            element: element.id,
            origin_x: element.geometry.position_x,
            origin_y: element.geometry.position_y,
        })
        .collect()
}

/// State of an active drag
#[derive(Debug, Clone)]
pub struct DragGesture {
    /// Pointer position at press
    pub start: [f64; 2],
    /// Latest pointer position
    pub current: [f64; 2],
    /// Moved elements, primary first
    pub targets: Vec<DragTarget>,
    /// Delta applied to every target
    pub delta: [f64; 2],
    /// Whether the pointer has left the threshold radius
    pub dragging: bool,
}

/// Completed drag, ready to commit
#[derive(Debug, Clone, PartialEq)]
pub struct DragOutcome {
    /// Moved elements with their original positions
    pub targets: Vec<DragTarget>,
    /// Final delta
    pub delta: [f64; 2],
}

/// Turns pointer input into a group move of the selected elements
#[derive(Debug, Clone)]
pub struct TransformController {
    /// Pointer travel (px) before a press becomes a drag
    pub threshold_px: f64,
    /// Grid size when snapping is enabled
    pub snap: Option<f64>,
    gesture: Option<DragGesture>,
}

impl Default for TransformController {
    fn default() -> Self {
        Self::new(3.0, None)
    }
}

impl TransformController {
    /// Create a controller
    pub fn new(threshold_px: f64, snap: Option<f64>) -> Self {
        Self {
            threshold_px,
            snap,
            gesture: None,
        }
    }

    /// The active gesture, if any
    pub fn gesture(&self) -> Option<&DragGesture> {
        self.gesture.as_ref()
    }

    /// Whether a press is being tracked
    pub fn is_active(&self) -> bool {
        self.gesture.is_some()
    }

    /// Begin tracking a press; replaces any unfinished gesture
    pub fn begin(&mut self, pointer: [f64; 2], targets: Vec<DragTarget>) {
        self.gesture = Some(DragGesture {
            start: pointer,
            current: pointer,
            targets,
            delta: [0.0, 0.0],
            dragging: false,
        });
    }

    /// Track pointer movement.
    ///
    /// Returns the delta to apply to every target, or `None` while the
    /// pointer is still inside the threshold radius.
    pub fn update(&mut self, pointer: [f64; 2]) -> Option<[f64; 2]> {
        let threshold = self.threshold_px;
        let snap = self.snap;
        let gesture = self.gesture.as_mut()?;
        gesture.current = pointer;

        let raw = [pointer[0] - gesture.start[0], pointer[1] - gesture.start[1]];
        if !gesture.dragging {
            if raw[0].hypot(raw[1]) < threshold {
                return None;
            }
            gesture.dragging = true;
        }

        gesture.delta = match (snap, gesture.targets.first()) {
            (Some(size), Some(primary)) if size > 0.0 => {
                let [x, y] = primary.moved(raw);
                [
                    (x / size).round() * size - primary.origin_x,
                    (y / size).round() * size - primary.origin_y,
                ]
            }
            _ => raw,
        };
        Some(gesture.delta)
    }

    /// Release the pointer; returns the move to commit, or `None` if the
    /// press never became a drag
    pub fn end(&mut self, pointer: [f64; 2]) -> Option<DragOutcome> {
        self.update(pointer);
        let gesture = self.gesture.take()?;
        if !gesture.dragging || gesture.targets.is_empty() {
            return None;
        }
        Some(DragOutcome {
            targets: gesture.targets,
            delta: gesture.delta,
        })
    }

    /// Abort the gesture; returns the targets with their original positions
    pub fn cancel(&mut self) -> Option<Vec<DragTarget>> {
        self.gesture.take().map(|g| g.targets)
    }
}
