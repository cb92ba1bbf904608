// SPDX-License-Identifier: MIT OR Apache-2.0
//! Phase state machine: `idle -> entering -> looping -> exiting -> idle`.
//!
//! A [`PhaseBoard`] is an immutable snapshot of every element's phase. Each
//! operation returns a new board, so an evaluation always sees either the
//! board before a transition or the board after it.

use crate::binding::ContentOverlay;
use crate::evaluate::{current_values, AnimatedValues};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use telop_model::{ElementId, Phase, Template};

/// Lifecycle phase of an element on air
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementPhase {
    /// Not on air
    #[default]
    Idle,
    /// Playing the `in` animation
    Entering,
    /// Playing the `loop` animation, or holding the end of the entrance
    Looping,
    /// Playing the `out` animation
    Exiting,
}

impl ElementPhase {
    /// Get the identifier
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Entering => "entering",
            Self::Looping => "looping",
            Self::Exiting => "exiting",
        }
    }

    /// Whether the element is visible on air
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl From<Phase> for ElementPhase {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::In => Self::Entering,
            Phase::Loop => Self::Looping,
            Phase::Out => Self::Exiting,
        }
    }
}

impl fmt::Display for ElementPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Phase of one element and when it started
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseState {
    /// Current phase
    pub phase: ElementPhase,
    /// Start of the phase (host clock, ms)
    pub since_ms: f64,
    /// Values on screen when the exit began
    pub exit_from: Option<AnimatedValues>,
}

impl PhaseState {
    fn new(phase: ElementPhase, since_ms: f64) -> Self {
        Self {
            phase,
            since_ms,
            exit_from: None,
        }
    }
}

/// Elements addressed by activation or deactivation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationTarget {
    /// Every element of the template, nested ones included
    Template,
    /// Specific elements
    Elements(Vec<ElementId>),
}

impl ActivationTarget {
    fn resolve(&self, template: &Template) -> Vec<ElementId> {
        match self {
            Self::Template => template.walk().iter().map(|e| e.element.id).collect(),
            Self::Elements(ids) => ids
                .iter()
                .copied()
                .filter(|id| {
                    let known = template.contains(*id);
                    if !known {
                        tracing::debug!("Ignoring unknown activation target {}", id);
                    }
                    known
                })
                .collect(),
        }
    }
}

/// An automatic or requested phase change
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseTransition {
    /// Element that changed phase
    pub element: ElementId,
    /// Previous phase
    pub from: ElementPhase,
    /// New phase
    pub to: ElementPhase,
    /// Exact time of the change (ms)
    pub at_ms: f64,
}

/// Immutable map of element phases; absent elements are idle
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PhaseBoard {
    states: HashMap<ElementId, PhaseState>,
}

impl PhaseBoard {
    /// Create a board with every element idle
    pub fn new() -> Self {
        Self::default()
    }

    /// State of an element, `None` when idle
    pub fn state(&self, element: ElementId) -> Option<&PhaseState> {
        self.states.get(&element)
    }

    /// Phase of an element
    pub fn phase(&self, element: ElementId) -> ElementPhase {
        self.state(element).map_or(ElementPhase::Idle, |s| s.phase)
    }

    /// Number of elements that are not idle
    pub fn active_count(&self) -> usize {
        self.states.len()
    }

    /// Whether every element is idle
    pub fn is_idle(&self) -> bool {
        self.states.is_empty()
    }

    /// Put idle or exiting elements on air at `now_ms`.
    ///
    /// Elements without an `in` animation go straight to looping. Elements
    /// already entering or looping are left alone.
    pub fn activate(&self, template: &Template, target: &ActivationTarget, now_ms: f64) -> Self {
        let mut next = self.clone();
        let mut activated = 0;
        for id in target.resolve(template) {
            match next.phase(id) {
                ElementPhase::Idle | ElementPhase::Exiting => {
                    let phase = if template.animation_for(id, Phase::In).is_some() {
                        ElementPhase::Entering
                    } else {
                        ElementPhase::Looping
                    };
                    next.states.insert(id, PhaseState::new(phase, now_ms));
                    activated += 1;
                }
                ElementPhase::Entering | ElementPhase::Looping => {}
            }
        }
        tracing::debug!(
            "Activated {} elements of {:?} at {}ms",
            activated,
            template.name(),
            now_ms
        );
        next
    }

    /// Apply the automatic transitions due at `now_ms`.
    ///
    /// The loop clock starts at the exact end of the entrance, not at `now_ms`.
    pub fn advance(&self, template: &Template, now_ms: f64) -> (Self, Vec<PhaseTransition>) {
        let mut next = self.clone();
        let mut transitions = Vec::new();

        for entry in template.walk() {
            let id = entry.element.id;
            let Some(state) = self.states.get(&id) else {
                continue;
            };
            match state.phase {
                ElementPhase::Entering => {
                    let end = state.since_ms + phase_duration(template, id, Phase::In);
                    if now_ms >= end {
                        next.states.insert(id, PhaseState::new(ElementPhase::Looping, end));
                        transitions.push(PhaseTransition {
                            element: id,
                            from: ElementPhase::Entering,
                            to: ElementPhase::Looping,
                            at_ms: end,
                        });
                    }
                }
                ElementPhase::Exiting => {
                    let end = state.since_ms + phase_duration(template, id, Phase::Out);
                    if now_ms >= end {
                        next.states.remove(&id);
                        transitions.push(PhaseTransition {
                            element: id,
                            from: ElementPhase::Exiting,
                            to: ElementPhase::Idle,
                            at_ms: end,
                        });
                    }
                }
                ElementPhase::Idle | ElementPhase::Looping => {}
            }
        }

        for transition in &transitions {
            tracing::debug!(
                "Element {} {} -> {} at {}ms",
                transition.element,
                transition.from,
                transition.to,
                transition.at_ms
            );
        }
        (next, transitions)
    }

    /// Take entering or looping elements off air at `now_ms`.
    ///
    /// The values on screen at `now_ms` become the base of the `out`
    /// animation. Elements without an `out` animation go straight to idle.
    pub fn deactivate(
        &self,
        template: &Template,
        target: &ActivationTarget,
        now_ms: f64,
        overlay: &ContentOverlay,
    ) -> Self {
        let mut next = self.clone();
        for id in target.resolve(template) {
            if !matches!(self.phase(id), ElementPhase::Entering | ElementPhase::Looping) {
                continue;
            }
            let Some(element) = template.element(id) else {
                continue;
            };
            if template.animation_for(id, Phase::Out).is_some() {
                let snapshot = current_values(template, element, self, now_ms, overlay);
                next.states.insert(
                    id,
                    PhaseState {
                        phase: ElementPhase::Exiting,
                        since_ms: now_ms,
                        exit_from: Some(snapshot),
                    },
                );
            } else {
                next.states.remove(&id);
            }
        }
        tracing::debug!(
            "Deactivated {:?} at {}ms ({} elements still active)",
            template.name(),
            now_ms,
            next.active_count()
        );
        next
    }
}

fn phase_duration(template: &Template, element: ElementId, phase: Phase) -> f64 {
    template
        .animation_for(element, phase)
        .map_or(0.0, |a| a.duration_ms.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::evaluate;
    use telop_model::{Animation, Easing, Element, Geometry, Keyframe, ShapeDescriptor, TransformSpec};

    fn strap(with_out: bool) -> (Template, ElementId) {
        let strap = Element::shape("Strap", ShapeDescriptor::rectangle("#c8102e"))
            .with_geometry(Geometry::new(0.0, 900.0, 1920.0, 120.0).unwrap());
        let id = strap.id;
        let mut animations = vec![Animation::new(
            id,
            Phase::In,
            500.0,
            Easing::Linear,
            vec![
                Keyframe::at(0.0)
                    .with_opacity(0.0)
                    .with_transform(TransformSpec::translate(0.0, 40.0)),
                Keyframe::at(100.0)
                    .with_opacity(1.0)
                    .with_transform(TransformSpec::translate(0.0, 0.0)),
            ],
        )
        .unwrap()];
        if with_out {
            animations.push(
                Animation::new(
                    id,
                    Phase::Out,
                    300.0,
                    Easing::Linear,
                    vec![Keyframe::at(100.0).with_opacity(0.0)],
                )
                .unwrap(),
            );
        }
        (Template::new("Strap", vec![strap], animations, vec![]).unwrap(), id)
    }

    #[test]
    fn test_entrance_then_held_values() {
        let (template, id) = strap(false);
        let overlay = ContentOverlay::new();
        let board = PhaseBoard::new().activate(&template, &ActivationTarget::Template, 0.0);
        assert_eq!(board.phase(id), ElementPhase::Entering);

        let frame = evaluate(&template, &board, 250.0, &overlay);
        assert!((frame.element(id).unwrap().opacity - 0.5).abs() < 1e-9);

        let frame = evaluate(&template, &board, 600.0, &overlay);
        assert_eq!(frame.element(id).unwrap().opacity, 1.0);

        let (board, transitions) = board.advance(&template, 600.0);
        assert_eq!(
            transitions,
            vec![PhaseTransition {
                element: id,
                from: ElementPhase::Entering,
                to: ElementPhase::Looping,
                at_ms: 500.0,
            }]
        );
        assert_eq!(board.state(id).unwrap().since_ms, 500.0);
        let frame = evaluate(&template, &board, 10_000.0, &overlay);
        assert_eq!(frame.element(id).unwrap().opacity, 1.0);
        assert_eq!(frame.element(id).unwrap().position_y, 900.0);
    }

    #[test]
    fn test_activation_without_entrance_loops_immediately() {
        let text = Element::text("Clock", "12:00");
        let id = text.id;
        let template = Template::new("Clock", vec![text], vec![], vec![]).unwrap();
        let board = PhaseBoard::new().activate(&template, &ActivationTarget::Template, 42.0);
        assert_eq!(board.phase(id), ElementPhase::Looping);
        let (_, transitions) = board.advance(&template, 1_000_000.0);
        assert!(transitions.is_empty());
    }

    #[test]
    fn test_exit_starts_from_current_values() {
        let (template, id) = strap(true);
        let overlay = ContentOverlay::new();
        let board = PhaseBoard::new().activate(&template, &ActivationTarget::Template, 0.0);
        let board = board.deactivate(&template, &ActivationTarget::Template, 200.0, &overlay);
        assert_eq!(board.phase(id), ElementPhase::Exiting);

        let frame = evaluate(&template, &board, 200.0, &overlay);
        let strap = frame.element(id).unwrap();
        assert!((strap.opacity - 0.4).abs() < 1e-9);
        assert!((strap.position_y - 924.0).abs() < 1e-9);

        let frame = evaluate(&template, &board, 350.0, &overlay);
        let strap = frame.element(id).unwrap();
        assert!((strap.opacity - 0.2).abs() < 1e-9);
        assert!((strap.position_y - 924.0).abs() < 1e-9);

        let (board, transitions) = board.advance(&template, 499.0);
        assert!(transitions.is_empty());
        let (board, transitions) = board.advance(&template, 500.0);
        assert_eq!(transitions[0].to, ElementPhase::Idle);
        assert!(board.is_idle());
    }

    #[test]
    fn test_deactivate_without_exit_goes_idle() {
        let (template, id) = strap(false);
        let board = PhaseBoard::new().activate(&template, &ActivationTarget::Template, 0.0);
        let board = board.deactivate(
            &template,
            &ActivationTarget::Elements(vec![id]),
            100.0,
            &ContentOverlay::new(),
        );
        assert_eq!(board.phase(id), ElementPhase::Idle);
    }

    #[test]
    fn test_reactivation_restarts_entrance() {
        let (template, id) = strap(true);
        let overlay = ContentOverlay::new();
        let board = PhaseBoard::new().activate(&template, &ActivationTarget::Template, 0.0);
        let entering = board.activate(&template, &ActivationTarget::Template, 300.0);
        assert_eq!(entering.state(id).unwrap().since_ms, 0.0);

        let exiting = board.deactivate(&template, &ActivationTarget::Template, 600.0, &overlay);
        let again = exiting.activate(&template, &ActivationTarget::Template, 700.0);
        assert_eq!(again.phase(id), ElementPhase::Entering);
        assert_eq!(again.state(id).unwrap().since_ms, 700.0);
        assert!(again.state(id).unwrap().exit_from.is_none());
    }

    #[test]
    fn test_elements_change_phase_independently() {
        let (template, strap_id) = strap(false);
        let label = Element::text("Label", "LIVE");
        let label_id = label.id;
        let template = template.with_element(label, None).unwrap();

        let board = PhaseBoard::new().activate(
            &template,
            &ActivationTarget::Elements(vec![label_id, ElementId::new()]),
            0.0,
        );
        assert_eq!(board.phase(label_id), ElementPhase::Looping);
        assert_eq!(board.phase(strap_id), ElementPhase::Idle);
        assert_eq!(board.active_count(), 1);
    }
}
