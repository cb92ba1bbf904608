// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline engine for Telop.
//!
//! This crate turns templates into renderable frames:
//! - Timeline evaluation of phase animations
//! - The per-element phase state machine (`idle -> entering -> looping -> exiting`)
//! - Binding resolution from fetched records to element content
//! - A playout channel that ties the three to a host clock
//!
//! ## Architecture
//!
//! Evaluation and binding resolution are pure functions over immutable
//! values. Phase changes produce new [`PhaseBoard`]s; the [`Playout`] channel
//! publishes them as `Arc` snapshots behind `parking_lot` locks.

pub mod binding;
pub mod evaluate;
pub mod phase;
pub mod playout;

pub use binding::{
    lookup, render, resolve_bindings, BindingMissError, BindingResolution, ContentOverlay,
    DataSources, RecordSet,
};
pub use evaluate::{
    current_values, evaluate, evaluate_phase, AnimatedValues, EvaluationError, Frame,
    ResolvedContent, ResolvedElement,
};
pub use phase::{ActivationTarget, ElementPhase, PhaseBoard, PhaseState, PhaseTransition};
pub use playout::{Playout, Tick};
