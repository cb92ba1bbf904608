// SPDX-License-Identifier: MIT OR Apache-2.0
//! Template editor core for Telop.
//!
//! Headless editing of a project's templates:
//! - Selection with set/add/remove/toggle modes
//! - Snapshot-based undo/redo with label coalescing
//! - Pointer-drag group moves with threshold and grid snapping
//! - Serializable input commands for scripted or host-driven editing
//!
//! The `telop` binary in this crate wraps the editor and the timeline engine
//! in a command line tool.

pub mod commands;
pub mod history;
pub mod settings;
pub mod state;
pub mod tools;

pub use commands::{CommandError, EditorCommand, ElementRef};
pub use history::{History, HistoryError, HistoryStats, StateSnapshot, MAX_HISTORY};
pub use settings::{EditorSettings, SettingsError, SETTINGS_FORMAT_VERSION};
pub use state::{EditorState, SelectMode, Selection};
pub use tools::{drag_targets, DragGesture, DragOutcome, DragTarget, TransformController};
