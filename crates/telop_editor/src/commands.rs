// SPDX-License-Identifier: MIT OR Apache-2.0
//! Input-layer commands.
//!
//! Commands are plain serializable events (pointer, keyboard, menu) that the
//! host feeds to [`EditorState::apply`]. Undo support lives in the state's
//! snapshot history, so commands carry no inverse data.

use crate::history::HistoryError;
use crate::state::{EditorState, SelectMode};
use serde::{Deserialize, Serialize};
use telop_model::{ElementId, TemplateId, ValidationError};

/// Error type for command execution
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The edit would violate a model invariant; nothing was changed
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// History error
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// Template not found in the project
    #[error("Template not found: {0}")]
    TemplateNotFound(TemplateId),

    /// Element reference could not be resolved
    #[error("Element not found: {0}")]
    ElementNotFound(String),
}

/// Reference to an element, by ID or by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementRef {
    /// Element ID
    Id(ElementId),
    /// First element with this name, in tree order
    Name(String),
}

/// An input event for the editor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorCommand {
    /// Change the selection
    Select {
        /// Elements to select
        elements: Vec<ElementRef>,
        /// How to combine with the current selection
        #[serde(default)]
        mode: SelectMode,
    },
    /// Press the pointer on the canvas
    PointerDown {
        /// Canvas x
        x: f64,
        /// Canvas y
        y: f64,
    },
    /// Move the pointer
    PointerMove {
        /// Canvas x
        x: f64,
        /// Canvas y
        y: f64,
    },
    /// Release the pointer
    PointerUp {
        /// Canvas x
        x: f64,
        /// Canvas y
        y: f64,
    },
    /// Abort the current drag (Escape)
    CancelDrag,
    /// Move the selection by nudge steps (arrow keys)
    Nudge {
        /// Horizontal steps
        dx: f64,
        /// Vertical steps
        dy: f64,
    },
    /// Delete the selection
    Delete,
    /// Undo the last edit
    Undo,
    /// Redo the last undone edit
    Redo,
}

impl EditorCommand {
    /// Get a description of this command
    pub fn description(&self) -> &'static str {
        match self {
            Self::Select { .. } => "Select",
            Self::PointerDown { .. } => "Pointer Down",
            Self::PointerMove { .. } => "Pointer Move",
            Self::PointerUp { .. } => "Pointer Up",
            Self::CancelDrag => "Cancel Drag",
            Self::Nudge { .. } => "Nudge",
            Self::Delete => "Delete",
            Self::Undo => "Undo",
            Self::Redo => "Redo",
        }
    }
}

impl EditorState {
    /// Resolve an element reference against the active template
    pub fn resolve(&self, element: &ElementRef) -> Result<ElementId, CommandError> {
        let template = self.template()?;
        match element {
            ElementRef::Id(id) if template.contains(*id) => Ok(*id),
            ElementRef::Id(id) => Err(CommandError::ElementNotFound(id.to_string())),
            ElementRef::Name(name) => template
                .walk()
                .iter()
                .find(|entry| entry.element.name == *name)
                .map(|entry| entry.element.id)
                .ok_or_else(|| CommandError::ElementNotFound(name.clone())),
        }
    }

    /// Apply an input command. Returns whether the project changed.
    pub fn apply(&mut self, command: &EditorCommand) -> Result<bool, CommandError> {
        tracing::debug!("Applying {}", command.description());
        match command {
            EditorCommand::Select { elements, mode } => {
                let ids = elements
                    .iter()
                    .map(|element| self.resolve(element))
                    .collect::<Result<Vec<_>, _>>()?;
                self.select(&ids, *mode);
                Ok(false)
            }
            EditorCommand::PointerDown { x, y } => {
                self.pointer_down([*x, *y])?;
                Ok(false)
            }
            EditorCommand::PointerMove { x, y } => {
                self.pointer_move([*x, *y])?;
                Ok(false)
            }
            EditorCommand::PointerUp { x, y } => self.pointer_up([*x, *y]),
            EditorCommand::CancelDrag => Ok(self.cancel_drag()),
            EditorCommand::Nudge { dx, dy } => self.nudge_selected(*dx, *dy),
            EditorCommand::Delete => Ok(self.delete_selected()? > 0),
            EditorCommand::Undo => self.undo(),
            EditorCommand::Redo => self.redo(),
        }
    }

    /// Apply commands in order, stopping at the first failure.
    /// Returns how many changed the project.
    pub fn apply_all(&mut self, commands: &[EditorCommand]) -> Result<usize, CommandError> {
        let mut changed = 0;
        for command in commands {
            if self.apply(command)? {
                changed += 1;
            }
        }
        Ok(changed)
    }
}
