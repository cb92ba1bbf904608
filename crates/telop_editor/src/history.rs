// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo history of whole-project snapshots.
//!
//! Every entry holds the state from before a mutation, serialized with
//! bincode. Restoring a whole snapshot keeps cascaded deletes consistent
//! without per-operation inverse logic.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default maximum undo history depth
pub const MAX_HISTORY: usize = 100;

/// Default coalescing window
pub const DEFAULT_COALESCE_WINDOW: Duration = Duration::from_millis(500);

/// History errors
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Serialized state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Serialized state
    pub data: Vec<u8>,
    /// Size in bytes
    pub size: usize,
}

impl StateSnapshot {
    /// Create a new state snapshot
    pub fn new(data: Vec<u8>) -> Self {
        let size = data.len();
        Self { data, size }
    }

    /// Create from serializable value
    pub fn from_value<T: Serialize>(value: &T) -> Result<Self> {
        let data = bincode::serialize(value)?;
        Ok(Self::new(data))
    }

    /// Deserialize to value
    pub fn to_value<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(bincode::deserialize(&self.data)?)
    }
}

/// One undo step
#[derive(Debug, Clone)]
struct Entry {
    label: String,
    snapshot: StateSnapshot,
    last_push: Instant,
}

/// History statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Entries in the undo stack
    pub undo_count: usize,
    /// Entries in the redo stack
    pub redo_count: usize,
    /// Total memory used by both stacks (bytes)
    pub memory_used: usize,
    /// Maximum history depth
    pub max_depth: usize,
}

/// Bounded undo/redo history manager
#[derive(Debug)]
pub struct History {
    undo_stack: VecDeque<Entry>,
    redo_stack: VecDeque<Entry>,
    max_depth: usize,
    coalesce_window: Duration,
    memory_used: usize,
}

impl History {
    /// Create a new history manager
    pub fn new() -> Self {
        Self::with_limits(MAX_HISTORY, DEFAULT_COALESCE_WINDOW)
    }

    /// Create with a custom depth and coalescing window
    pub fn with_limits(max_depth: usize, coalesce_window: Duration) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth: max_depth.max(1),
            coalesce_window,
            memory_used: 0,
        }
    }

    /// Record the state from before a mutation.
    ///
    /// A push with the same label as the previous one, within the coalescing
    /// window of it, merges into the existing entry. Returns whether a new
    /// entry was created.
    pub fn push<T: Serialize>(&mut self, label: &str, state: &T) -> Result<bool> {
        self.push_at(label, state, Instant::now())
    }

    /// [`History::push`] with an explicit timestamp
    pub fn push_at<T: Serialize>(&mut self, label: &str, state: &T, at: Instant) -> Result<bool> {
        if self.redo_stack.is_empty() {
            if let Some(top) = self.undo_stack.back_mut() {
                let within = at.saturating_duration_since(top.last_push) <= self.coalesce_window;
                if top.label == label && within {
                    top.last_push = at;
                    tracing::debug!("Coalesced history entry {:?}", label);
                    return Ok(false);
                }
            }
        }
        self.record(label, state, at)?;
        Ok(true)
    }

    /// Record the state from before a mutation as its own entry, never merging
    pub fn commit<T: Serialize>(&mut self, label: &str, state: &T) -> Result<()> {
        self.record(label, state, Instant::now())
    }

    fn record<T: Serialize>(&mut self, label: &str, state: &T, at: Instant) -> Result<()> {
        let snapshot = StateSnapshot::from_value(state)?;

        for entry in self.redo_stack.drain(..) {
            self.memory_used = self.memory_used.saturating_sub(entry.snapshot.size);
        }

        self.memory_used += snapshot.size;
        self.undo_stack.push_back(Entry {
            label: label.to_string(),
            snapshot,
            last_push: at,
        });

        while self.undo_stack.len() > self.max_depth {
            if let Some(old) = self.undo_stack.pop_front() {
                self.memory_used = self.memory_used.saturating_sub(old.snapshot.size);
            }
        }

        tracing::debug!(
            "History push {:?} ({} entries, {} bytes)",
            label,
            self.undo_stack.len(),
            self.memory_used
        );
        Ok(())
    }

    /// Step back: returns the state to restore, or `None` when there is
    /// nothing to undo
    pub fn undo<T: Serialize + DeserializeOwned>(&mut self, current: &T) -> Result<Option<T>> {
        let Some(entry) = self.undo_stack.back() else {
            return Ok(None);
        };
        let restored = entry.snapshot.to_value()?;
        let current = StateSnapshot::from_value(current)?;

        if let Some(entry) = self.undo_stack.pop_back() {
            self.memory_used = self.memory_used.saturating_sub(entry.snapshot.size);
            self.memory_used += current.size;
            self.redo_stack.push_back(Entry {
                label: entry.label,
                snapshot: current,
                last_push: entry.last_push,
            });
        }
        Ok(Some(restored))
    }

    /// Step forward: returns the state to restore, or `None` when there is
    /// nothing to redo
    pub fn redo<T: Serialize + DeserializeOwned>(&mut self, current: &T) -> Result<Option<T>> {
        let Some(entry) = self.redo_stack.back() else {
            return Ok(None);
        };
        let restored = entry.snapshot.to_value()?;
        let current = StateSnapshot::from_value(current)?;

        if let Some(entry) = self.redo_stack.pop_back() {
            self.memory_used = self.memory_used.saturating_sub(entry.snapshot.size);
            self.memory_used += current.size;
            self.undo_stack.push_back(Entry {
                label: entry.label,
                snapshot: current,
                last_push: entry.last_push,
            });
        }
        Ok(Some(restored))
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get undo stack depth
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get redo stack depth
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.memory_used = 0;
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            memory_used: self.memory_used,
            max_depth: self.max_depth,
        }
    }

    /// Get description of next undo operation
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|e| e.label.as_str())
    }

    /// Get description of next redo operation
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|e| e.label.as_str())
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
