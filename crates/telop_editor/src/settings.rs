// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor settings.
//!
//! Stored as RON next to the project; every field falls back to its default
//! when missing from the file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Settings errors
#[derive(Debug, Error)]
pub enum SettingsError {
    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed RON
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Settings could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] ron::Error),

    /// A value is out of range
    #[error("Invalid setting {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Editor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Settings format version
    pub version: u32,
    /// Maximum number of undo steps
    pub history_depth: usize,
    /// Same-label edits closer together than this merge into one undo step
    pub coalesce_window_ms: u64,
    /// Pointer movement (px) before a press becomes a drag
    pub drag_threshold_px: f64,
    /// Snap dragged elements to the grid
    pub snap_enabled: bool,
    /// Grid size (px)
    pub snap_size: f64,
    /// Distance (px) moved by one keyboard nudge
    pub nudge_step_px: f64,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            history_depth: 100,
            coalesce_window_ms: 500,
            drag_threshold_px: 3.0,
            snap_enabled: false,
            snap_size: 10.0,
            nudge_step_px: 1.0,
        }
    }
}

impl EditorSettings {
    /// Coalescing window as a duration
    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_window_ms)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.version > SETTINGS_FORMAT_VERSION {
            return Err(SettingsError::Invalid {
                field: "version",
                reason: format!(
                    "{} is newer than supported version {}",
                    self.version, SETTINGS_FORMAT_VERSION
                ),
            });
        }
        if self.history_depth == 0 {
            return Err(SettingsError::Invalid {
                field: "history_depth",
                reason: "must be at least 1".to_string(),
            });
        }
        let positive = [
            ("drag_threshold_px", self.drag_threshold_px, true),
            ("snap_size", self.snap_size, false),
            ("nudge_step_px", self.nudge_step_px, false),
        ];
        for (field, value, allow_zero) in positive {
            let ok = value.is_finite() && (value > 0.0 || (allow_zero && value == 0.0));
            if !ok {
                return Err(SettingsError::Invalid {
                    field,
                    reason: format!("{value} is out of range"),
                });
            }
        }
        Ok(())
    }

    /// Parse and validate settings from RON
    pub fn from_ron(source: &str) -> Result<Self, SettingsError> {
        let settings: EditorSettings = ron::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_ron(&content)?;
        tracing::info!("Loaded editor settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        tracing::info!("Saved editor settings to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings = EditorSettings::from_ron("(snap_enabled: true, snap_size: 8.0)").unwrap();
        assert!(settings.snap_enabled);
        assert_eq!(settings.snap_size, 8.0);
        assert_eq!(settings.history_depth, 100);
        assert_eq!(settings.coalesce_window(), Duration::from_millis(500));
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert!(matches!(
            EditorSettings::from_ron("(history_depth: 0)"),
            Err(SettingsError::Invalid { field: "history_depth", .. })
        ));
        assert!(matches!(
            EditorSettings::from_ron("(snap_size: -1.0)"),
            Err(SettingsError::Invalid { field: "snap_size", .. })
        ));
        assert!(EditorSettings::from_ron("(drag_threshold_px: 0.0)").is_ok());
        assert!(matches!(
            EditorSettings::from_ron("(history_depth: \"ten\")"),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("telop-settings-{}.ron", std::process::id()));
        let settings = EditorSettings {
            nudge_step_px: 10.0,
            ..Default::default()
        };
        settings.save(&path).unwrap();
        let loaded = EditorSettings::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, settings);
    }
}
