// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe definitions for element animations.

use crate::element::{StyleMap, StyleValue};
use crate::error::{check_finite, check_range, Result};
use crate::transform::TransformSpec;
use serde::{Deserialize, Serialize};

/// A keyframe: a position along the animation and a sparse set of values.
///
/// Values that are `None` (or absent from `style`) are not driven by this
/// keyframe.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Keyframe {
    /// Position as a percentage of the animation duration (0-100)
    pub position: f64,
    /// Opacity at this keyframe
    pub opacity: Option<f64>,
    /// Transform at this keyframe
    pub transform: Option<TransformSpec>,
    /// Style overrides at this keyframe
    pub style: StyleMap,
}

impl Keyframe {
    /// Create an empty keyframe at a position
    pub fn at(position: f64) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Set opacity
    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = Some(opacity);
        self
    }

    /// Set transform
    pub fn with_transform(mut self, transform: TransformSpec) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Parse and set a transform string
    pub fn with_transform_str(self, transform: &str) -> Result<Self> {
        Ok(self.with_transform(transform.parse()?))
    }

    /// Set a style override
    pub fn with_style(mut self, key: impl Into<String>, value: impl Into<StyleValue>) -> Self {
        self.style.insert(key.into(), value.into());
        self
    }

    /// Check position and values
    pub fn validate(&self) -> Result<()> {
        check_range("position", self.position, 0.0, 100.0)?;
        if let Some(opacity) = self.opacity {
            check_range("opacity", opacity, 0.0, 1.0)?;
        }
        for (key, value) in &self.style {
            if let StyleValue::Number(v) = value {
                check_finite(&format!("style.{key}"), *v)?;
            }
        }
        Ok(())
    }
}
