// SPDX-License-Identifier: MIT OR Apache-2.0
//! Validation errors raised when an entity invariant is violated.

use thiserror::Error;

/// Result type for model construction and mutation
pub type Result<T> = std::result::Result<T, ValidationError>;

/// An entity invariant was violated at construction or mutation time.
///
/// `field` is a path into the offending record (for example
/// `elements[2].geometry.opacity`) so editors can point at the exact input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    /// Path of the violated field
    pub field: String,
    /// Human-readable description of the violation
    pub reason: String,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Prefix the field path with the path of the containing record
    pub fn within(mut self, parent: impl AsRef<str>) -> Self {
        self.field = format!("{}.{}", parent.as_ref(), self.field);
        self
    }
}

/// Reject NaN and infinities.
pub(crate) fn check_finite(field: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::new(field, format!("must be finite, got {value}")))
    }
}

/// Reject non-finite and negative values.
pub(crate) fn check_non_negative(field: &str, value: f64) -> Result<()> {
    check_finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::new(field, format!("must be >= 0, got {value}")));
    }
    Ok(())
}

/// Reject values outside `[min, max]`.
pub(crate) fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<()> {
    check_finite(field, value)?;
    if value < min || value > max {
        return Err(ValidationError::new(
            field,
            format!("{value} is outside [{min}, {max}]"),
        ));
    }
    Ok(())
}
