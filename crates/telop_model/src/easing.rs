// SPDX-License-Identifier: MIT OR Apache-2.0
//! Easing functions and their identifiers.

use crate::error::{Result, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Easing function applied to the local fraction between two keyframes.
///
/// Serialized as its identifier string (`"ease-in-out"`, `"steps(4)"`,
/// `"cubic-bezier(0.2, 0, 0, 1)"`...).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Easing {
    /// Identity
    #[default]
    Linear,
    /// CSS `ease`
    Ease,
    /// CSS `ease-in`
    EaseIn,
    /// CSS `ease-out`
    EaseOut,
    /// CSS `ease-in-out`
    EaseInOut,
    /// Quadratic in
    InQuad,
    /// Quadratic out
    OutQuad,
    /// Quadratic in-out
    InOutQuad,
    /// Cubic in
    InCubic,
    /// Cubic out
    OutCubic,
    /// Cubic in-out
    InOutCubic,
    /// Jump to the end value immediately
    StepStart,
    /// Hold the start value until the end
    StepEnd,
    /// `n` equal jumps, each at the end of its interval
    Steps(u32),
    /// CSS cubic bezier with control points `(x1, y1)` and `(x2, y2)`
    CubicBezier(f64, f64, f64, f64),
}

impl Easing {
    /// Map a fraction in `[0, 1]` through the easing curve.
    ///
    /// The input is clamped; the output may leave `[0, 1]` for bezier curves
    /// with overshooting control points.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::Ease => cubic_bezier(0.25, 0.1, 0.25, 1.0, t),
            Self::EaseIn => cubic_bezier(0.42, 0.0, 1.0, 1.0, t),
            Self::EaseOut => cubic_bezier(0.0, 0.0, 0.58, 1.0, t),
            Self::EaseInOut => cubic_bezier(0.42, 0.0, 0.58, 1.0, t),
            Self::InQuad => t * t,
            Self::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(2) / 2.0)
                }
            }
            Self::InCubic => t * t * t,
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(3) / 2.0)
                }
            }
            Self::StepStart => {
                if t > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::StepEnd => {
                if t >= 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Steps(n) => {
                let n = f64::from(n.max(1));
                (t * n).floor() / n
            }
            Self::CubicBezier(x1, y1, x2, y2) => cubic_bezier(x1, y1, x2, y2, t),
        }
    }

    /// Canonical identifier
    pub fn identifier(&self) -> String {
        match self {
            Self::Linear => "linear".to_string(),
            Self::Ease => "ease".to_string(),
            Self::EaseIn => "ease-in".to_string(),
            Self::EaseOut => "ease-out".to_string(),
            Self::EaseInOut => "ease-in-out".to_string(),
            Self::InQuad => "in-quad".to_string(),
            Self::OutQuad => "out-quad".to_string(),
            Self::InOutQuad => "in-out-quad".to_string(),
            Self::InCubic => "in-cubic".to_string(),
            Self::OutCubic => "out-cubic".to_string(),
            Self::InOutCubic => "in-out-cubic".to_string(),
            Self::StepStart => "step-start".to_string(),
            Self::StepEnd => "step-end".to_string(),
            Self::Steps(n) => format!("steps({n})"),
            Self::CubicBezier(x1, y1, x2, y2) => format!("cubic-bezier({x1}, {y1}, {x2}, {y2})"),
        }
    }
}

/// Evaluate a CSS cubic bezier timing curve at `x`.
fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64, x: f64) -> f64 {
    if x <= 0.0 || x >= 1.0 {
        return x;
    }

    let cx = 3.0 * x1;
    let bx = 3.0 * (x2 - x1) - cx;
    let ax = 1.0 - cx - bx;
    let cy = 3.0 * y1;
    let by = 3.0 * (y2 - y1) - cy;
    let ay = 1.0 - cy - by;

    let sample_x = |t: f64| ((ax * t + bx) * t + cx) * t;
    let sample_y = |t: f64| ((ay * t + by) * t + cy) * t;
    let slope_x = |t: f64| (3.0 * ax * t + 2.0 * bx) * t + cx;

    // Newton-Raphson first, bisection if the slope flattens out
    let mut t = x;
    for _ in 0..8 {
        let error = sample_x(t) - x;
        if error.abs() < 1e-9 {
            return sample_y(t);
        }
        let slope = slope_x(t);
        if slope.abs() < 1e-6 {
            break;
        }
        t -= error / slope;
    }

    let (mut lo, mut hi) = (0.0, 1.0);
    t = x;
    for _ in 0..64 {
        let value = sample_x(t);
        if (value - x).abs() < 1e-9 {
            break;
        }
        if value < x {
            lo = t;
        } else {
            hi = t;
        }
        t = (lo + hi) / 2.0;
    }
    sample_y(t)
}

fn parse_args(name: &str, args: &str) -> Result<Vec<f64>> {
    args.split(',')
        .map(|part| {
            part.trim().parse::<f64>().map_err(|_| {
                ValidationError::new("easing", format!("bad argument {part:?} in {name}()"))
            })
        })
        .collect()
}

impl FromStr for Easing {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let named = match s {
            "linear" => Some(Self::Linear),
            "ease" => Some(Self::Ease),
            "ease-in" | "easeIn" => Some(Self::EaseIn),
            "ease-out" | "easeOut" => Some(Self::EaseOut),
            "ease-in-out" | "easeInOut" => Some(Self::EaseInOut),
            "in-quad" | "easeInQuad" => Some(Self::InQuad),
            "out-quad" | "easeOutQuad" => Some(Self::OutQuad),
            "in-out-quad" | "easeInOutQuad" => Some(Self::InOutQuad),
            "in-cubic" | "easeInCubic" => Some(Self::InCubic),
            "out-cubic" | "easeOutCubic" => Some(Self::OutCubic),
            "in-out-cubic" | "easeInOutCubic" => Some(Self::InOutCubic),
            "step-start" => Some(Self::StepStart),
            "step-end" => Some(Self::StepEnd),
            _ => None,
        };
        if let Some(easing) = named {
            return Ok(easing);
        }

        let Some((name, rest)) = s.split_once('(') else {
            return Err(ValidationError::new("easing", format!("unknown easing {s:?}")));
        };
        let Some(args) = rest.strip_suffix(')') else {
            return Err(ValidationError::new("easing", format!("unclosed arguments in {s:?}")));
        };

        match name.trim() {
            "steps" => {
                let n = args.trim().parse::<u32>().map_err(|_| {
                    ValidationError::new("easing", format!("bad step count {args:?}"))
                })?;
                if n == 0 {
                    return Err(ValidationError::new("easing", "steps() needs at least one step"));
                }
                Ok(Self::Steps(n))
            }
            "cubic-bezier" | "cubicBezier" => {
                let values = parse_args(name, args)?;
                let &[x1, y1, x2, y2] = values.as_slice() else {
                    return Err(ValidationError::new(
                        "easing",
                        format!("cubic-bezier() takes 4 arguments, got {}", values.len()),
                    ));
                };
                if !(0.0..=1.0).contains(&x1) || !(0.0..=1.0).contains(&x2) {
                    return Err(ValidationError::new(
                        "easing",
                        "cubic-bezier() x control points must be within [0, 1]",
                    ));
                }
                if !y1.is_finite() || !y2.is_finite() {
                    return Err(ValidationError::new("easing", "cubic-bezier() y must be finite"));
                }
                Ok(Self::CubicBezier(x1, y1, x2, y2))
            }
            other => Err(ValidationError::new("easing", format!("unknown easing {other:?}"))),
        }
    }
}

impl TryFrom<String> for Easing {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Easing> for String {
    fn from(value: Easing) -> Self {
        value.identifier()
    }
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}
