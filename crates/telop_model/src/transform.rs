// SPDX-License-Identifier: MIT OR Apache-2.0
//! CSS-like transform strings used by keyframes.
//!
//! A keyframe may carry a transform such as `translate(0px, 40px) scale(0.9)`.
//! Only the components that appear in the string are animated; the others keep
//! the element's resting value.

use crate::error::{Result, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sparse transform components parsed from a transform string
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransformSpec {
    /// Horizontal offset from the resting position (px)
    pub translate_x: Option<f64>,
    /// Vertical offset from the resting position (px)
    pub translate_y: Option<f64>,
    /// Horizontal scale factor
    pub scale_x: Option<f64>,
    /// Vertical scale factor
    pub scale_y: Option<f64>,
    /// Absolute rotation (degrees)
    pub rotate: Option<f64>,
}

impl TransformSpec {
    /// Translation only
    pub fn translate(x: f64, y: f64) -> Self {
        Self {
            translate_x: Some(x),
            translate_y: Some(y),
            ..Default::default()
        }
    }

    /// Uniform scale only
    pub fn scale(factor: f64) -> Self {
        Self {
            scale_x: Some(factor),
            scale_y: Some(factor),
            ..Default::default()
        }
    }

    /// Rotation only
    pub fn rotate(degrees: f64) -> Self {
        Self {
            rotate: Some(degrees),
            ..Default::default()
        }
    }

    /// Whether no component is set
    pub fn is_empty(&self) -> bool {
        self.translate_x.is_none()
            && self.translate_y.is_none()
            && self.scale_x.is_none()
            && self.scale_y.is_none()
            && self.rotate.is_none()
    }
}

fn parse_length(raw: &str) -> Result<f64> {
    let raw = raw.trim();
    let number = raw.strip_suffix("px").unwrap_or(raw).trim();
    parse_number(number, raw)
}

fn parse_angle(raw: &str) -> Result<f64> {
    let raw = raw.trim();
    if let Some(v) = raw.strip_suffix("deg") {
        return parse_number(v.trim(), raw);
    }
    if let Some(v) = raw.strip_suffix("turn") {
        return Ok(parse_number(v.trim(), raw)? * 360.0);
    }
    if let Some(v) = raw.strip_suffix("rad") {
        return Ok(parse_number(v.trim(), raw)?.to_degrees());
    }
    parse_number(raw, raw)
}

fn parse_number(number: &str, raw: &str) -> Result<f64> {
    match number.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ValidationError::new("transform", format!("bad value {raw:?}"))),
    }
}

impl FromStr for TransformSpec {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self> {
        let mut spec = TransformSpec::default();
        let mut rest = s.trim();

        while !rest.is_empty() {
            let Some(open) = rest.find('(') else {
                return Err(ValidationError::new("transform", format!("expected function in {rest:?}")));
            };
            let Some(close) = rest.find(')') else {
                return Err(ValidationError::new("transform", format!("unclosed function in {rest:?}")));
            };
            if close < open {
                return Err(ValidationError::new("transform", format!("malformed {rest:?}")));
            }

            let name = rest[..open].trim();
            let args: Vec<&str> = rest[open + 1..close].split(',').collect();
            let arity = |expected: &[usize]| -> Result<()> {
                if expected.contains(&args.len()) {
                    Ok(())
                } else {
                    Err(ValidationError::new(
                        "transform",
                        format!("{name}() does not take {} arguments", args.len()),
                    ))
                }
            };

            match name {
                "translate" => {
                    arity(&[1, 2])?;
                    spec.translate_x = Some(parse_length(args[0])?);
                    spec.translate_y = Some(match args.get(1) {
                        Some(y) => parse_length(y)?,
                        None => 0.0,
                    });
                }
                "translateX" => {
                    arity(&[1])?;
                    spec.translate_x = Some(parse_length(args[0])?);
                }
                "translateY" => {
                    arity(&[1])?;
                    spec.translate_y = Some(parse_length(args[0])?);
                }
                "scale" => {
                    arity(&[1, 2])?;
                    let x = parse_number(args[0].trim(), args[0])?;
                    spec.scale_x = Some(x);
                    spec.scale_y = Some(match args.get(1) {
                        Some(y) => parse_number(y.trim(), y)?,
                        None => x,
                    });
                }
                "scaleX" => {
                    arity(&[1])?;
                    spec.scale_x = Some(parse_number(args[0].trim(), args[0])?);
                }
                "scaleY" => {
                    arity(&[1])?;
                    spec.scale_y = Some(parse_number(args[0].trim(), args[0])?);
                }
                "rotate" => {
                    arity(&[1])?;
                    spec.rotate = Some(parse_angle(args[0])?);
                }
                other => {
                    return Err(ValidationError::new(
                        "transform",
                        format!("unsupported function {other:?}"),
                    ))
                }
            }

            rest = rest[close + 1..].trim_start();
        }

        Ok(spec)
    }
}

impl fmt::Display for TransformSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        match (self.translate_x, self.translate_y) {
            (Some(x), Some(y)) => parts.push(format!("translate({x}px, {y}px)")),
            (Some(x), None) => parts.push(format!("translateX({x}px)")),
            (None, Some(y)) => parts.push(format!("translateY({y}px)")),
            (None, None) => {}
        }
        match (self.scale_x, self.scale_y) {
            (Some(x), Some(y)) if x == y => parts.push(format!("scale({x})")),
            (Some(x), Some(y)) => parts.push(format!("scale({x}, {y})")),
            (Some(x), None) => parts.push(format!("scaleX({x})")),
            (None, Some(y)) => parts.push(format!("scaleY({y})")),
            (None, None) => {}
        }
        if let Some(r) = self.rotate {
            parts.push(format!("rotate({r}deg)"));
        }
        f.write_str(&parts.join(" "))
    }
}

impl TryFrom<String> for TransformSpec {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TransformSpec> for String {
    fn from(value: TransformSpec) -> Self {
        value.to_string()
    }
}
