// SPDX-License-Identifier: MIT OR Apache-2.0
//! Element animations for the entrance, loop and exit phases.

use crate::easing::Easing;
use crate::error::{check_non_negative, Result, ValidationError};
use crate::ids::{AnimationId, ElementId};
use crate::keyframe::Keyframe;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Animation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Entrance
    In,
    /// Idle / repeating
    Loop,
    /// Exit
    Out,
}

impl Phase {
    /// All phases in lifecycle order
    pub fn all() -> [Phase; 3] {
        [Phase::In, Phase::Loop, Phase::Out]
    }

    /// Get the identifier
    pub fn name(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Loop => "loop",
            Self::Out => "out",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A keyframed animation targeting one element in one phase.
///
/// Fields are public so persistence layers can rebuild records verbatim;
/// [`Animation::new`] and [`Animation::check`] enforce the keyframe invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    /// Unique animation ID
    pub id: AnimationId,
    /// Target element
    pub element: ElementId,
    /// Phase this animation plays in
    pub phase: Phase,
    /// Duration in milliseconds
    pub duration_ms: f64,
    /// Easing applied between keyframes
    pub easing: Easing,
    /// Keyframes ordered by position
    pub keyframes: Vec<Keyframe>,
}

impl Animation {
    /// Create a validated animation
    pub fn new(
        element: ElementId,
        phase: Phase,
        duration_ms: f64,
        easing: Easing,
        keyframes: Vec<Keyframe>,
    ) -> Result<Self> {
        let animation = Self {
            id: AnimationId::new(),
            element,
            phase,
            duration_ms,
            easing,
            keyframes,
        };
        animation.check()?;
        Ok(animation)
    }

    /// Check duration, keyframe values and keyframe ordering
    pub fn check(&self) -> Result<()> {
        check_non_negative("duration_ms", self.duration_ms)?;

        let mut previous: Option<f64> = None;
        for (index, keyframe) in self.keyframes.iter().enumerate() {
            keyframe
                .validate()
                .map_err(|e| e.within(format!("keyframes[{index}]")))?;
            if let Some(previous) = previous {
                if keyframe.position < previous {
                    return Err(ValidationError::new(
                        format!("keyframes[{index}].position"),
                        format!(
                            "{} precedes the previous keyframe at {previous}",
                            keyframe.position
                        ),
                    ));
                }
            }
            previous = Some(keyframe.position);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_serialization() {
        let ron = ron::to_string(&Phase::Loop).unwrap();
        assert_eq!(ron, "loop");
        assert_eq!(ron::from_str::<Phase>("out").unwrap(), Phase::Out);
    }

    #[test]
    fn test_animation_validation() {
        let element = ElementId::new();
        let ok = Animation::new(
            element,
            Phase::In,
            500.0,
            Easing::Linear,
            vec![Keyframe::at(0.0), Keyframe::at(50.0), Keyframe::at(50.0), Keyframe::at(100.0)],
        );
        assert!(ok.is_ok());

        let err = Animation::new(element, Phase::In, -1.0, Easing::Linear, vec![]).unwrap_err();
        assert_eq!(err.field, "duration_ms");

        let err = Animation::new(
            element,
            Phase::In,
            500.0,
            Easing::Linear,
            vec![Keyframe::at(60.0), Keyframe::at(40.0)],
        )
        .unwrap_err();
        assert_eq!(err.field, "keyframes[1].position");

        let err = Animation::new(
            element,
            Phase::Out,
            500.0,
            Easing::Linear,
            vec![Keyframe::at(10.0).with_opacity(3.0)],
        )
        .unwrap_err();
        assert_eq!(err.field, "keyframes[0].opacity");
    }
}
