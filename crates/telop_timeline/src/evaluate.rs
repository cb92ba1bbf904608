// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline evaluation: the visual state of a template at a point in time.
//!
//! Evaluation is a pure function of the template, the phase board, the time
//! and the content overlay. It never mutates its inputs and can run on any
//! number of threads against the same template.

use crate::binding::ContentOverlay;
use crate::phase::{ElementPhase, PhaseBoard, PhaseState};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use telop_model::{
    Animation, AnimationId, Content, ContentField, Easing, Element, ElementId, ElementKind,
    Keyframe, Phase, ShapeDescriptor, StyleMap, StyleValue, Template,
};
use thiserror::Error;

/// Values of the animated channels of one element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimatedValues {
    /// Opacity in `[0, 1]`
    pub opacity: f64,
    /// Horizontal offset from the resting position
    pub translate_x: f64,
    /// Vertical offset from the resting position
    pub translate_y: f64,
    /// Horizontal scale
    pub scale_x: f64,
    /// Vertical scale
    pub scale_y: f64,
    /// Rotation in degrees
    pub rotation: f64,
    /// Style values
    pub style: StyleMap,
}

impl AnimatedValues {
    /// Resting values of an element with bound style values applied
    pub fn resting(element: &Element, overlay: &ContentOverlay) -> Self {
        let mut style = element.style.clone();
        for (key, value) in overlay.styles_for(element.id) {
            style.insert(key.to_string(), value);
        }
        Self {
            opacity: element.geometry.opacity,
            translate_x: 0.0,
            translate_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: element.geometry.rotation,
            style,
        }
    }
}

/// Content of a resolved element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedContent {
    /// Text after binding
    Text(String),
    /// Shape descriptor
    Shape(ShapeDescriptor),
    /// Image URL after binding
    Image {
        /// Source URL
        url: String,
    },
    /// IDs of the group's children, in paint order
    Group(Vec<ElementId>),
}

/// Fully resolved visual state of one element.
///
/// Values are local to the element; the renderer composes them with the
/// parent chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedElement {
    /// Element ID
    pub id: ElementId,
    /// Enclosing group
    pub parent: Option<ElementId>,
    /// Nesting depth
    pub depth: usize,
    /// Element type
    pub kind: ElementKind,
    /// Lifecycle phase the values were computed for
    pub phase: ElementPhase,
    /// Left edge (resting position plus animated translation)
    pub position_x: f64,
    /// Top edge (resting position plus animated translation)
    pub position_y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
    /// Rotation in degrees
    pub rotation: f64,
    /// Horizontal scale
    pub scale_x: f64,
    /// Vertical scale
    pub scale_y: f64,
    /// Opacity in `[0, 1]`
    pub opacity: f64,
    /// Style values
    pub style: StyleMap,
    /// Content
    pub content: ResolvedContent,
}

/// Malformed animation data found while evaluating an element
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("element {element}: {reason}")]
pub struct EvaluationError {
    /// Element that fell back to resting values
    pub element: ElementId,
    /// Offending animation
    pub animation: Option<AnimationId>,
    /// What was wrong
    pub reason: String,
}

/// Evaluated template, ready for a renderer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Frame {
    /// Elements in depth-first paint order
    pub elements: Vec<ResolvedElement>,
    /// Per-element evaluation errors
    pub errors: Vec<EvaluationError>,
}

impl Frame {
    /// Find a resolved element
    pub fn element(&self, id: ElementId) -> Option<&ResolvedElement> {
        self.elements.iter().find(|e| e.id == id)
    }
}

/// Evaluate a template for live playback at `now_ms`.
///
/// Each element's local time is measured from the start of its current phase.
pub fn evaluate(
    template: &Template,
    board: &PhaseBoard,
    now_ms: f64,
    overlay: &ContentOverlay,
) -> Frame {
    build_frame(template, overlay, |element| {
        let state = board.state(element.id);
        let phase = state.map_or(ElementPhase::Idle, |s| s.phase);
        (phase, live_values(template, element, state, now_ms, overlay))
    })
}

/// Evaluate every element in one phase at local time `t_ms` (editor scrubbing)
pub fn evaluate_phase(
    template: &Template,
    phase: Phase,
    t_ms: f64,
    overlay: &ContentOverlay,
) -> Frame {
    build_frame(template, overlay, |element| {
        let resting = AnimatedValues::resting(element, overlay);
        let values = match phase {
            Phase::In | Phase::Out => play(template, element.id, phase, &resting, t_ms),
            Phase::Loop => looping(template, element.id, &resting, t_ms),
        };
        (ElementPhase::from(phase), values)
    })
}

/// Current animated values of an element, falling back to resting values
/// when its animation data is malformed
pub fn current_values(
    template: &Template,
    element: &Element,
    board: &PhaseBoard,
    now_ms: f64,
    overlay: &ContentOverlay,
) -> AnimatedValues {
    live_values(template, element, board.state(element.id), now_ms, overlay)
        .unwrap_or_else(|_| AnimatedValues::resting(element, overlay))
}

type Evaluated = Result<AnimatedValues, EvaluationError>;

fn build_frame(
    template: &Template,
    overlay: &ContentOverlay,
    mut resolve: impl FnMut(&Element) -> (ElementPhase, Evaluated),
) -> Frame {
    let mut frame = Frame::default();
    for entry in template.walk() {
        let element = entry.element;
        let (phase, values) = resolve(element);
        let values = values.unwrap_or_else(|error| {
            tracing::warn!("{}", error);
            frame.errors.push(error);
            AnimatedValues::resting(element, overlay)
        });
        frame.elements.push(ResolvedElement {
            id: element.id,
            parent: entry.parent,
            depth: entry.depth,
            kind: element.kind(),
            phase,
            position_x: element.geometry.position_x + values.translate_x,
            position_y: element.geometry.position_y + values.translate_y,
            width: element.geometry.width,
            height: element.geometry.height,
            rotation: values.rotation,
            scale_x: values.scale_x,
            scale_y: values.scale_y,
            opacity: values.opacity,
            style: values.style,
            content: resolve_content(element, overlay),
        });
    }
    frame
}

fn resolve_content(element: &Element, overlay: &ContentOverlay) -> ResolvedContent {
    match &element.content {
        Content::Text(text) => ResolvedContent::Text(
            overlay
                .get(element.id, &ContentField::Text)
                .unwrap_or(text.as_str())
                .to_string(),
        ),
        Content::Shape(shape) => ResolvedContent::Shape(shape.clone()),
        Content::Image { url } => ResolvedContent::Image {
            url: overlay
                .get(element.id, &ContentField::ImageUrl)
                .unwrap_or(url.as_str())
                .to_string(),
        },
        Content::Group(children) => ResolvedContent::Group(children.iter().map(|c| c.id).collect()),
    }
}

fn live_values(
    template: &Template,
    element: &Element,
    state: Option<&PhaseState>,
    now_ms: f64,
    overlay: &ContentOverlay,
) -> Evaluated {
    let resting = AnimatedValues::resting(element, overlay);
    let Some(state) = state else {
        return Ok(resting);
    };
    let local = (now_ms - state.since_ms).max(0.0);
    match state.phase {
        ElementPhase::Idle => Ok(resting),
        ElementPhase::Entering => play(template, element.id, Phase::In, &resting, local),
        ElementPhase::Looping => looping(template, element.id, &resting, local),
        ElementPhase::Exiting => {
            let base = state.exit_from.as_ref().unwrap_or(&resting);
            play(template, element.id, Phase::Out, base, local)
        }
    }
}

/// Play the element's animation for `phase`, or hold `base` if it has none
fn play(
    template: &Template,
    element: ElementId,
    phase: Phase,
    base: &AnimatedValues,
    t_ms: f64,
) -> Evaluated {
    match template.animation_for(element, phase) {
        Some(animation) => {
            checked(animation)?;
            Ok(animate(animation, base, t_ms))
        }
        None => Ok(base.clone()),
    }
}

/// Loop animation modulo its duration, else the held entrance, else resting
fn looping(template: &Template, element: ElementId, resting: &AnimatedValues, t_ms: f64) -> Evaluated {
    if let Some(animation) = template.animation_for(element, Phase::Loop) {
        checked(animation)?;
        let local = if animation.duration_ms > 0.0 {
            t_ms.max(0.0) % animation.duration_ms
        } else {
            t_ms
        };
        return Ok(animate(animation, resting, local));
    }
    match template.animation_for(element, Phase::In) {
        Some(animation) => {
            checked(animation)?;
            Ok(animate(animation, resting, animation.duration_ms))
        }
        None => Ok(resting.clone()),
    }
}

fn checked(animation: &Animation) -> Result<(), EvaluationError> {
    animation.check().map_err(|error| EvaluationError {
        element: animation.element,
        animation: Some(animation.id),
        reason: error.to_string(),
    })
}

/// Sample a checked animation at local time `t_ms` over `base`
fn animate(animation: &Animation, base: &AnimatedValues, t_ms: f64) -> AnimatedValues {
    let duration = animation.duration_ms;
    let p = if duration > 0.0 {
        100.0 * t_ms.clamp(0.0, duration) / duration
    } else {
        100.0
    };
    let keyframes = &animation.keyframes;
    let easing = animation.easing;

    let opacity = number_channel(keyframes, p, easing, base.opacity, |k| k.opacity);
    let translate_x = number_channel(keyframes, p, easing, base.translate_x, |k| {
        k.transform.and_then(|t| t.translate_x)
    });
    let translate_y = number_channel(keyframes, p, easing, base.translate_y, |k| {
        k.transform.and_then(|t| t.translate_y)
    });
    let scale_x = number_channel(keyframes, p, easing, base.scale_x, |k| {
        k.transform.and_then(|t| t.scale_x)
    });
    let scale_y = number_channel(keyframes, p, easing, base.scale_y, |k| {
        k.transform.and_then(|t| t.scale_y)
    });

    let rotation_points: Vec<(f64, f64)> = keyframes
        .iter()
        .filter_map(|k| k.transform.and_then(|t| t.rotate).map(|v| (k.position, v)))
        .collect();
    let rotation = sample(&rotation_points, &base.rotation, p, easing, |a, b, f| {
        a + shortest_delta(*a, *b) * f
    });

    let mut style = base.style.clone();
    let mut sampled = HashSet::new();
    for key in keyframes.iter().flat_map(|k| k.style.keys()) {
        if !sampled.insert(key) {
            continue;
        }
        let points: Vec<(f64, StyleValue)> = keyframes
            .iter()
            .filter_map(|k| k.style.get(key).map(|v| (k.position, v.clone())))
            .collect();
        // A key with no resting value holds its first keyframe value backwards.
        let Some(base_value) = base.style.get(key).or_else(|| points.first().map(|(_, v)| v)) else {
            continue;
        };
        let value = sample(&points, base_value, p, easing, mix_style);
        style.insert(key.clone(), value);
    }

    AnimatedValues {
        opacity: opacity.clamp(0.0, 1.0),
        translate_x,
        translate_y,
        scale_x,
        scale_y,
        rotation,
        style,
    }
}

fn number_channel(
    keyframes: &[Keyframe],
    p: f64,
    easing: Easing,
    base: f64,
    pick: impl Fn(&Keyframe) -> Option<f64>,
) -> f64 {
    let points: Vec<(f64, f64)> = keyframes
        .iter()
        .filter_map(|k| pick(k).map(|v| (k.position, v)))
        .collect();
    sample(&points, &base, p, easing, |a, b, f| a + (b - a) * f)
}

/// Sample one channel at percentage `p`.
///
/// `points` are the `(position, value)` pairs of the keyframes that set the
/// channel, in order. Before the first point the base value acts as a point
/// at position 0; after the last point its value is held.
fn sample<T: Clone>(
    points: &[(f64, T)],
    base: &T,
    p: f64,
    easing: Easing,
    mix: impl Fn(&T, &T, f64) -> T,
) -> T {
    let Some(next) = points.iter().position(|(position, _)| *position > p) else {
        return points.last().map_or_else(|| base.clone(), |(_, v)| v.clone());
    };
    let (lo_position, lo) = match next {
        0 => (0.0, base),
        i => (points[i - 1].0, &points[i - 1].1),
    };
    let (hi_position, hi) = (points[next].0, &points[next].1);

    let span = hi_position - lo_position;
    let f = if span > 0.0 { (p - lo_position) / span } else { 0.0 };
    if f <= 0.0 {
        return lo.clone();
    }
    mix(lo, hi, easing.apply(f))
}

/// Signed shortest angular distance from `a` to `b`, in `[-180, 180)`
fn shortest_delta(a: f64, b: f64) -> f64 {
    (b - a + 180.0).rem_euclid(360.0) - 180.0
}

fn mix_style(a: &StyleValue, b: &StyleValue, f: f64) -> StyleValue {
    match (a, b) {
        (StyleValue::Number(a), StyleValue::Number(b)) => StyleValue::Number(a + (b - a) * f),
        _ if f >= 0.5 => b.clone(),
        _ => a.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::ActivationTarget;
    use telop_model::{Geometry, TransformSpec};

    fn fade_in(element: ElementId, duration_ms: f64, easing: Easing) -> Animation {
        Animation::new(
            element,
            Phase::In,
            duration_ms,
            easing,
            vec![
                Keyframe::at(0.0)
                    .with_opacity(0.0)
                    .with_transform(TransformSpec::translate(0.0, 40.0)),
                Keyframe::at(100.0)
                    .with_opacity(1.0)
                    .with_transform(TransformSpec::translate(0.0, 0.0)),
            ],
        )
        .unwrap()
    }

    fn lower_third(animations: impl FnOnce(ElementId) -> Vec<Animation>) -> (Template, ElementId) {
        let name = Element::text("Name", "Jane Doe")
            .with_geometry(Geometry::new(100.0, 900.0, 600.0, 80.0).unwrap())
            .with_style("color", "#ffffff");
        let id = name.id;
        let template = Template::new("Lower Third", vec![name], animations(id), vec![]).unwrap();
        (template, id)
    }

    #[test]
    fn test_phase_endpoints() {
        let (template, id) = lower_third(|id| vec![fade_in(id, 500.0, Easing::Linear)]);
        let overlay = ContentOverlay::new();

        let start = evaluate_phase(&template, Phase::In, 0.0, &overlay);
        let name = start.element(id).unwrap();
        assert_eq!(name.opacity, 0.0);
        assert_eq!(name.position_y, 940.0);

        let end = evaluate_phase(&template, Phase::In, 500.0, &overlay);
        let name = end.element(id).unwrap();
        assert_eq!(name.opacity, 1.0);
        assert_eq!(name.position_y, 900.0);

        let past = evaluate_phase(&template, Phase::In, 9_000.0, &overlay);
        assert_eq!(past.element(id).unwrap().opacity, 1.0);
    }

    #[test]
    fn test_zero_duration_snaps_to_final_values() {
        let (template, id) = lower_third(|id| vec![fade_in(id, 0.0, Easing::Linear)]);
        for t in [0.0, 10.0, 1_000.0] {
            let frame = evaluate_phase(&template, Phase::In, t, &ContentOverlay::new());
            assert_eq!(frame.element(id).unwrap().opacity, 1.0);
        }
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let (template, _) = lower_third(|id| vec![fade_in(id, 500.0, Easing::EaseInOut)]);
        let a = evaluate_phase(&template, Phase::In, 137.0, &ContentOverlay::new());
        let b = evaluate_phase(&template, Phase::In, 137.0, &ContentOverlay::new());
        assert_eq!(a, b);
    }

    #[test]
    fn test_easing_applies_to_fraction() {
        let (template, id) = lower_third(|id| vec![fade_in(id, 1_000.0, Easing::InQuad)]);
        let frame = evaluate_phase(&template, Phase::In, 500.0, &ContentOverlay::new());
        assert!((frame.element(id).unwrap().opacity - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_channels_bracket_independently() {
        let (template, id) = lower_third(|id| {
            vec![Animation::new(
                id,
                Phase::In,
                1_000.0,
                Easing::Linear,
                vec![
                    Keyframe::at(0.0).with_opacity(0.0),
                    Keyframe::at(50.0).with_transform(TransformSpec::translate(20.0, 0.0)),
                    Keyframe::at(100.0).with_opacity(1.0),
                ],
            )
            .unwrap()]
        });
        let frame = evaluate_phase(&template, Phase::In, 250.0, &ContentOverlay::new());
        let name = frame.element(id).unwrap();
        // Opacity brackets 0..100, translation runs from the base value to 50.
        assert!((name.opacity - 0.25).abs() < 1e-9);
        assert!((name.position_x - 110.0).abs() < 1e-9);
        // Untouched channels keep resting values.
        assert_eq!(name.scale_x, 1.0);
        assert_eq!(name.rotation, 0.0);

        let frame = evaluate_phase(&template, Phase::In, 1_000.0, &ContentOverlay::new());
        assert_eq!(frame.element(id).unwrap().position_x, 120.0);
    }

    #[test]
    fn test_rotation_takes_shortest_path() {
        let (template, id) = lower_third(|id| {
            vec![Animation::new(
                id,
                Phase::Loop,
                1_000.0,
                Easing::Linear,
                vec![
                    Keyframe::at(0.0).with_transform(TransformSpec::rotate(350.0)),
                    Keyframe::at(100.0).with_transform(TransformSpec::rotate(10.0)),
                ],
            )
            .unwrap()]
        });
        let frame = evaluate_phase(&template, Phase::Loop, 500.0, &ContentOverlay::new());
        assert!((frame.element(id).unwrap().rotation - 360.0).abs() < 1e-9);
    }

    #[test]
    fn test_style_values_interpolate_or_step() {
        let (template, id) = lower_third(|id| {
            vec![Animation::new(
                id,
                Phase::In,
                1_000.0,
                Easing::Linear,
                vec![
                    Keyframe::at(0.0).with_style("font_size", 20.0).with_style("color", "#000000"),
                    Keyframe::at(100.0).with_style("font_size", 40.0).with_style("color", "#ff0000"),
                ],
            )
            .unwrap()]
        });
        let overlay = ContentOverlay::new();
        let early = evaluate_phase(&template, Phase::In, 400.0, &overlay);
        let early = early.element(id).unwrap();
        assert_eq!(early.style.get("font_size"), Some(&StyleValue::Number(28.0)));
        assert_eq!(early.style.get("color"), Some(&StyleValue::Text("#000000".into())));

        let late = evaluate_phase(&template, Phase::In, 500.0, &overlay);
        assert_eq!(
            late.element(id).unwrap().style.get("color"),
            Some(&StyleValue::Text("#ff0000".into()))
        );
    }

    #[test]
    fn test_overlay_replaces_content_and_style() {
        let (template, id) = lower_third(|_| vec![]);
        let mut overlay = ContentOverlay::new();
        overlay.insert(id, ContentField::Text, "John Smith");
        overlay.insert(id, ContentField::Style("color".into()), "#00ff00");
        let frame = evaluate_phase(&template, Phase::In, 0.0, &overlay);
        let name = frame.element(id).unwrap();
        assert_eq!(name.content, ResolvedContent::Text("John Smith".into()));
        assert_eq!(name.style.get("color"), Some(&StyleValue::Text("#00ff00".into())));
    }

    #[test]
    fn test_malformed_animation_falls_back_to_resting() {
        let logo = Element::image("Logo", "logo.png");
        let logo_id = logo.id;
        let (template, id) = lower_third(|id| {
            let mut broken = fade_in(id, 500.0, Easing::Linear);
            broken.keyframes.reverse();
            vec![broken]
        });
        let template = template.with_element(logo, None).unwrap();
        let template = template
            .with_animation(fade_in(logo_id, 500.0, Easing::Linear))
            .unwrap();

        let frame = evaluate_phase(&template, Phase::In, 0.0, &ContentOverlay::new());
        assert_eq!(frame.errors.len(), 1);
        assert_eq!(frame.errors[0].element, id);
        assert_eq!(frame.element(id).unwrap().opacity, 1.0);
        assert_eq!(frame.element(logo_id).unwrap().opacity, 0.0);
    }

    #[test]
    fn test_loop_wraps_and_holds_entrance() {
        let (template, id) = lower_third(|id| {
            vec![
                fade_in(id, 500.0, Easing::Linear),
                Animation::new(
                    id,
                    Phase::Loop,
                    1_000.0,
                    Easing::Linear,
                    vec![
                        Keyframe::at(0.0).with_opacity(1.0),
                        Keyframe::at(50.0).with_opacity(0.5),
                        Keyframe::at(100.0).with_opacity(1.0),
                    ],
                )
                .unwrap(),
            ]
        });
        let overlay = ContentOverlay::new();
        let frame = evaluate_phase(&template, Phase::Loop, 2_500.0, &overlay);
        assert!((frame.element(id).unwrap().opacity - 0.5).abs() < 1e-9);

        let (held, id) = lower_third(|id| vec![fade_in(id, 500.0, Easing::Linear)]);
        let frame = evaluate_phase(&held, Phase::Loop, 0.0, &overlay);
        assert_eq!(frame.element(id).unwrap().opacity, 1.0);
        assert_eq!(frame.element(id).unwrap().position_y, 900.0);
    }

    #[test]
    fn test_live_evaluation_uses_phase_clock() {
        let (template, id) = lower_third(|id| vec![fade_in(id, 500.0, Easing::Linear)]);
        let overlay = ContentOverlay::new();
        let idle = evaluate(&template, &PhaseBoard::new(), 0.0, &overlay);
        assert_eq!(idle.element(id).unwrap().phase, ElementPhase::Idle);
        assert_eq!(idle.element(id).unwrap().opacity, 1.0);

        let board = PhaseBoard::new().activate(&template, &ActivationTarget::Template, 1_000.0);
        let frame = evaluate(&template, &board, 1_250.0, &overlay);
        let name = frame.element(id).unwrap();
        assert_eq!(name.phase, ElementPhase::Entering);
        assert!((name.opacity - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_group_paint_order() {
        let child = Element::text("Score", "0");
        let child_id = child.id;
        let group = Element::group("Bug", vec![child]);
        let group_id = group.id;
        let template = Template::new("Score Bug", vec![group], vec![], vec![]).unwrap();
        let frame = evaluate_phase(&template, Phase::In, 0.0, &ContentOverlay::new());
        assert_eq!(frame.elements.len(), 2);
        assert_eq!(frame.elements[0].content, ResolvedContent::Group(vec![child_id]));
        assert_eq!(frame.elements[1].parent, Some(group_id));
        assert_eq!(frame.elements[1].depth, 1);
    }
}
