// SPDX-License-Identifier: MIT OR Apache-2.0
//! Entity model for Telop broadcast graphics.
//!
//! This crate defines the data the rest of the engine works on:
//! - Projects, layers and templates
//! - Elements with geometry, style and typed content
//! - Phase animations with sparse keyframes and easing
//! - Data bindings from external records to element content
//!
//! ## Architecture
//!
//! Every entity is a plain value. Constructors validate invariants and fail
//! with [`ValidationError`]; mutations are pure operations that return a new
//! value, so snapshots can be shared with evaluation and history freely.

pub mod animation;
pub mod binding;
pub mod easing;
pub mod element;
pub mod error;
pub mod ids;
pub mod keyframe;
pub mod project;
pub mod template;
pub mod transform;

pub use animation::{Animation, Phase};
pub use binding::{Binding, ContentField, DisplayFormat, FieldPath, PathSegment, RecordSelector};
pub use easing::Easing;
pub use element::{
    Content, Element, ElementKind, Geometry, ShapeDescriptor, ShapeKind, StyleMap, StyleValue,
};
pub use error::{Result, ValidationError};
pub use ids::{AnimationId, BindingId, ElementId, InstanceId, LayerId, ProjectId, TemplateId};
pub use keyframe::Keyframe;
pub use project::{Layer, Project, ProjectLoadError, PROJECT_FORMAT_VERSION};
pub use template::{ElementEntry, Template, TemplateData, TemplateInstance, MAX_GROUP_DEPTH};
pub use transform::TransformSpec;
