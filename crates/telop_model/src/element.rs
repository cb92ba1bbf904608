// SPDX-License-Identifier: MIT OR Apache-2.0
//! Positioned elements: geometry, style and content.

use crate::error::{check_finite, check_non_negative, check_range, Result};
use crate::ids::ElementId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type, derived from its content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// Text run
    Text,
    /// Vector shape
    Shape,
    /// Bitmap referenced by URL
    Image,
    /// Container of nested elements
    Group,
}

impl ElementKind {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Shape => "shape",
            Self::Image => "image",
            Self::Group => "group",
        }
    }
}

/// Resting geometry of an element, in canvas pixels and degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Left edge
    pub position_x: f64,
    /// Top edge
    pub position_y: f64,
    /// Width (>= 0)
    pub width: f64,
    /// Height (>= 0)
    pub height: f64,
    /// Rotation in degrees
    pub rotation: f64,
    /// Opacity in `[0, 1]`
    pub opacity: f64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            position_x: 0.0,
            position_y: 0.0,
            width: 100.0,
            height: 100.0,
            rotation: 0.0,
            opacity: 1.0,
        }
    }
}

impl Geometry {
    /// Create validated geometry with no rotation and full opacity
    pub fn new(position_x: f64, position_y: f64, width: f64, height: f64) -> Result<Self> {
        let geometry = Self {
            position_x,
            position_y,
            width,
            height,
            ..Default::default()
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Set rotation (degrees)
    pub fn with_rotation(mut self, rotation: f64) -> Result<Self> {
        self.rotation = rotation;
        self.validate()?;
        Ok(self)
    }

    /// Set opacity
    pub fn with_opacity(mut self, opacity: f64) -> Result<Self> {
        self.opacity = opacity;
        self.validate()?;
        Ok(self)
    }

    /// Copy with a new position
    pub fn moved_to(self, position_x: f64, position_y: f64) -> Result<Self> {
        let geometry = Self {
            position_x,
            position_y,
            ..self
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Check every field
    pub fn validate(&self) -> Result<()> {
        check_finite("position_x", self.position_x)?;
        check_finite("position_y", self.position_y)?;
        check_non_negative("width", self.width)?;
        check_non_negative("height", self.height)?;
        check_finite("rotation", self.rotation)?;
        check_range("opacity", self.opacity, 0.0, 1.0)
    }
}

/// A style value: numbers interpolate, text switches in steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StyleValue {
    /// Numeric value (font size, letter spacing, border width...)
    Number(f64),
    /// Discrete value (colour, font family, alignment...)
    Text(String),
}

impl StyleValue {
    /// Get as number if possible
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    /// Get as text if possible
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            Self::Number(_) => None,
        }
    }
}

impl fmt::Display for StyleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<f64> for StyleValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for StyleValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for StyleValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Ordered style map (key -> value)
pub type StyleMap = IndexMap<String, StyleValue>;

/// Primitive shape type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    /// Axis-aligned rectangle (optionally rounded)
    #[default]
    Rectangle,
    /// Ellipse inscribed in the bounds
    Ellipse,
    /// Line from top-left to bottom-right of the bounds
    Line,
}

/// Description of a vector shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeDescriptor {
    /// Shape type
    pub kind: ShapeKind,
    /// Fill colour (CSS colour string)
    pub fill: Option<String>,
    /// Stroke colour (CSS colour string)
    pub stroke: Option<String>,
    /// Stroke width in pixels
    pub stroke_width: f64,
    /// Corner radius for rectangles
    pub corner_radius: f64,
}

impl ShapeDescriptor {
    /// Filled rectangle
    pub fn rectangle(fill: impl Into<String>) -> Self {
        Self {
            kind: ShapeKind::Rectangle,
            fill: Some(fill.into()),
            stroke: None,
            stroke_width: 0.0,
            corner_radius: 0.0,
        }
    }

    /// Filled ellipse
    pub fn ellipse(fill: impl Into<String>) -> Self {
        Self {
            kind: ShapeKind::Ellipse,
            ..Self::rectangle(fill)
        }
    }

    fn validate(&self) -> Result<()> {
        check_non_negative("stroke_width", self.stroke_width)?;
        check_non_negative("corner_radius", self.corner_radius)
    }
}

/// Element content, tagged by element type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Content {
    /// Text string
    Text(String),
    /// Vector shape
    Shape(ShapeDescriptor),
    /// Image URL
    Image {
        /// Source URL
        url: String,
    },
    /// Nested elements, painted in order
    Group(Vec<Element>),
}

impl Content {
    /// Element type of this content
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::Text(_) => ElementKind::Text,
            Self::Shape(_) => ElementKind::Shape,
            Self::Image { .. } => ElementKind::Image,
            Self::Group(_) => ElementKind::Group,
        }
    }
}

/// A positioned element of a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Unique element ID
    pub id: ElementId,
    /// Display name
    pub name: String,
    /// Resting geometry
    pub geometry: Geometry,
    /// Resting style
    pub style: StyleMap,
    /// Authored content
    pub content: Content,
    /// Locked elements ignore pointer drags
    pub locked: bool,
}

impl Element {
    /// Create an element with default geometry
    pub fn new(name: impl Into<String>, content: Content) -> Self {
        Self {
            id: ElementId::new(),
            name: name.into(),
            geometry: Geometry::default(),
            style: StyleMap::new(),
            content,
            locked: false,
        }
    }

    /// Create a text element
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name, Content::Text(text.into()))
    }

    /// Create a shape element
    pub fn shape(name: impl Into<String>, shape: ShapeDescriptor) -> Self {
        Self::new(name, Content::Shape(shape))
    }

    /// Create an image element
    pub fn image(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(name, Content::Image { url: url.into() })
    }

    /// Create a group element
    pub fn group(name: impl Into<String>, children: Vec<Element>) -> Self {
        Self::new(name, Content::Group(children))
    }

    /// Use a specific ID
    pub fn with_id(mut self, id: ElementId) -> Self {
        self.id = id;
        self
    }

    /// Set geometry
    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Set a style entry
    pub fn with_style(mut self, key: impl Into<String>, value: impl Into<StyleValue>) -> Self {
        self.style.insert(key.into(), value.into());
        self
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Mark as locked
    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    /// Element type
    pub fn kind(&self) -> ElementKind {
        self.content.kind()
    }

    /// Direct children (empty unless this is a group)
    pub fn children(&self) -> &[Element] {
        match &self.content {
            Content::Group(children) => children,
            _ => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<Element>> {
        match &mut self.content {
            Content::Group(children) => Some(children),
            _ => None,
        }
    }

    /// Check this element's own fields (not its children)
    pub(crate) fn validate_fields(&self) -> Result<()> {
        self.geometry.validate().map_err(|e| e.within("geometry"))?;
        for (key, value) in &self.style {
            if let StyleValue::Number(v) = value {
                check_finite(&format!("style.{key}"), *v)?;
            }
        }
        if let Content::Shape(shape) = &self.content {
            shape.validate().map_err(|e| e.within("content"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_validation() {
        assert!(Geometry::new(10.0, 20.0, 300.0, 50.0).is_ok());
        let err = Geometry::new(f64::NAN, 0.0, 1.0, 1.0).unwrap_err();
        assert_eq!(err.field, "position_x");
        let err = Geometry::new(0.0, 0.0, -1.0, 1.0).unwrap_err();
        assert_eq!(err.field, "width");
        let err = Geometry::default().with_opacity(1.2).unwrap_err();
        assert_eq!(err.field, "opacity");
    }

    #[test]
    fn test_kind_follows_content() {
        assert_eq!(Element::text("Name", "Jane").kind(), ElementKind::Text);
        assert_eq!(Element::image("Logo", "https://x/logo.png").kind(), ElementKind::Image);
        let group = Element::group("Bug", vec![Element::text("Score", "0")]);
        assert_eq!(group.kind(), ElementKind::Group);
        assert_eq!(group.children().len(), 1);
    }

    #[test]
    fn test_field_validation_paths() {
        let element = Element::shape(
            "Bar",
            ShapeDescriptor {
                corner_radius: -2.0,
                ..ShapeDescriptor::rectangle("#fff")
            },
        );
        let err = element.validate_fields().unwrap_err();
        assert_eq!(err.field, "content.corner_radius");

        let element = Element::text("T", "x").with_style("font_size", f64::INFINITY);
        assert_eq!(element.validate_fields().unwrap_err().field, "style.font_size");
    }
}
