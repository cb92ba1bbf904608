// SPDX-License-Identifier: MIT OR Apache-2.0
//! Data bindings from external records to element content.

use crate::element::ElementKind;
use crate::error::{Result, ValidationError};
use crate::ids::{BindingId, ElementId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Content field of an element that a binding writes to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentField {
    /// Text of a text element
    Text,
    /// URL of an image element
    ImageUrl,
    /// A style entry of any element
    Style(String),
}

impl ContentField {
    /// Whether this field exists on elements of the given kind
    pub fn fits(&self, kind: ElementKind) -> bool {
        match self {
            Self::Text => kind == ElementKind::Text,
            Self::ImageUrl => kind == ElementKind::Image,
            Self::Style(_) => true,
        }
    }
}

impl fmt::Display for ContentField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::ImageUrl => f.write_str("image_url"),
            Self::Style(key) => write!(f, "style.{key}"),
        }
    }
}

/// Which record of a fetched record set a binding reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSelector {
    /// The record at index 0
    #[default]
    First,
    /// The record at a fixed index
    Index(usize),
    /// The record at the highest index
    Last,
}

impl RecordSelector {
    /// Index of the selected record in a set of `len` records
    pub fn select(&self, len: usize) -> Option<usize> {
        match *self {
            Self::First => (len > 0).then_some(0),
            Self::Index(index) => (index < len).then_some(index),
            Self::Last => len.checked_sub(1),
        }
    }
}

/// One step of a field path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object key
    Key(String),
    /// Array index (also matches an object key spelled as the number)
    Index(usize),
}

/// Path to a field within a record: `team.players[2].name` or `team.players.2.name`.
///
/// The empty path addresses the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Path segments in lookup order
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Whether the path addresses the whole record
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromStr for FieldPath {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let mut segments = Vec::new();
        if s.is_empty() {
            return Ok(Self { segments });
        }

        for part in s.split('.') {
            let (key, mut indices) = match part.find('[') {
                Some(open) => (&part[..open], &part[open..]),
                None => (part, ""),
            };
            if key.is_empty() && indices.is_empty() {
                return Err(ValidationError::new("path", format!("empty segment in {s:?}")));
            }
            if !key.is_empty() {
                match key.parse::<usize>() {
                    Ok(index) => segments.push(PathSegment::Index(index)),
                    Err(_) => segments.push(PathSegment::Key(key.to_string())),
                }
            }
            while !indices.is_empty() {
                let Some(close) = indices.find(']') else {
                    return Err(ValidationError::new("path", format!("unclosed index in {s:?}")));
                };
                let index = indices[1..close].trim().parse::<usize>().map_err(|_| {
                    ValidationError::new("path", format!("bad index {:?} in {s:?}", &indices[1..close]))
                })?;
                segments.push(PathSegment::Index(index));
                indices = &indices[close + 1..];
                if !indices.is_empty() && !indices.starts_with('[') {
                    return Err(ValidationError::new("path", format!("unexpected {indices:?} in {s:?}")));
                }
            }
        }

        Ok(Self { segments })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => f.write_str(key)?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl TryFrom<String> for FieldPath {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FieldPath> for String {
    fn from(value: FieldPath) -> Self {
        value.to_string()
    }
}

/// Display-format transform applied to a bound value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayFormat {
    /// Upper-case the text
    Uppercase,
    /// Lower-case the text
    Lowercase,
    /// Strip surrounding whitespace
    Trim,
    /// Format a number with a fixed number of decimals
    Fixed(u8),
    /// Substitute the value into a template containing `{value}`
    Template(String),
}

impl DisplayFormat {
    /// Placeholder replaced by [`DisplayFormat::Template`]
    pub const PLACEHOLDER: &'static str = "{value}";
}

/// Binding of an element content field to a field of an external record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    /// Unique binding ID
    pub id: BindingId,
    /// Target element
    pub element: ElementId,
    /// Target content field
    pub field: ContentField,
    /// Name of the data source
    pub source: String,
    /// Field path within the selected record
    pub path: FieldPath,
    /// Record selection policy
    pub selector: RecordSelector,
    /// Optional display-format transform
    pub format: Option<DisplayFormat>,
}

impl Binding {
    /// Create a binding reading the first record of `source`
    pub fn new(
        element: ElementId,
        field: ContentField,
        source: impl Into<String>,
        path: &str,
    ) -> Result<Self> {
        let binding = Self {
            id: BindingId::new(),
            element,
            field,
            source: source.into(),
            path: path.parse()?,
            selector: RecordSelector::First,
            format: None,
        };
        binding.validate()?;
        Ok(binding)
    }

    /// Set the record selector
    pub fn with_selector(mut self, selector: RecordSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Set the display format
    pub fn with_format(mut self, format: DisplayFormat) -> Result<Self> {
        self.format = Some(format);
        self.validate()?;
        Ok(self)
    }

    /// Check source name and format
    pub fn validate(&self) -> Result<()> {
        if self.source.trim().is_empty() {
            return Err(ValidationError::new("source", "must not be empty"));
        }
        if let Some(DisplayFormat::Template(template)) = &self.format {
            if !template.contains(DisplayFormat::PLACEHOLDER) {
                return Err(ValidationError::new(
                    "format",
                    format!("template {template:?} has no {} placeholder", DisplayFormat::PLACEHOLDER),
                ));
            }
        }
        Ok(())
    }
}
