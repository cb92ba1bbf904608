// SPDX-License-Identifier: MIT OR Apache-2.0
//! Binding resolution: external records to element content.
//!
//! Records arrive already fetched as [`RecordSet`]s. Resolution never fails as
//! a whole; a binding that cannot be satisfied yields a [`BindingMissError`]
//! and the element keeps whatever content it had before.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use telop_model::{
    Binding, BindingId, ContentField, DisplayFormat, ElementId, FieldPath, PathSegment, StyleValue,
};
use thiserror::Error;

/// The latest fetch of one data source
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordSet {
    /// When the records were fetched (host clock, ms)
    pub fetched_at_ms: f64,
    /// Records in source order
    pub records: Vec<Value>,
}

impl RecordSet {
    /// Create a record set
    pub fn new(fetched_at_ms: f64, records: Vec<Value>) -> Self {
        Self {
            fetched_at_ms,
            records,
        }
    }

    /// Build from a JSON document: an array is a list of records, anything
    /// else is a single record
    pub fn from_json(fetched_at_ms: f64, document: Value) -> Self {
        let records = match document {
            Value::Array(records) => records,
            record => vec![record],
        };
        Self::new(fetched_at_ms, records)
    }
}

/// Latest record set per data source name
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataSources {
    sources: IndexMap<String, RecordSet>,
}

impl DataSources {
    /// Create an empty set of sources
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the records of a source
    pub fn insert(&mut self, source: impl Into<String>, records: RecordSet) {
        self.sources.insert(source.into(), records);
    }

    /// Builder form of [`DataSources::insert`]
    pub fn with(mut self, source: impl Into<String>, records: RecordSet) -> Self {
        self.insert(source, records);
        self
    }

    /// Records of a source
    pub fn get(&self, source: &str) -> Option<&RecordSet> {
        self.sources.get(source)
    }

    /// Source names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }
}

/// Bound content values keyed by element and field.
///
/// The evaluator prefers these over authored content.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentOverlay {
    entries: IndexMap<ElementId, IndexMap<ContentField, String>>,
}

impl ContentOverlay {
    /// Create an empty overlay
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound value of a field
    pub fn get(&self, element: ElementId, field: &ContentField) -> Option<&str> {
        self.entries
            .get(&element)
            .and_then(|fields| fields.get(field))
            .map(String::as_str)
    }

    /// Set a bound value
    pub fn insert(&mut self, element: ElementId, field: ContentField, value: impl Into<String>) {
        self.entries
            .entry(element)
            .or_default()
            .insert(field, value.into());
    }

    /// Bound style entries of an element.
    ///
    /// Values that parse as finite numbers become [`StyleValue::Number`] so
    /// they keep interpolating.
    pub fn styles_for(&self, element: ElementId) -> impl Iterator<Item = (&str, StyleValue)> {
        self.entries
            .get(&element)
            .into_iter()
            .flat_map(|fields| fields.iter())
            .filter_map(|(field, value)| match field {
                ContentField::Style(key) => Some((key.as_str(), style_value(value))),
                _ => None,
            })
    }

    /// Number of bound values
    pub fn len(&self) -> usize {
        self.entries.values().map(IndexMap::len).sum()
    }

    /// Whether nothing is bound
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn style_value(value: &str) -> StyleValue {
    match value.trim().parse::<f64>() {
        Ok(number) if number.is_finite() => StyleValue::Number(number),
        _ => StyleValue::Text(value.to_string()),
    }
}

/// A binding could not be satisfied from the current records
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("binding {binding} ({source_name}:{path}) missed: {reason}")]
pub struct BindingMissError {
    /// The binding
    pub binding: BindingId,
    /// Target element
    pub element: ElementId,
    /// Data source name
    pub source_name: String,
    /// Field path within the record
    pub path: String,
    /// What was missing
    pub reason: String,
}

/// Result of resolving a set of bindings
#[derive(Debug, Clone, Default)]
pub struct BindingResolution {
    /// Previous overlay with every satisfied binding applied
    pub overlay: ContentOverlay,
    /// Bindings that kept their previous value
    pub misses: Vec<BindingMissError>,
}

/// Resolve bindings against the latest records.
///
/// Starts from `previous` so missed bindings keep their last value.
pub fn resolve_bindings(
    bindings: &[Binding],
    sources: &DataSources,
    previous: &ContentOverlay,
) -> BindingResolution {
    let mut overlay = previous.clone();
    let mut misses = Vec::new();

    for binding in bindings {
        match resolve_one(binding, sources) {
            Ok(value) => overlay.insert(binding.element, binding.field.clone(), value),
            Err(reason) => {
                let miss = BindingMissError {
                    binding: binding.id,
                    element: binding.element,
                    source_name: binding.source.clone(),
                    path: binding.path.to_string(),
                    reason,
                };
                tracing::warn!("{}", miss);
                misses.push(miss);
            }
        }
    }

    tracing::debug!(
        "Resolved {} bindings ({} missed)",
        bindings.len(),
        misses.len()
    );
    BindingResolution { overlay, misses }
}

fn resolve_one(binding: &Binding, sources: &DataSources) -> Result<String, String> {
    let Some(set) = sources.get(&binding.source) else {
        return Err("no records for source".to_string());
    };
    let Some(index) = binding.selector.select(set.records.len()) else {
        return Err(format!(
            "{:?} selects nothing from {} records",
            binding.selector,
            set.records.len()
        ));
    };
    let record = &set.records[index];
    let Some(value) = lookup(record, &binding.path) else {
        return Err(format!("path not found in record {index}"));
    };
    match &binding.format {
        Some(format) => apply_format(value, format),
        None => Ok(render(value)),
    }
}

/// Follow a field path into a record
pub fn lookup<'a>(record: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(record, |value, segment| match (segment, value) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key),
            (PathSegment::Index(index), Value::Array(items)) => items.get(*index),
            (PathSegment::Index(index), Value::Object(map)) => map.get(&index.to_string()),
            _ => None,
        })
}

/// Render a JSON value as display text
pub fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn apply_format(value: &Value, format: &DisplayFormat) -> Result<String, String> {
    Ok(match format {
        DisplayFormat::Uppercase => render(value).to_uppercase(),
        DisplayFormat::Lowercase => render(value).to_lowercase(),
        DisplayFormat::Trim => render(value).trim().to_string(),
        DisplayFormat::Fixed(decimals) => {
            let number = match value {
                Value::Number(number) => number.as_f64(),
                Value::String(text) => text.trim().parse::<f64>().ok(),
                _ => None,
            };
            let Some(number) = number.filter(|n| n.is_finite()) else {
                return Err(format!("{} is not a number", render(value)));
            };
            format!("{:.*}", usize::from(*decimals), number)
        }
        DisplayFormat::Template(template) => {
            template.replace(DisplayFormat::PLACEHOLDER, &render(value))
        }
    })
}
