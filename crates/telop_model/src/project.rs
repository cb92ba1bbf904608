// SPDX-License-Identifier: MIT OR Apache-2.0
//! Projects and layers.

use crate::error::{check_finite, Result, ValidationError};
use crate::ids::{LayerId, ProjectId, TemplateId};
use crate::template::Template;
use serde::{Deserialize, Serialize};

/// Current project format version
pub const PROJECT_FORMAT_VERSION: u32 = 1;

/// Named grouping of templates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Unique layer ID
    pub id: LayerId,
    /// Layer name
    pub name: String,
    /// Whether the layer is shown in the editor
    pub visible: bool,
    /// Templates owned by this layer
    pub templates: Vec<Template>,
}

impl Layer {
    /// Create an empty layer
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: LayerId::new(),
            name: name.into(),
            visible: true,
            templates: Vec::new(),
        }
    }

    /// Find a template by ID
    pub fn template(&self, id: TemplateId) -> Option<&Template> {
        self.templates.iter().find(|t| t.id() == id)
    }

    /// Find a template by name
    pub fn template_named(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name() == name)
    }

    /// Copy with a template appended
    pub fn with_template(&self, template: Template) -> Result<Self> {
        if self.template(template.id()).is_some() {
            return Err(ValidationError::new(
                "templates",
                format!("duplicate template {}", template.id()),
            ));
        }
        let mut next = self.clone();
        next.templates.push(template);
        Ok(next)
    }

    /// Copy without a template (and therefore without its elements)
    pub fn without_template(&self, id: TemplateId) -> Result<Self> {
        if self.template(id).is_none() {
            return Err(ValidationError::new("templates", format!("unknown template {id}")));
        }
        let mut next = self.clone();
        next.templates.retain(|t| t.id() != id);
        Ok(next)
    }

    /// Copy with a template replaced by one with the same ID
    pub fn with_template_replaced(&self, template: Template) -> Result<Self> {
        let mut next = self.clone();
        let Some(slot) = next.templates.iter_mut().find(|t| t.id() == template.id()) else {
            return Err(ValidationError::new(
                "templates",
                format!("unknown template {}", template.id()),
            ));
        };
        *slot = template;
        Ok(next)
    }
}

/// A broadcast graphics project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique project ID
    pub id: ProjectId,
    /// Project name
    pub name: String,
    /// Format version
    pub version: u32,
    /// Canvas width in pixels
    pub width: u32,
    /// Canvas height in pixels
    pub height: u32,
    /// Output frame rate (frames per second)
    pub frame_rate: f64,
    /// Layers, bottom to top
    pub layers: Vec<Layer>,
}

impl Project {
    /// Create a validated, empty project
    pub fn new(name: impl Into<String>, width: u32, height: u32, frame_rate: f64) -> Result<Self> {
        let project = Self {
            id: ProjectId::new(),
            name: name.into(),
            version: PROJECT_FORMAT_VERSION,
            width,
            height,
            frame_rate,
            layers: Vec::new(),
        };
        project.validate()?;
        Ok(project)
    }

    /// Check canvas and timing settings
    pub fn validate(&self) -> Result<()> {
        if self.version > PROJECT_FORMAT_VERSION {
            return Err(ValidationError::new(
                "version",
                format!(
                    "project version {} is newer than supported version {}",
                    self.version, PROJECT_FORMAT_VERSION
                ),
            ));
        }
        if self.width == 0 {
            return Err(ValidationError::new("width", "must be > 0"));
        }
        if self.height == 0 {
            return Err(ValidationError::new("height", "must be > 0"));
        }
        check_finite("frame_rate", self.frame_rate)?;
        if self.frame_rate <= 0.0 {
            return Err(ValidationError::new(
                "frame_rate",
                format!("must be > 0, got {}", self.frame_rate),
            ));
        }
        Ok(())
    }

    /// Duration of one frame in milliseconds
    pub fn frame_duration_ms(&self) -> f64 {
        1000.0 / self.frame_rate
    }

    /// Convert a time (ms) to the frame being shown at that time
    pub fn time_to_frame(&self, time_ms: f64) -> u64 {
        (time_ms.max(0.0) * self.frame_rate / 1000.0 + 1e-9).floor() as u64
    }

    /// Convert a frame number to its start time (ms)
    pub fn frame_to_time(&self, frame: u64) -> f64 {
        frame as f64 * 1000.0 / self.frame_rate
    }

    /// Round a time to the nearest frame boundary
    pub fn snap_to_frame(&self, time_ms: f64) -> f64 {
        let frames = (time_ms * self.frame_rate / 1000.0).round();
        frames * 1000.0 / self.frame_rate
    }

    /// Find a layer by ID
    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Find a template and its layer
    pub fn find_template(&self, id: TemplateId) -> Option<(&Layer, &Template)> {
        self.layers
            .iter()
            .find_map(|layer| layer.template(id).map(|template| (layer, template)))
    }

    /// Find a template by name across all layers
    pub fn find_template_named(&self, name: &str) -> Option<&Template> {
        self.layers.iter().find_map(|layer| layer.template_named(name))
    }

    /// Copy with a layer appended
    pub fn with_layer(&self, layer: Layer) -> Result<Self> {
        if self.layer(layer.id).is_some() {
            return Err(ValidationError::new("layers", format!("duplicate layer {}", layer.id)));
        }
        let mut next = self.clone();
        next.layers.push(layer);
        Ok(next)
    }

    /// Copy without a layer (and all its templates)
    pub fn without_layer(&self, id: LayerId) -> Result<Self> {
        if self.layer(id).is_none() {
            return Err(ValidationError::new("layers", format!("unknown layer {id}")));
        }
        let mut next = self.clone();
        next.layers.retain(|l| l.id != id);
        Ok(next)
    }

    /// Copy with a layer replaced by one with the same ID
    pub fn with_layer_replaced(&self, layer: Layer) -> Result<Self> {
        let mut next = self.clone();
        let Some(slot) = next.layers.iter_mut().find(|l| l.id == layer.id) else {
            return Err(ValidationError::new("layers", format!("unknown layer {}", layer.id)));
        };
        *slot = layer;
        Ok(next)
    }

    /// Copy with a template replaced wherever it lives
    pub fn with_template_replaced(&self, template: Template) -> Result<Self> {
        let Some((layer, _)) = self.find_template(template.id()) else {
            return Err(ValidationError::new(
                "templates",
                format!("unknown template {}", template.id()),
            ));
        };
        let layer = layer.with_template_replaced(template)?;
        self.with_layer_replaced(layer)
    }

    /// Serialize to RON
    pub fn to_ron(&self) -> std::result::Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    /// Deserialize from RON and validate
    pub fn from_ron(source: &str) -> std::result::Result<Self, ProjectLoadError> {
        let project: Project = ron::from_str(source)?;
        project.validate()?;
        tracing::info!(
            "Loaded project {:?} ({} layers, {}x{} @ {} fps)",
            project.name,
            project.layers.len(),
            project.width,
            project.height,
            project.frame_rate
        );
        Ok(project)
    }
}

/// Failure to load a project from RON
#[derive(Debug, thiserror::Error)]
pub enum ProjectLoadError {
    /// Malformed RON, or a template failed validation while deserializing
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Project-level invariant violated
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;

    fn sample_project() -> Project {
        let template = Template::new("Lower Third", vec![Element::text("Name", "Jane")], vec![], vec![])
            .unwrap();
        let layer = Layer::new("Graphics").with_template(template).unwrap();
        Project::new("Evening News", 1920, 1080, 50.0)
            .unwrap()
            .with_layer(layer)
            .unwrap()
    }

    #[test]
    fn test_project_validation() {
        assert_eq!(Project::new("P", 0, 1080, 25.0).unwrap_err().field, "width");
        assert_eq!(Project::new("P", 1920, 0, 25.0).unwrap_err().field, "height");
        assert_eq!(Project::new("P", 1920, 1080, 0.0).unwrap_err().field, "frame_rate");
        assert_eq!(Project::new("P", 1920, 1080, f64::NAN).unwrap_err().field, "frame_rate");
    }

    #[test]
    fn test_frame_math() {
        let project = Project::new("P", 1920, 1080, 25.0).unwrap();
        assert_eq!(project.frame_duration_ms(), 40.0);
        assert_eq!(project.time_to_frame(0.0), 0);
        assert_eq!(project.time_to_frame(39.9), 0);
        assert_eq!(project.time_to_frame(40.0), 1);
        assert_eq!(project.frame_to_time(25), 1000.0);
        assert_eq!(project.snap_to_frame(61.0), 80.0);
    }

    #[test]
    fn test_template_lookup_and_replace() {
        let project = sample_project();
        let template = project.find_template_named("Lower Third").unwrap().clone();
        let renamed = template.with_name("Lower Third (Guest)");
        let next = project.with_template_replaced(renamed).unwrap();
        assert!(next.find_template_named("Lower Third (Guest)").is_some());
        assert!(project.find_template_named("Lower Third").is_some());
    }

    #[test]
    fn test_layer_delete_removes_templates() {
        let project = sample_project();
        let layer_id = project.layers[0].id;
        let template_id = project.layers[0].templates[0].id();
        let next = project.without_layer(layer_id).unwrap();
        assert!(next.find_template(template_id).is_none());
        assert!(project.without_layer(layer_id).unwrap().layers.is_empty());
    }

    #[test]
    fn test_ron_roundtrip() {
        let project = sample_project();
        let ron = project.to_ron().unwrap();
        let loaded = Project::from_ron(&ron).unwrap();
        assert_eq!(loaded, project);

        let broken = ron.replace("frame_rate: 50.0", "frame_rate: -1.0");
        assert!(matches!(
            Project::from_ron(&broken),
            Err(ProjectLoadError::Validation(_))
        ));
    }
}
