// SPDX-License-Identifier: MIT OR Apache-2.0
//! Templates: reusable compositions of elements, animations and bindings.
//!
//! A [`Template`] is validated on construction and never mutated in place.
//! Every operation returns a new template; callers keep the previous value for
//! history snapshots or concurrent evaluation.

use crate::animation::{Animation, Phase};
use crate::binding::Binding;
use crate::element::{Element, Geometry};
use crate::error::{Result, ValidationError};
use crate::ids::{AnimationId, BindingId, ElementId, InstanceId, TemplateId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Maximum nesting depth of group elements
pub const MAX_GROUP_DEPTH: usize = 16;

/// Raw template record as stored by persistence.
///
/// Converting into a [`Template`] runs the full validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateData {
    /// Unique template ID
    pub id: TemplateId,
    /// Template name
    pub name: String,
    /// Root elements in paint order
    pub elements: Vec<Element>,
    /// Animations
    pub animations: Vec<Animation>,
    /// Bindings
    pub bindings: Vec<Binding>,
}

/// A validated composition of elements, animations and bindings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TemplateData", into = "TemplateData")]
pub struct Template {
    id: TemplateId,
    name: String,
    elements: Vec<Element>,
    animations: Vec<Animation>,
    bindings: Vec<Binding>,
}

/// An element visited by [`Template::walk`]
#[derive(Debug, Clone, Copy)]
pub struct ElementEntry<'a> {
    /// The element
    pub element: &'a Element,
    /// Enclosing group, if any
    pub parent: Option<ElementId>,
    /// Nesting depth (0 for root elements)
    pub depth: usize,
}

/// A played-out copy of a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateInstance {
    /// Unique instance ID
    pub id: InstanceId,
    /// Template this instance was copied from
    pub source: TemplateId,
    /// The copied template
    pub template: Template,
}

impl Template {
    /// Create a validated template
    pub fn new(
        name: impl Into<String>,
        elements: Vec<Element>,
        animations: Vec<Animation>,
        bindings: Vec<Binding>,
    ) -> Result<Self> {
        Self::try_from(TemplateData {
            id: TemplateId::new(),
            name: name.into(),
            elements,
            animations,
            bindings,
        })
    }

    /// Create an empty template
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            id: TemplateId::new(),
            name: name.into(),
            elements: Vec::new(),
            animations: Vec::new(),
            bindings: Vec::new(),
        }
    }

    /// Template ID
    pub fn id(&self) -> TemplateId {
        self.id
    }

    /// Template name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root elements in paint order
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// All animations
    pub fn animations(&self) -> &[Animation] {
        &self.animations
    }

    /// All bindings
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Visit every element depth-first in paint order
    pub fn walk(&self) -> Vec<ElementEntry<'_>> {
        fn visit<'a>(
            elements: &'a [Element],
            parent: Option<ElementId>,
            depth: usize,
            out: &mut Vec<ElementEntry<'a>>,
        ) {
            for element in elements {
                out.push(ElementEntry {
                    element,
                    parent,
                    depth,
                });
                visit(element.children(), Some(element.id), depth + 1, out);
            }
        }

        let mut out = Vec::new();
        visit(&self.elements, None, 0, &mut out);
        out
    }

    /// Find an element anywhere in the tree
    pub fn element(&self, id: ElementId) -> Option<&Element> {
        find(&self.elements, id)
    }

    /// Whether the tree contains an element
    pub fn contains(&self, id: ElementId) -> bool {
        self.element(id).is_some()
    }

    /// Find an animation by ID
    pub fn animation(&self, id: AnimationId) -> Option<&Animation> {
        self.animations.iter().find(|a| a.id == id)
    }

    /// The animation of an element for a phase
    pub fn animation_for(&self, element: ElementId, phase: Phase) -> Option<&Animation> {
        self.animations
            .iter()
            .find(|a| a.element == element && a.phase == phase)
    }

    /// Find a binding by ID
    pub fn binding(&self, id: BindingId) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.id == id)
    }

    /// Bindings targeting an element
    pub fn bindings_for(&self, element: ElementId) -> impl Iterator<Item = &Binding> {
        self.bindings.iter().filter(move |b| b.element == element)
    }

    /// Copy with a new name
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Copy with an element appended to the root list or to a group
    pub fn with_element(&self, element: Element, parent: Option<ElementId>) -> Result<Self> {
        let mut next = self.clone();
        match parent {
            None => next.elements.push(element),
            Some(parent) => {
                let Some(group) = find_mut(&mut next.elements, parent) else {
                    return Err(unknown_element("parent", parent));
                };
                let Some(children) = group.children_mut() else {
                    return Err(ValidationError::new(
                        "parent",
                        format!("element {parent} is not a group"),
                    ));
                };
                children.push(element);
            }
        }
        next.validate()?;
        Ok(next)
    }

    /// Copy without an element and its subtree.
    ///
    /// Animations and bindings targeting any removed element are removed too.
    pub fn without_element(&self, id: ElementId) -> Result<Self> {
        let mut next = self.clone();
        let Some(removed) = remove_from(&mut next.elements, id) else {
            return Err(unknown_element("element", id));
        };

        let mut removed_ids = HashSet::new();
        collect_ids(&removed, &mut removed_ids);
        let animations_before = next.animations.len();
        let bindings_before = next.bindings.len();
        next.animations.retain(|a| !removed_ids.contains(&a.element));
        next.bindings.retain(|b| !removed_ids.contains(&b.element));

        tracing::debug!(
            "Removed element {} ({} elements, {} animations, {} bindings)",
            id,
            removed_ids.len(),
            animations_before - next.animations.len(),
            bindings_before - next.bindings.len()
        );
        Ok(next)
    }

    /// Copy with an element replaced by one with the same ID
    pub fn with_element_replaced(&self, element: Element) -> Result<Self> {
        let mut next = self.clone();
        let Some(slot) = find_mut(&mut next.elements, element.id) else {
            return Err(unknown_element("element", element.id));
        };
        *slot = element;
        next.validate()?;
        Ok(next)
    }

    /// Copy with new resting geometry for an element
    pub fn with_geometry(&self, id: ElementId, geometry: Geometry) -> Result<Self> {
        geometry.validate().map_err(|e| e.within("geometry"))?;
        let mut next = self.clone();
        let Some(element) = find_mut(&mut next.elements, id) else {
            return Err(unknown_element("element", id));
        };
        element.geometry = geometry;
        Ok(next)
    }

    /// Copy with an element moved to another paint position among its siblings
    pub fn with_z_index(&self, id: ElementId, index: usize) -> Result<Self> {
        let mut next = self.clone();
        let Some(siblings) = siblings_mut(&mut next.elements, id) else {
            return Err(unknown_element("element", id));
        };
        let Some(current) = siblings.iter().position(|e| e.id == id) else {
            return Err(unknown_element("element", id));
        };
        let element = siblings.remove(current);
        let index = index.min(siblings.len());
        siblings.insert(index, element);
        Ok(next)
    }

    /// Copy with an animation added.
    ///
    /// Duration and keyframes are checked here even when the animation was
    /// assembled field by field.
    pub fn with_animation(&self, animation: Animation) -> Result<Self> {
        let index = self.animations.len();
        animation
            .check()
            .map_err(|e| e.within(format!("animations[{index}]")))?;
        let mut next = self.clone();
        next.animations.push(animation);
        next.validate()?;
        Ok(next)
    }

    /// Copy without an animation
    pub fn without_animation(&self, id: AnimationId) -> Result<Self> {
        if self.animation(id).is_none() {
            return Err(ValidationError::new("animation", format!("unknown animation {id}")));
        }
        let mut next = self.clone();
        next.animations.retain(|a| a.id != id);
        Ok(next)
    }

    /// Copy with a binding added
    pub fn with_binding(&self, binding: Binding) -> Result<Self> {
        let mut next = self.clone();
        next.bindings.push(binding);
        next.validate()?;
        Ok(next)
    }

    /// Copy without a binding
    pub fn without_binding(&self, id: BindingId) -> Result<Self> {
        if self.binding(id).is_none() {
            return Err(ValidationError::new("binding", format!("unknown binding {id}")));
        }
        let mut next = self.clone();
        next.bindings.retain(|b| b.id != id);
        Ok(next)
    }

    /// Copy this template for playout.
    ///
    /// The instance owns its own value; later edits to either side never reach
    /// the other.
    pub fn instantiate(&self) -> TemplateInstance {
        TemplateInstance {
            id: InstanceId::new(),
            source: self.id,
            template: self.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let mut ancestors = Vec::new();
        validate_tree(&self.elements, "elements", 0, &mut ancestors, &mut seen)?;

        let mut animation_ids = HashSet::new();
        let mut phases = HashSet::new();
        for (index, animation) in self.animations.iter().enumerate() {
            let field = format!("animations[{index}]");
            if !animation_ids.insert(animation.id) {
                return Err(ValidationError::new(
                    format!("{field}.id"),
                    format!("duplicate animation {}", animation.id),
                ));
            }
            if !seen.contains(&animation.element) {
                return Err(unknown_element(&format!("{field}.element"), animation.element));
            }
            if !phases.insert((animation.element, animation.phase)) {
                return Err(ValidationError::new(
                    format!("{field}.phase"),
                    format!(
                        "element {} already has an {} animation",
                        animation.element, animation.phase
                    ),
                ));
            }
        }

        let mut binding_ids = HashSet::new();
        for (index, binding) in self.bindings.iter().enumerate() {
            let field = format!("bindings[{index}]");
            if !binding_ids.insert(binding.id) {
                return Err(ValidationError::new(
                    format!("{field}.id"),
                    format!("duplicate binding {}", binding.id),
                ));
            }
            binding.validate().map_err(|e| e.within(&field))?;
            let Some(element) = self.element(binding.element) else {
                return Err(unknown_element(&format!("{field}.element"), binding.element));
            };
            if !binding.field.fits(element.kind()) {
                return Err(ValidationError::new(
                    format!("{field}.field"),
                    format!(
                        "{} elements have no {} field",
                        element.kind().name(),
                        binding.field
                    ),
                ));
            }
        }

        Ok(())
    }
}

impl TryFrom<TemplateData> for Template {
    type Error = ValidationError;

    fn try_from(data: TemplateData) -> Result<Self> {
        let template = Self {
            id: data.id,
            name: data.name,
            elements: data.elements,
            animations: data.animations,
            bindings: data.bindings,
        };
        template.validate()?;
        Ok(template)
    }
}

impl From<Template> for TemplateData {
    fn from(template: Template) -> Self {
        Self {
            id: template.id,
            name: template.name,
            elements: template.elements,
            animations: template.animations,
            bindings: template.bindings,
        }
    }
}

fn unknown_element(field: &str, id: ElementId) -> ValidationError {
    ValidationError::new(field, format!("unknown element {id}"))
}

/// Check fields, id uniqueness, acyclic containment and depth
fn validate_tree(
    elements: &[Element],
    path: &str,
    depth: usize,
    ancestors: &mut Vec<ElementId>,
    seen: &mut HashSet<ElementId>,
) -> Result<()> {
    for (index, element) in elements.iter().enumerate() {
        let field = format!("{path}[{index}]");
        if ancestors.contains(&element.id) {
            return Err(ValidationError::new(
                format!("{field}.id"),
                format!("element {} contains itself", element.id),
            ));
        }
        if !seen.insert(element.id) {
            return Err(ValidationError::new(
                format!("{field}.id"),
                format!("duplicate element {}", element.id),
            ));
        }
        element.validate_fields().map_err(|e| e.within(&field))?;

        let children = element.children();
        if children.is_empty() {
            continue;
        }
        if depth + 1 >= MAX_GROUP_DEPTH {
            return Err(ValidationError::new(
                format!("{field}.children"),
                format!("groups nest deeper than {MAX_GROUP_DEPTH} levels"),
            ));
        }
        ancestors.push(element.id);
        validate_tree(
            children,
            &format!("{field}.children"),
            depth + 1,
            ancestors,
            seen,
        )?;
        ancestors.pop();
    }
    Ok(())
}

fn find(elements: &[Element], id: ElementId) -> Option<&Element> {
    for element in elements {
        if element.id == id {
            return Some(element);
        }
        if let Some(found) = find(element.children(), id) {
            return Some(found);
        }
    }
    None
}

fn find_mut(elements: &mut [Element], id: ElementId) -> Option<&mut Element> {
    for element in elements.iter_mut() {
        if element.id == id {
            return Some(element);
        }
        if let Some(children) = element.children_mut() {
            if let Some(found) = find_mut(children, id) {
                return Some(found);
            }
        }
    }
    None
}

fn siblings_mut(elements: &mut Vec<Element>, id: ElementId) -> Option<&mut Vec<Element>> {
    if elements.iter().any(|e| e.id == id) {
        return Some(elements);
    }
    for element in elements.iter_mut() {
        if let Some(children) = element.children_mut() {
            if let Some(found) = siblings_mut(children, id) {
                return Some(found);
            }
        }
    }
    None
}

fn remove_from(elements: &mut Vec<Element>, id: ElementId) -> Option<Element> {
    if let Some(index) = elements.iter().position(|e| e.id == id) {
        return Some(elements.remove(index));
    }
    for element in elements.iter_mut() {
        if let Some(children) = element.children_mut() {
            if let Some(removed) = remove_from(children, id) {
                return Some(removed);
            }
        }
    }
    None
}

fn collect_ids(element: &Element, out: &mut HashSet<ElementId>) {
    out.insert(element.id);
    for child in element.children() {
        collect_ids(child, out);
    }
}
