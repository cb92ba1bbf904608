// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor state management.
//!
//! This module contains the core editor state: the project being edited,
//! the selection, undo/redo history and the active drag gesture.

use crate::commands::CommandError;
use crate::history::History;
use crate::settings::EditorSettings;
use crate::tools::{drag_targets, DragTarget, TransformController};
use serde::{Deserialize, Serialize};
use telop_model::{
    Animation, AnimationId, Binding, BindingId, Element, ElementId, Geometry, Project, Template,
    TemplateId,
};

/// Selection mode for multi-select operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectMode {
    /// Replace current selection
    #[default]
    Set,
    /// Add to current selection (Shift+Click)
    Add,
    /// Remove from current selection (Ctrl+Click)
    Remove,
    /// Toggle in current selection (Ctrl+Shift+Click)
    Toggle,
}

/// Element selection state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Currently selected elements, in selection order
    pub elements: Vec<ElementId>,
}

impl Selection {
    /// Create a new empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a selection with the given elements, ignoring repeats
    pub fn with_elements(elements: impl Into<Vec<ElementId>>) -> Self {
        let mut selection = Self::new();
        selection.apply(&elements.into(), SelectMode::Set);
        selection
    }

    /// Check if an element is selected
    pub fn contains(&self, id: &ElementId) -> bool {
        self.elements.contains(id)
    }

    /// Apply a selection change. Elements keep the order they were first
    /// selected in; repeats are ignored.
    pub fn apply(&mut self, elements: &[ElementId], mode: SelectMode) {
        if mode == SelectMode::Set {
            self.elements.clear();
        }
        for &id in elements {
            match (mode, self.elements.iter().position(|e| *e == id)) {
                (SelectMode::Set | SelectMode::Add | SelectMode::Toggle, None) => {
                    self.elements.push(id);
                }
                (SelectMode::Remove | SelectMode::Toggle, Some(index)) => {
                    self.elements.remove(index);
                }
                _ => {}
            }
        }
    }

    /// Drop elements the template no longer contains
    pub fn retain_existing(&mut self, template: &Template) {
        self.elements.retain(|id| template.contains(*id));
    }

    /// Deselect everything
    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Whether nothing is selected
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Number of selected elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Most recently selected element; drags snap relative to it
    pub fn primary(&self) -> Option<ElementId> {
        self.elements.last().copied()
    }

    /// Selected elements in selection order
    pub fn iter(&self) -> std::slice::Iter<'_, ElementId> {
        self.elements.iter()
    }
}

/// Main editor state
#[derive(Debug)]
pub struct EditorState {
    /// Project being edited
    pub project: Project,
    /// Template open in the canvas
    pub active_template: TemplateId,
    /// Current selection
    pub selection: Selection,
    /// Undo/redo history of project snapshots
    pub history: History,
    /// Pointer-drag controller
    pub transform: TransformController,
    /// Editor settings
    pub settings: EditorSettings,
    /// Whether the project has unsaved changes
    pub dirty: bool,
    /// Project as it was when the current drag began
    drag_origin: Option<Project>,
}

impl EditorState {
    /// Open a template of a project for editing
    pub fn new(
        project: Project,
        template: TemplateId,
        settings: EditorSettings,
    ) -> Result<Self, CommandError> {
        if project.find_template(template).is_none() {
            return Err(CommandError::TemplateNotFound(template));
        }
        let snap = settings.snap_enabled.then_some(settings.snap_size);
        Ok(Self {
            history: History::with_limits(settings.history_depth, settings.coalesce_window()),
            transform: TransformController::new(settings.drag_threshold_px, snap),
            project,
            active_template: template,
            selection: Selection::new(),
            settings,
            dirty: false,
            drag_origin: None,
        })
    }

    /// The template being edited
    pub fn template(&self) -> Result<&Template, CommandError> {
        self.project
            .find_template(self.active_template)
            .map(|(_, template)| template)
            .ok_or(CommandError::TemplateNotFound(self.active_template))
    }

    /// Change the selection
    pub fn select(&mut self, elements: &[ElementId], mode: SelectMode) {
        self.selection.apply(elements, mode);
    }

    /// Build the next template and record the current project in history.
    ///
    /// An unfinished drag is cancelled first, so the edit applies to the
    /// committed project rather than the drag preview. Nothing is recorded
    /// when `edit` fails.
    fn mutate(
        &mut self,
        label: &str,
        coalesce: bool,
        edit: impl FnOnce(&Template) -> telop_model::Result<Template>,
    ) -> Result<(), CommandError> {
        self.cancel_drag();
        let next = edit(self.template()?)?;
        let project = self.project.with_template_replaced(next)?;
        if coalesce {
            self.history.push(label, &self.project)?;
        } else {
            self.history.commit(label, &self.project)?;
        }
        self.project = project;
        self.dirty = true;
        Ok(())
    }

    /// Insert an element at the root or inside a group and select it
    pub fn add_element(
        &mut self,
        element: Element,
        parent: Option<ElementId>,
    ) -> Result<ElementId, CommandError> {
        let id = element.id;
        self.mutate("Add Element", false, |t| t.with_element(element, parent))?;
        self.selection.apply(&[id], SelectMode::Set);
        Ok(id)
    }

    /// Delete the selected elements with their descendants, animations and
    /// bindings. Returns the number of deleted roots.
    pub fn delete_selected(&mut self) -> Result<usize, CommandError> {
        if self.selection.is_empty() {
            return Ok(0);
        }
        let selected = self.selection.elements.clone();
        let mut deleted = 0;
        self.mutate("Delete", false, |template| {
            let mut next = template.clone();
            for id in selected {
                // Already gone when an ancestor was deleted first.
                if next.contains(id) {
                    next = next.without_element(id)?;
                    deleted += 1;
                }
            }
            Ok(next)
        })?;
        tracing::info!("Deleted {} elements", deleted);
        self.selection.clear();
        Ok(deleted)
    }

    /// Replace an element's resting geometry
    pub fn set_geometry(&mut self, id: ElementId, geometry: Geometry) -> Result<(), CommandError> {
        self.mutate("Set Geometry", true, |t| t.with_geometry(id, geometry))
    }

    /// Move the selection by whole nudge steps. Returns whether anything moved.
    pub fn nudge_selected(&mut self, steps_x: f64, steps_y: f64) -> Result<bool, CommandError> {
        self.cancel_drag();
        let targets = drag_targets(self.template()?, &self.selection);
        if targets.is_empty() {
            return Ok(false);
        }
        let step = self.settings.nudge_step_px;
        let delta = [steps_x * step, steps_y * step];
        self.mutate("Nudge", true, |template| move_targets(template, &targets, delta))?;
        Ok(true)
    }

    /// Attach an animation
    pub fn add_animation(&mut self, animation: Animation) -> Result<(), CommandError> {
        self.mutate("Add Animation", false, |t| t.with_animation(animation))
    }

    /// Remove an animation
    pub fn remove_animation(&mut self, id: AnimationId) -> Result<(), CommandError> {
        self.mutate("Remove Animation", false, |t| t.without_animation(id))
    }

    /// Attach a data binding
    pub fn add_binding(&mut self, binding: Binding) -> Result<(), CommandError> {
        self.mutate("Add Binding", false, |t| t.with_binding(binding))
    }

    /// Remove a data binding
    pub fn remove_binding(&mut self, id: BindingId) -> Result<(), CommandError> {
        self.mutate("Remove Binding", false, |t| t.without_binding(id))
    }

    /// Undo the last edit. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> Result<bool, CommandError> {
        self.cancel_drag();
        let Some(project) = self.history.undo(&self.project)? else {
            return Ok(false);
        };
        self.restore(project);
        Ok(true)
    }

    /// Redo the last undone edit. Returns `false` when there is nothing to redo.
    pub fn redo(&mut self) -> Result<bool, CommandError> {
        self.cancel_drag();
        let Some(project) = self.history.redo(&self.project)? else {
            return Ok(false);
        };
        self.restore(project);
        Ok(true)
    }

    fn restore(&mut self, project: Project) {
        self.project = project;
        self.dirty = true;
        match self.project.find_template(self.active_template) {
            Some((_, template)) => self.selection.retain_existing(template),
            None => self.selection.clear(),
        }
    }

    /// Press the pointer. Returns whether a drag of the selection began.
    pub fn pointer_down(&mut self, pointer: [f64; 2]) -> Result<bool, CommandError> {
        self.cancel_drag();
        let targets = drag_targets(self.template()?, &self.selection);
        if targets.is_empty() {
            return Ok(false);
        }
        self.transform.begin(pointer, targets);
        self.drag_origin = Some(self.project.clone());
        Ok(true)
    }

    /// Move the pointer; previews the drag without recording history
    pub fn pointer_move(&mut self, pointer: [f64; 2]) -> Result<(), CommandError> {
        let Some(delta) = self.transform.update(pointer) else {
            return Ok(());
        };
        self.preview_drag(delta)
    }

    /// Release the pointer; a completed drag becomes one history entry.
    /// Returns whether anything moved.
    pub fn pointer_up(&mut self, pointer: [f64; 2]) -> Result<bool, CommandError> {
        let Some(origin) = self.drag_origin.take() else {
            self.transform.cancel();
            return Ok(false);
        };
        let Some(outcome) = self.transform.end(pointer) else {
            self.project = origin;
            return Ok(false);
        };
        let template = origin
            .find_template(self.active_template)
            .map(|(_, template)| template)
            .ok_or(CommandError::TemplateNotFound(self.active_template))?;
        let next = move_targets(template, &outcome.targets, outcome.delta)?;
        self.project = origin.with_template_replaced(next)?;
        self.history.commit("Move", &origin)?;
        self.dirty = true;
        tracing::debug!(
            "Moved {} elements by ({}, {})",
            outcome.targets.len(),
            outcome.delta[0],
            outcome.delta[1]
        );
        Ok(true)
    }

    /// Abort a drag and restore the original positions.
    /// Returns whether a drag was active.
    pub fn cancel_drag(&mut self) -> bool {
        self.transform.cancel();
        match self.drag_origin.take() {
            Some(origin) => {
                self.project = origin;
                true
            }
            None => false,
        }
    }

    fn preview_drag(&mut self, delta: [f64; 2]) -> Result<(), CommandError> {
        let (Some(origin), Some(gesture)) = (&self.drag_origin, self.transform.gesture()) else {
            return Ok(());
        };
        let template = origin
            .find_template(self.active_template)
            .map(|(_, template)| template)
            .ok_or(CommandError::TemplateNotFound(self.active_template))?;
        let next = move_targets(template, &gesture.targets, delta)?;
        self.project = origin.with_template_replaced(next)?;
        Ok(())
    }
}

/// Template with every target moved from its origin by `delta`
fn move_targets(
    template: &Template,
    targets: &[DragTarget],
    delta: [f64; 2],
) -> telop_model::Result<Template> {
    let mut next = template.clone();
    for target in targets {
        let Some(element) = next.element(target.element) else {
            continue;
        };
        let [x, y] = target.moved(delta);
        let geometry = element.geometry.moved_to(x, y)?;
        next = next.with_geometry(target.element, geometry)?;
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use telop_model::{ContentField, Easing, Keyframe, Layer, Phase};

    fn position(state: &EditorState, id: ElementId) -> (f64, f64) {
        let geometry = state.template().unwrap().element(id).unwrap().geometry;
        (geometry.position_x, geometry.position_y)
    }

    fn editor() -> (EditorState, ElementId, ElementId) {
        let a = Element::text("A", "Home").with_geometry(Geometry::new(10.0, 10.0, 50.0, 20.0).unwrap());
        let b = Element::text("B", "Away").with_geometry(Geometry::new(20.0, 10.0, 50.0, 20.0).unwrap());
        let (a_id, b_id) = (a.id, b.id);
        let template = Template::new("Score", vec![a, b], vec![], vec![]).unwrap();
        let template_id = template.id();
        let project = Project::new("Match", 1920, 1080, 50.0)
            .unwrap()
            .with_layer(Layer::new("Main").with_template(template).unwrap())
            .unwrap();
        let state = EditorState::new(project, template_id, EditorSettings::default()).unwrap();
        (state, a_id, b_id)
    }

    #[test]
    fn test_selection_modes() {
        let (a, b, c) = (ElementId::new(), ElementId::new(), ElementId::new());
        let mut selection = Selection::new();
        selection.apply(&[a, b], SelectMode::Set);
        selection.apply(&[c], SelectMode::Add);
        selection.apply(&[a], SelectMode::Remove);
        assert_eq!(selection.elements, vec![b, c]);
        selection.apply(&[b, a], SelectMode::Toggle);
        assert_eq!(selection.elements, vec![c, a]);
        assert_eq!(selection.primary(), Some(a));
        selection.apply(&[b], SelectMode::Set);
        assert_eq!(selection.len(), 1);
    }

    #[test]
    fn test_group_drag_commits_one_entry() {
        let (mut state, a, b) = editor();
        state.select(&[a, b], SelectMode::Set);
        assert!(state.pointer_down([100.0, 100.0]).unwrap());
        state.pointer_move([102.0, 103.0]).unwrap();
        state.pointer_move([105.0, 105.0]).unwrap();
        assert_eq!(position(&state, a), (15.0, 15.0));
        assert_eq!(state.history.undo_depth(), 0);

        assert!(state.pointer_up([105.0, 105.0]).unwrap());
        assert_eq!(position(&state, a), (15.0, 15.0));
        assert_eq!(position(&state, b), (25.0, 15.0));
        assert_eq!(state.history.undo_depth(), 1);
        assert_eq!(state.history.undo_description(), Some("Move"));

        assert!(state.undo().unwrap());
        assert_eq!(position(&state, a), (10.0, 10.0));
        assert_eq!(position(&state, b), (20.0, 10.0));
    }

    #[test]
    fn test_sub_threshold_drag_commits_nothing() {
        let (mut state, a, _) = editor();
        state.select(&[a], SelectMode::Set);
        state.pointer_down([0.0, 0.0]).unwrap();
        state.pointer_move([1.0, 1.0]).unwrap();
        assert!(!state.pointer_up([1.0, 1.0]).unwrap());
        assert_eq!(position(&state, a), (10.0, 10.0));
        assert!(!state.history.can_undo());
    }

    #[test]
    fn test_cancel_restores_positions() {
        let (mut state, a, _) = editor();
        state.select(&[a], SelectMode::Set);
        state.pointer_down([0.0, 0.0]).unwrap();
        state.pointer_move([40.0, 0.0]).unwrap();
        assert_eq!(position(&state, a), (50.0, 10.0));
        assert!(state.cancel_drag());
        assert_eq!(position(&state, a), (10.0, 10.0));
        assert!(!state.pointer_up([40.0, 0.0]).unwrap());
        assert!(!state.history.can_undo());
    }

    #[test]
    fn test_delete_cascades_and_undo_prunes_selection() {
        let (mut state, a, b) = editor();
        let animation = Animation::new(
            a,
            Phase::In,
            300.0,
            Easing::EaseOut,
            vec![Keyframe::at(0.0).with_opacity(0.0), Keyframe::at(100.0).with_opacity(1.0)],
        )
        .unwrap();
        state.add_animation(animation).unwrap();
        state
            .add_binding(Binding::new(a, ContentField::Text, "teams", "home").unwrap())
            .unwrap();

        state.select(&[a], SelectMode::Set);
        assert_eq!(state.delete_selected().unwrap(), 1);
        let template = state.template().unwrap();
        assert!(!template.contains(a));
        assert!(template.animations().is_empty());
        assert!(template.bindings().is_empty());

        assert!(state.undo().unwrap());
        assert!(state.template().unwrap().contains(a));
        assert_eq!(state.template().unwrap().animations().len(), 1);
        assert_eq!(state.template().unwrap().bindings().len(), 1);

        // Undo the binding and animation, then redo back to the deletion.
        state.undo().unwrap();
        state.undo().unwrap();
        state.select(&[a, b], SelectMode::Set);
        state.redo().unwrap();
        state.redo().unwrap();
        state.redo().unwrap();
        assert_eq!(state.selection.elements, vec![b]);
        assert!(!state.redo().unwrap());
    }

    #[test]
    fn test_nudges_coalesce() {
        let (mut state, a, b) = editor();
        state.settings.nudge_step_px = 10.0;
        state.select(&[a, b], SelectMode::Set);
        for _ in 0..3 {
            assert!(state.nudge_selected(1.0, 0.0).unwrap());
        }
        assert_eq!(position(&state, a), (40.0, 10.0));
        assert_eq!(position(&state, b), (50.0, 10.0));
        assert_eq!(state.history.undo_depth(), 1);

        state.undo().unwrap();
        assert_eq!(position(&state, a), (10.0, 10.0));
    }

    #[test]
    fn test_undo_redo_reproduces_project() {
        let (mut state, a, _) = editor();
        let original = state.project.clone();
        state.set_geometry(a, Geometry::new(1.0, 2.0, 3.0, 4.0).unwrap()).unwrap();
        state.add_element(Element::text("C", "Extra"), None).unwrap();
        state.remove_animation(AnimationId::new()).unwrap_err();
        let edited = state.project.clone();
        assert_eq!(state.history.undo_depth(), 2);

        while state.undo().unwrap() {}
        assert_eq!(state.project, original);
        while state.redo().unwrap() {}
        assert_eq!(state.project, edited);
    }

    #[test]
    fn test_delete_during_drag_applies_to_committed_project() {
        let (mut state, a, b) = editor();
        state.select(&[a], SelectMode::Set);
        state.pointer_down([0.0, 0.0]).unwrap();
        state.pointer_move([40.0, 0.0]).unwrap();
        assert_eq!(position(&state, a), (50.0, 10.0));

        state.select(&[b], SelectMode::Add);
        assert_eq!(state.delete_selected().unwrap(), 2);
        assert!(!state.pointer_up([40.0, 0.0]).unwrap());

        let template = state.template().unwrap();
        assert!(!template.contains(a));
        assert!(!template.contains(b));
        assert_eq!(state.history.undo_depth(), 1);
        assert_eq!(state.history.undo_description(), Some("Delete"));

        assert!(state.undo().unwrap());
        assert_eq!(position(&state, a), (10.0, 10.0));
        assert_eq!(position(&state, b), (20.0, 10.0));
    }

    #[test]
    fn test_nudge_during_drag_starts_from_origin() {
        let (mut state, a, _) = editor();
        state.select(&[a], SelectMode::Set);
        state.pointer_down([0.0, 0.0]).unwrap();
        state.pointer_move([40.0, 0.0]).unwrap();

        assert!(state.nudge_selected(1.0, 0.0).unwrap());
        assert!(!state.pointer_up([40.0, 0.0]).unwrap());
        assert_eq!(position(&state, a), (11.0, 10.0));
        assert_eq!(state.history.undo_depth(), 1);
        assert_eq!(state.history.undo_description(), Some("Nudge"));
    }

    #[test]
    fn test_malformed_animation_is_rejected() {
        let (mut state, a, _) = editor();
        let mut animation = Animation::new(a, Phase::In, 200.0, Easing::Linear, vec![]).unwrap();
        animation.duration_ms = -5.0;
        assert!(matches!(
            state.add_animation(animation),
            Err(CommandError::Validation(e)) if e.field == "animations[0].duration_ms"
        ));
        assert!(state.template().unwrap().animations().is_empty());
        assert!(!state.history.can_undo());
    }

    #[test]
    fn test_rejected_edit_leaves_history_untouched() {
        let (mut state, _, _) = editor();
        let missing = ElementId::new();
        assert!(matches!(
            state.set_geometry(missing, Geometry::default()),
            Err(CommandError::Validation(_))
        ));
        assert!(!state.history.can_undo());
        assert!(!state.dirty);
    }
}
