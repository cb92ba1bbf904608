// SPDX-License-Identifier: MIT OR Apache-2.0
//! Playout channel: one on-air template instance driven by a host clock.
//!
//! Phase boards and content overlays are published as whole `Arc` snapshots,
//! so a render thread reading them never observes a half-applied transition.

use crate::binding::{resolve_bindings, BindingMissError, ContentOverlay, DataSources, RecordSet};
use crate::evaluate::{evaluate, evaluate_phase, Frame};
use crate::phase::{ActivationTarget, PhaseBoard, PhaseTransition};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use telop_model::{Binding, InstanceId, Phase, Template, TemplateId};

/// Output of one clock tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    /// Host time of the tick (ms)
    pub now_ms: f64,
    /// Evaluated frame
    pub frame: Frame,
    /// Phase changes applied by this tick
    pub transitions: Vec<PhaseTransition>,
}

/// A played-out template instance
pub struct Playout {
    instance: InstanceId,
    source: TemplateId,
    template: Arc<Template>,
    board: RwLock<Arc<PhaseBoard>>,
    overlay: RwLock<Arc<ContentOverlay>>,
    sources: RwLock<DataSources>,
}

impl Playout {
    /// Instantiate a template for playout
    pub fn new(template: &Template) -> Self {
        let instance = template.instantiate();
        tracing::info!(
            "Created playout {} for template {:?}",
            instance.id,
            template.name()
        );
        Self {
            instance: instance.id,
            source: instance.source,
            template: Arc::new(instance.template),
            board: RwLock::new(Arc::new(PhaseBoard::new())),
            overlay: RwLock::new(Arc::new(ContentOverlay::new())),
            sources: RwLock::new(DataSources::new()),
        }
    }

    /// Instance ID
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Template the instance was copied from
    pub fn source(&self) -> TemplateId {
        self.source
    }

    /// The instance's template
    pub fn template(&self) -> Arc<Template> {
        Arc::clone(&self.template)
    }

    /// Current phase board snapshot
    pub fn board(&self) -> Arc<PhaseBoard> {
        Arc::clone(&*self.board.read())
    }

    /// Current content overlay snapshot
    pub fn overlay(&self) -> Arc<ContentOverlay> {
        Arc::clone(&*self.overlay.read())
    }

    /// Whether every element is idle
    pub fn is_idle(&self) -> bool {
        self.board.read().is_idle()
    }

    /// Put elements on air
    pub fn activate(&self, target: &ActivationTarget, now_ms: f64) {
        let mut board = self.board.write();
        *board = Arc::new(board.activate(&self.template, target, now_ms));
    }

    /// Take elements off air
    pub fn deactivate(&self, target: &ActivationTarget, now_ms: f64) {
        let overlay = self.overlay();
        let mut board = self.board.write();
        *board = Arc::new(board.deactivate(&self.template, target, now_ms, &overlay));
    }

    /// Replace the records of a data source and re-resolve its bindings
    pub fn push_records(&self, source: &str, records: RecordSet) -> Vec<BindingMissError> {
        let bindings: Vec<Binding> = self
            .template
            .bindings()
            .iter()
            .filter(|b| b.source == source)
            .cloned()
            .collect();

        let mut sources = self.sources.write();
        sources.insert(source, records);

        let mut overlay = self.overlay.write();
        let resolution = resolve_bindings(&bindings, &sources, &overlay);
        *overlay = Arc::new(resolution.overlay);
        resolution.misses
    }

    /// Advance the phase machine to `now_ms` and evaluate
    pub fn tick(&self, now_ms: f64) -> Tick {
        let (board, transitions) = {
            let mut board = self.board.write();
            let (next, transitions) = board.advance(&self.template, now_ms);
            if !transitions.is_empty() {
                *board = Arc::new(next);
            }
            (Arc::clone(&*board), transitions)
        };
        let overlay = self.overlay();
        Tick {
            now_ms,
            frame: evaluate(&self.template, &board, now_ms, &overlay),
            transitions,
        }
    }

    /// Evaluate one phase at local time `t_ms` with the current overlay
    pub fn preview(&self, phase: Phase, t_ms: f64) -> Frame {
        evaluate_phase(&self.template, phase, t_ms, &self.overlay())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::ElementPhase;
    use crate::ResolvedContent;
    use serde_json::json;
    use telop_model::{Animation, ContentField, Easing, Element, Keyframe};

    fn ticker() -> (Template, Element) {
        let headline = Element::text("Headline", "Breaking news");
        let binding =
            Binding::new(headline.id, ContentField::Text, "headlines", "title").unwrap();
        let fade = Animation::new(
            headline.id,
            Phase::In,
            400.0,
            Easing::Linear,
            vec![Keyframe::at(0.0).with_opacity(0.0), Keyframe::at(100.0).with_opacity(1.0)],
        )
        .unwrap();
        let template =
            Template::new("Ticker", vec![headline.clone()], vec![fade], vec![binding]).unwrap();
        (template, headline)
    }

    #[test]
    fn test_tick_reports_transitions_once() {
        let (template, headline) = ticker();
        let playout = Playout::new(&template);
        assert_eq!(playout.template().id(), template.id());
        assert_eq!(playout.source(), template.id());

        playout.activate(&ActivationTarget::Template, 0.0);
        let tick = playout.tick(200.0);
        assert!(tick.transitions.is_empty());
        assert!((tick.frame.element(headline.id).unwrap().opacity - 0.5).abs() < 1e-9);

        let tick = playout.tick(400.0);
        assert_eq!(tick.transitions.len(), 1);
        assert_eq!(playout.board().phase(headline.id), ElementPhase::Looping);
        assert!(playout.tick(440.0).transitions.is_empty());

        playout.deactivate(&ActivationTarget::Template, 500.0);
        assert!(playout.is_idle());
    }

    #[test]
    fn test_pushed_records_drive_content() {
        let (template, headline) = ticker();
        let playout = Playout::new(&template);
        let misses = playout.push_records(
            "headlines",
            RecordSet::new(10.0, vec![json!({"title": "Markets rally"})]),
        );
        assert!(misses.is_empty());
        let frame = playout.preview(Phase::Loop, 0.0);
        assert_eq!(
            frame.element(headline.id).unwrap().content,
            ResolvedContent::Text("Markets rally".into())
        );

        let misses = playout.push_records("headlines", RecordSet::new(20.0, vec![json!({})]));
        assert_eq!(misses.len(), 1);
        assert_eq!(
            playout.overlay().get(headline.id, &ContentField::Text),
            Some("Markets rally")
        );
        assert!(playout.push_records("weather", RecordSet::default()).is_empty());
    }

    #[test]
    fn test_concurrent_evaluation_matches_sequential() {
        let (template, headline) = ticker();
        let playout = Playout::new(&template);
        playout.activate(&ActivationTarget::Template, 0.0);
        let (shared, board, overlay) = (playout.template(), playout.board(), playout.overlay());

        let times = [100.0, 300.0];
        let expected: Vec<Frame> = times
            .iter()
            .map(|t| evaluate(&shared, &board, *t, &overlay))
            .collect();

        std::thread::scope(|scope| {
            let workers: Vec<_> = times
                .into_iter()
                .map(|t| {
                    let (template, board, overlay) =
                        (Arc::clone(&shared), Arc::clone(&board), Arc::clone(&overlay));
                    scope.spawn(move || {
                        (0..50)
                            .map(|_| evaluate(&template, &board, t, &overlay))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            for (worker, expected) in workers.into_iter().zip(&expected) {
                let frames = worker.join().unwrap();
                assert!(frames.iter().all(|frame| frame == expected));
            }
        });

        assert!((expected[0].element(headline.id).unwrap().opacity - 0.25).abs() < 1e-9);
        assert!((expected[1].element(headline.id).unwrap().opacity - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_readers_see_whole_boards() {
        let (template, headline) = ticker();
        let playout = Playout::new(&template);
        playout.activate(&ActivationTarget::Template, 0.0);

        std::thread::scope(|scope| {
            let reader = scope.spawn(|| {
                let mut seen = Vec::new();
                for _ in 0..100 {
                    seen.push(playout.board().phase(headline.id));
                }
                seen
            });
            for step in 0..50 {
                playout.tick(f64::from(step) * 20.0);
            }
            let seen = reader.join().unwrap();
            assert!(seen
                .iter()
                .all(|p| matches!(p, ElementPhase::Entering | ElementPhase::Looping)));
        });
    }
}
