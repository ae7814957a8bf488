use super::AnnotationEngine;
use super::entity::{LocalExtent, euler_to_quat};
use super::events::EngineEvent;
use bevy::log::debug;
use bevy::math::Vec3;
use bevy::prelude::Transform;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ground-truth box of one frame, keyed by entity name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameBox {
    pub id: String,
    pub position: [f32; 3],
    #[serde(default)]
    pub rotation: [f32; 3],
    pub dimension: [f32; 3],
    #[serde(default)]
    pub point_count: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub matched: usize,
    pub ghosted: usize,
    /// Frame boxes with no entity of that name. They are not created.
    pub unknown: usize,
}

impl AnnotationEngine {
    /// Reconcile entities against a frame's boxes.
    ///
    /// Matched entities take the frame pose and become visible again with their old pick id.
    /// The rest are ghosted: hidden, dropped from picking and deselected.
    pub fn diff_frame(&mut self, boxes: &[FrameBox]) -> DiffSummary {
        let by_id: BTreeMap<&str, &FrameBox> = boxes.iter().map(|b| (b.id.as_str(), b)).collect();
        let names: Vec<String> = self.entities.as_slice().iter().map(|e| e.name.clone()).collect();
        let mut summary = DiffSummary::default();
        let displayed = self.cloud.is_some();

        for name in names {
            let Some(entity) = self.entities.get_mut(&name) else {
                continue;
            };
            match by_id.get(name.as_str()) {
                Some(frame_box) => {
                    let revived = entity.hidden || entity.ghosted;
                    entity.transform = Transform::from_translation(Vec3::from_array(frame_box.position))
                        .with_rotation(euler_to_quat(Vec3::from_array(frame_box.rotation)));
                    entity.extent = LocalExtent::from_dimension(Vec3::from_array(frame_box.dimension));
                    if let Some(count) = frame_box.point_count.filter(|_| !displayed) {
                        entity.contained_points = count;
                    }
                    entity.hidden = false;
                    entity.ghosted = false;
                    self.refresh_entity(&name);
                    if revived {
                        self.emit(EngineEvent::EntityRestored { name });
                    }
                    summary.matched += 1;
                }
                None => {
                    summary.ghosted += 1;
                    if entity.ghosted {
                        continue;
                    }
                    entity.hidden = true;
                    entity.ghosted = true;
                    let pick_id = entity.pick_id;
                    self.pick_scene.remove(pick_id);
                    if self.active.as_deref() == Some(name.as_str()) {
                        self.deselect();
                    }
                    self.emit(EngineEvent::EntityGhosted { name });
                }
            }
        }
        summary.unknown = by_id.keys().filter(|id| !self.entities.contains(id)).count();
        debug!("Frame diff: {:?}", summary);
        self.viewports.request_render();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::entity::BoxSpec;
    use std::sync::{Arc, Mutex};

    fn frame_box(id: &str, x: f32) -> FrameBox {
        FrameBox {
            id: id.into(),
            position: [x, 0.0, 0.0],
            rotation: [0.0; 3],
            dimension: [1.0, 1.0, 1.0],
            point_count: Some(7),
        }
    }

    fn engine() -> AnnotationEngine {
        let mut engine = AnnotationEngine::with_defaults(EngineConfig::default()).unwrap();
        for (name, x) in [("a", 0.0), ("b", 5.0), ("c", 10.0)] {
            engine.add_entity(BoxSpec::new(name, Vec3::new(x, 0.0, 0.0), Vec3::ONE)).unwrap();
        }
        engine
    }

    #[test]
    fn unmatched_entities_are_ghosted_and_matched_ones_updated() {
        let mut engine = engine();
        engine.select("c").unwrap();
        let summary = engine.diff_frame(&[frame_box("a", 1.0), frame_box("b", 6.0), frame_box("z", 0.0)]);
        assert_eq!(
            summary,
            DiffSummary {
                matched: 2,
                ghosted: 1,
                unknown: 1
            }
        );

        let c = engine.entity("c").unwrap();
        assert!(c.hidden && c.ghosted);
        assert!(!engine.pick_scene.contains(c.pick_id));
        assert_eq!(engine.active(), None);

        let a = engine.entity("a").unwrap();
        assert_eq!(a.transform.translation, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(a.contained_points, 7);
        assert!(engine.entity("z").is_none());
    }

    #[test]
    fn ghost_returns_with_its_pick_id() {
        let mut engine = engine();
        let id = engine.entity("b").unwrap().pick_id;
        engine.diff_frame(&[frame_box("a", 0.0)]);
        engine.diff_frame(&[frame_box("a", 0.0), frame_box("b", 5.0)]);

        let b = engine.entity("b").unwrap();
        assert!(!b.hidden && !b.ghosted);
        assert_eq!(b.pick_id, id);
        assert!(engine.pick_scene.contains(id));
    }

    #[test]
    fn applying_the_same_frame_twice_changes_nothing() {
        let mut engine = engine();
        let frame = [frame_box("a", 2.0)];
        let first = engine.diff_frame(&frame);
        let snapshot: Vec<_> = engine.entities().to_vec();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        engine.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
        let second = engine.diff_frame(&frame);

        assert_eq!(first, second);
        assert_eq!(engine.entities(), snapshot.as_slice());
        assert!(events.lock().unwrap().is_empty());
    }
}
