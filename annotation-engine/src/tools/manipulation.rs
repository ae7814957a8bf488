use crate::engine::AnnotationEngine;
use crate::engine::entity::LocalExtent;
use crate::engine::events::EngineEvent;
use crate::error::{EngineError, Result};
use bevy::math::{Quat, Vec3};
use bevy::prelude::Transform;
use serde::{Deserialize, Serialize};

const MIN_SCALE: f32 = 1e-3;

/// One step of the transform handles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformOp {
    Translate { delta: [f32; 3] },
    /// Turn about world up, radians.
    Rotate { angle: f32 },
    /// Per-axis multiplier on the current scale.
    Resize { factor: [f32; 3] },
}

impl TransformOp {
    pub fn apply(&self, transform: &mut Transform) {
        match *self {
            Self::Translate { delta } => transform.translation += Vec3::from_array(delta),
            Self::Rotate { angle } => transform.rotation = Quat::from_rotation_z(angle) * transform.rotation,
            Self::Resize { factor } => {
                transform.scale = (transform.scale * Vec3::from_array(factor)).max(Vec3::splat(MIN_SCALE));
            }
        }
    }
}

impl AnnotationEngine {
    /// Apply a handle step to whatever the handles are bound to.
    pub fn transform_active(&mut self, op: TransformOp) -> Result<usize> {
        let name = self.handles.clone().ok_or(EngineError::NoActiveEntity)?;
        self.transform_entity(&name, op)
    }

    /// Returns the refreshed containment count.
    pub fn transform_entity(&mut self, name: &str, op: TransformOp) -> Result<usize> {
        self.update_pose(name, |transform, _| op.apply(transform))
    }

    pub(crate) fn update_pose(
        &mut self,
        name: &str,
        change: impl FnOnce(&mut Transform, &mut LocalExtent),
    ) -> Result<usize> {
        let entity = self
            .entities
            .get_mut(name)
            .ok_or_else(|| EngineError::UnknownEntity(name.to_string()))?;
        change(&mut entity.transform, &mut entity.extent);

        let contained_points = self.refresh_entity(name).unwrap_or_default();
        self.viewports.request_render();
        self.emit(EngineEvent::EntityTransformed {
            name: name.to_string(),
            contained_points,
        });
        Ok(contained_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::entity::BoxSpec;
    use crate::picking::scene::PickShape;
    use pcd_decoder::DecodedPointCloud;
    use std::sync::Arc;

    fn engine_with_cloud() -> AnnotationEngine {
        let mut engine = AnnotationEngine::with_defaults(EngineConfig::default()).unwrap();
        // three points near x = 0 and two near x = 10
        let cloud = DecodedPointCloud::from_points(
            vec![
                0.0, 0.0, 0.0, 0.2, 0.1, 0.0, -0.3, 0.2, 0.1, 10.0, 0.0, 0.0, 10.2, 0.1, 0.0,
            ],
            Vec::new(),
        );
        engine.set_point_cloud(Arc::new(cloud));
        engine
            .add_entity(BoxSpec::new("a", Vec3::ZERO, Vec3::ONE).activated())
            .unwrap();
        engine
    }

    #[test]
    fn parsed_from_json() {
        let op: TransformOp = serde_json::from_str(r#"{"op":"translate","delta":[1,2,3]}"#).unwrap();
        assert_eq!(op, TransformOp::Translate { delta: [1.0, 2.0, 3.0] });
        let op: TransformOp = serde_json::from_str(r#"{"op":"rotate","angle":0.5}"#).unwrap();
        assert_eq!(op, TransformOp::Rotate { angle: 0.5 });
    }

    #[test]
    fn resize_never_collapses() {
        let mut transform = Transform::IDENTITY;
        TransformOp::Resize { factor: [0.0, 2.0, 1.0] }.apply(&mut transform);
        assert_eq!(transform.scale, Vec3::new(MIN_SCALE, 2.0, 1.0));
    }

    #[test]
    fn moving_the_active_box_recounts_and_updates_both_pick_scenes() {
        let mut engine = engine_with_cloud();
        assert_eq!(engine.entity("a").unwrap().contained_points, 3);

        let count = engine
            .transform_active(TransformOp::Translate { delta: [10.0, 0.0, 0.0] })
            .unwrap();
        assert_eq!(count, 2);
        let entity = engine.entity("a").unwrap();
        assert_eq!(entity.label, "Unknown 2");

        let world = entity.world_matrix();
        let solid = engine
            .pick_scene
            .primitives()
            .into_iter()
            .find(|p| p.id == entity.pick_id)
            .unwrap();
        assert_eq!(solid.world, world);
        let hover = engine.hover_scene.primitives();
        assert!(hover.iter().any(|p| p.shape == PickShape::Outline && p.world == world));
    }

    #[test]
    fn handles_require_an_active_entity() {
        let mut engine = engine_with_cloud();
        engine.deselect();
        assert!(matches!(
            engine.transform_active(TransformOp::Rotate { angle: 1.0 }),
            Err(EngineError::NoActiveEntity)
        ));
    }
}
