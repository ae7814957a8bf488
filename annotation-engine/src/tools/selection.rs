use crate::engine::AnnotationEngine;
use crate::engine::events::EngineEvent;
use crate::error::{EngineError, Result};
use bevy::log::info;

impl AnnotationEngine {
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Entity the transform handles are bound to. Always the active one.
    pub fn handles(&self) -> Option<&str> {
        self.handles.as_deref()
    }

    /// Make `name` the single active entity and frame it in the orthographic views.
    pub fn select(&mut self, name: &str) -> Result<()> {
        if self.active.as_deref() == Some(name) {
            return Ok(());
        }
        let entity = self
            .entities
            .get(name)
            .ok_or_else(|| EngineError::UnknownEntity(name.to_string()))?;
        if entity.hidden {
            return Err(EngineError::EntityHidden(name.to_string()));
        }
        self.deselect();

        let Some(entity) = self.entities.get_mut(name) else {
            return Err(EngineError::UnknownEntity(name.to_string()));
        };
        entity.active = true;
        let world = entity.world_matrix();
        let extent = entity.extent;
        let transform = entity.transform;

        self.active = Some(name.to_string());
        self.handles = Some(name.to_string());
        self.hover_scene.mirror(world, extent);
        self.viewports.fly_to(&extent, &transform);
        self.viewports.request_render();
        info!("Selected '{}'", name);

        self.emit(EngineEvent::EntitySelected {
            name: name.to_string(),
        });
        Ok(())
    }

    /// Clear the active entity. Returns the one that was active.
    pub fn deselect(&mut self) -> Option<String> {
        let name = self.active.take()?;
        self.handles = None;
        self.hover_scene.clear();
        if let Some(entity) = self.entities.get_mut(&name) {
            entity.active = false;
        }
        self.viewports.request_render();
        self.emit(EngineEvent::EntityDeselected { name: name.clone() });
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use crate::camera::rig::ViewKind;
    use crate::config::EngineConfig;
    use crate::engine::AnnotationEngine;
    use crate::engine::entity::BoxSpec;
    use crate::error::EngineError;
    use bevy::math::Vec3;

    fn engine_with(names: &[&str]) -> AnnotationEngine {
        let mut engine = AnnotationEngine::with_defaults(EngineConfig::default()).unwrap();
        for (i, name) in names.iter().enumerate() {
            let spec = BoxSpec::new(*name, Vec3::new(i as f32 * 10.0, 0.0, 0.0), Vec3::ONE);
            engine.add_entity(spec).unwrap();
        }
        engine
    }

    #[test]
    fn only_one_entity_is_active() {
        let mut engine = engine_with(&["a", "b"]);
        engine.select("a").unwrap();
        engine.select("b").unwrap();

        assert_eq!(engine.active(), Some("b"));
        assert_eq!(engine.handles(), Some("b"));
        let active: Vec<_> = engine.entities().iter().filter(|e| e.active).map(|e| e.name.as_str()).collect();
        assert_eq!(active, ["b"]);
    }

    #[test]
    fn selecting_frames_the_box_in_orthographic_views() {
        let mut engine = engine_with(&["a", "b"]);
        engine.select("b").unwrap();
        let top = engine.viewports().rig(ViewKind::Top);
        assert_eq!(top.target, Vec3::new(10.0, 0.0, 0.0));
        assert!(top.position.z > top.target.z);
    }

    #[test]
    fn hidden_and_unknown_entities_cannot_be_selected() {
        let mut engine = engine_with(&["a"]);
        engine.soft_delete("a").unwrap();
        assert!(matches!(engine.select("a"), Err(EngineError::EntityHidden(_))));
        assert!(matches!(engine.select("zzz"), Err(EngineError::UnknownEntity(_))));
        assert_eq!(engine.active(), None);
    }

    #[test]
    fn deselect_clears_handles_and_hover_scene() {
        let mut engine = engine_with(&["a"]);
        engine.select("a").unwrap();
        assert_eq!(engine.deselect().as_deref(), Some("a"));
        assert_eq!(engine.handles(), None);
        assert!(engine.hover_scene.is_empty());
        assert_eq!(engine.deselect(), None);
    }
}
