//! Box entities, the scenes that mirror them and the per-frame loop.
//!
//! [`AnnotationEngine`] is an ordinary owned value. The application constructs one and hands
//! references to whatever needs it; selection, gestures and picking are added to it by the
//! `tools` and `picking` modules.

pub mod category;
pub mod commands;
pub mod containment;
pub mod diff;
pub mod entity;
pub mod events;
pub mod frame;
pub mod render;
pub mod store;

use crate::camera::rig::ViewKind;
use crate::camera::sync::ViewportSet;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::picking::rasterizer::{PickRasterizer, PickTarget, RayCastRasterizer};
use crate::picking::scene::{HoverPickScene, PickScene};
use crate::tools::draw::{DrawMode, Gesture};
use bevy::log::{info, warn};
use category::{CategoryStyle, CategoryTable};
use commands::{CommandQueue, EngineCommand};
use containment::count_contained;
use entity::{BoxEntity, BoxSpec, LocalExtent};
use events::{EngineEvent, EngineSubscribers, SubscriptionId};
use pcd_decoder::DecodedPointCloud;
use render::{FrameRenderer, SceneView};
use std::sync::Arc;
use store::EntityStore;

pub struct AnnotationEngine {
    pub(crate) config: EngineConfig,
    pub(crate) categories: Box<dyn CategoryStyle>,
    pub(crate) rasterizer: Box<dyn PickRasterizer>,
    pub(crate) pick_target: PickTarget,
    pub(crate) entities: EntityStore,
    pub(crate) pick_scene: PickScene,
    pub(crate) hover_scene: HoverPickScene,
    pub(crate) viewports: ViewportSet,
    pub(crate) cloud: Option<Arc<DecodedPointCloud>>,
    pub(crate) active: Option<String>,
    /// Entity the transform handles are attached to.
    pub(crate) handles: Option<String>,
    pub(crate) draw_mode: DrawMode,
    pub(crate) gesture: Gesture,
    pub(crate) commands: CommandQueue,
    pub(crate) subscribers: EngineSubscribers,
    pub(crate) drawn_count: u32,
}

impl AnnotationEngine {
    /// Fails with `NoGpuContext` when the rasterizer cannot render.
    pub fn new(
        config: EngineConfig,
        rasterizer: Box<dyn PickRasterizer>,
        categories: Box<dyn CategoryStyle>,
    ) -> Result<Self> {
        if !rasterizer.has_context() {
            bevy::log::error!("Annotation engine needs a GPU context for picking");
            return Err(EngineError::NoGpuContext);
        }
        let viewports = ViewportSet::new(
            config.ortho_view_size,
            config.ortho_distance,
            config.render_mode,
        );
        Ok(Self {
            draw_mode: config.draw_mode,
            config,
            categories,
            rasterizer,
            pick_target: PickTarget::default(),
            entities: EntityStore::default(),
            pick_scene: PickScene::default(),
            hover_scene: HoverPickScene::default(),
            viewports,
            cloud: None,
            active: None,
            handles: None,
            gesture: Gesture::default(),
            commands: CommandQueue::default(),
            subscribers: EngineSubscribers::default(),
            drawn_count: 0,
        })
    }

    /// CPU ray-cast picking and the configured category table, for use without a window.
    pub fn with_defaults(config: EngineConfig) -> Result<Self> {
        let categories = CategoryTable::new(config.categories.clone());
        Self::new(config, Box::new(RayCastRasterizer), Box::new(categories))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn viewports(&self) -> &ViewportSet {
        &self.viewports
    }

    pub fn viewports_mut(&mut self) -> &mut ViewportSet {
        &mut self.viewports
    }

    /// Container resize for one view, snapped before it reaches the rig.
    pub fn resize(&mut self, view: ViewKind, width: u32, height: u32) -> (u32, u32) {
        self.viewports.resize(view, width, height)
    }

    pub fn request_render(&mut self) {
        self.viewports.request_render();
    }

    pub fn add_entity(&mut self, spec: BoxSpec) -> Result<u32> {
        if self.entities.contains(&spec.name) {
            return Err(EngineError::DuplicateEntity(spec.name));
        }
        let pick_id = self.pick_scene.allocate()?;
        let transform = spec.transform();
        let extent = LocalExtent::from_dimension(spec.dimension);
        let contained_points = match &self.cloud {
            Some(cloud) => count_contained(&extent, &transform, &cloud.positions),
            None => spec.point_count.unwrap_or(0),
        };
        let entity = BoxEntity {
            name: spec.name.clone(),
            pick_id,
            transform,
            extent,
            color: self.categories.color(&spec.category),
            label: self.categories.label(&spec.category, contained_points),
            category: spec.category,
            ghosted: false,
            hidden: false,
            active: false,
            contained_points,
        };
        self.pick_scene.insert(pick_id, entity.world_matrix(), extent);
        self.entities.insert(entity);
        info!("Added entity '{}' with pick id {}", spec.name, pick_id);

        self.emit(EngineEvent::EntityAdded {
            name: spec.name.clone(),
            pick_id,
        });
        self.viewports.request_render();
        if spec.active {
            self.select(&spec.name)?;
        }
        Ok(pick_id)
    }

    pub fn entity(&self, name: &str) -> Option<&BoxEntity> {
        self.entities.get(name)
    }

    pub fn entities(&self) -> &[BoxEntity] {
        self.entities.as_slice()
    }

    /// Entities that are neither soft deleted nor ghosted.
    pub fn visible_entities(&self) -> impl Iterator<Item = &BoxEntity> {
        self.entities.as_slice().iter().filter(|e| !e.hidden)
    }

    /// Hide an entity and take it out of picking. Its pick id stays reserved.
    pub fn soft_delete(&mut self, name: &str) -> Result<()> {
        let entity = self
            .entities
            .get_mut(name)
            .ok_or_else(|| EngineError::UnknownEntity(name.to_string()))?;
        if entity.hidden && !entity.ghosted {
            return Ok(());
        }
        entity.hidden = true;
        entity.ghosted = false;
        let pick_id = entity.pick_id;
        self.pick_scene.remove(pick_id);
        if self.active.as_deref() == Some(name) {
            self.deselect();
        }
        self.emit(EngineEvent::EntitySoftDeleted {
            name: name.to_string(),
        });
        self.viewports.request_render();
        Ok(())
    }

    /// Soft delete whatever is active. Bound to the Delete key.
    pub fn soft_delete_active(&mut self) -> Option<String> {
        let name = self.active.clone()?;
        self.soft_delete(&name).ok()?;
        Some(name)
    }

    pub fn restore(&mut self, name: &str) -> Result<()> {
        let entity = self
            .entities
            .get_mut(name)
            .ok_or_else(|| EngineError::UnknownEntity(name.to_string()))?;
        if !entity.hidden && !entity.ghosted {
            return Ok(());
        }
        entity.hidden = false;
        entity.ghosted = false;
        self.refresh_entity(name);
        self.emit(EngineEvent::EntityRestored {
            name: name.to_string(),
        });
        self.viewports.request_render();
        Ok(())
    }

    /// Remove an entity for good and release its pick id.
    pub fn dispose_entity(&mut self, name: &str) -> Result<BoxEntity> {
        if self.active.as_deref() == Some(name) {
            self.deselect();
        }
        let entity = self
            .entities
            .remove(name)
            .ok_or_else(|| EngineError::UnknownEntity(name.to_string()))?;
        self.pick_scene.release(entity.pick_id);
        info!("Disposed entity '{}'", name);
        self.emit(EngineEvent::EntityDisposed {
            name: name.to_string(),
        });
        self.viewports.request_render();
        Ok(entity)
    }

    /// Display another cloud and recount every visible entity against it.
    pub fn set_point_cloud(&mut self, cloud: Arc<DecodedPointCloud>) {
        self.swap_point_cloud(cloud);
        let names: Vec<String> = self.visible_entities().map(|e| e.name.clone()).collect();
        for name in &names {
            self.refresh_entity(name);
        }
    }

    /// Display `cloud` without recounting. The caller refreshes every visible entity.
    pub(crate) fn swap_point_cloud(&mut self, cloud: Arc<DecodedPointCloud>) {
        let points = cloud.len();
        self.cloud = Some(cloud);
        self.emit(EngineEvent::PointCloudSwapped { points });
        self.viewports.request_render();
    }

    pub fn point_cloud(&self) -> Option<&Arc<DecodedPointCloud>> {
        self.cloud.as_ref()
    }

    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&EngineEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.subscribers.subscribe(Box::new(listener))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub(crate) fn emit(&mut self, event: EngineEvent) {
        self.subscribers.emit(&event);
    }

    /// Handle for code that runs while a frame is drawn.
    pub fn commands(&self) -> CommandQueue {
        self.commands.clone()
    }

    /// Apply every queued command in order. Returns how many were taken.
    pub fn apply_commands(&mut self) -> usize {
        let queued = self.commands.drain();
        let taken = queued.len();
        for command in queued {
            let result = match command {
                EngineCommand::Add(spec) => self.add_entity(spec).map(|_| ()),
                EngineCommand::Select(name) => self.select(&name),
                EngineCommand::Deselect => {
                    self.deselect();
                    Ok(())
                }
                EngineCommand::Transform { name, op } => self.transform_entity(&name, op).map(|_| ()),
                EngineCommand::SoftDelete(name) => self.soft_delete(&name),
                EngineCommand::Restore(name) => self.restore(&name),
                EngineCommand::Dispose(name) => self.dispose_entity(&name).map(|_| ()),
            };
            if let Err(e) = result {
                warn!("Dropped queued command: {}", e);
            }
        }
        taken
    }

    /// Draw all four views, then apply what the renderer queued.
    pub fn render_frame(&mut self, renderer: &mut dyn FrameRenderer) -> bool {
        let scene = SceneView {
            entities: self.entities.as_slice(),
            cloud: self.cloud.as_deref(),
            active: self.active.as_deref(),
            commands: &self.commands,
        };
        let rendered = self
            .viewports
            .render_frame(|rig, zoom| renderer.render_view(rig, zoom, &scene));
        self.apply_commands();
        rendered
    }

    /// Recount, relabel and re-mirror one entity after its pose or the cloud changed.
    pub(crate) fn refresh_entity(&mut self, name: &str) -> Option<usize> {
        let recount = {
            let entity = self.entities.get(name)?;
            self.cloud
                .as_ref()
                .map(|cloud| count_contained(&entity.extent, &entity.transform, &cloud.positions))
        };
        let categories = &self.categories;
        let entity = self.entities.get_mut(name)?;
        if let Some(count) = recount {
            entity.contained_points = count;
        }
        entity.label = categories.label(&entity.category, entity.contained_points);

        let world = entity.world_matrix();
        if !entity.hidden {
            self.pick_scene.insert(entity.pick_id, world, entity.extent);
        }
        if entity.active {
            self.hover_scene.mirror(world, entity.extent);
        }
        Some(entity.contained_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picking::scene::PickPrimitive;
    use bevy::math::{Vec2, Vec3};
    use std::sync::Mutex;

    struct NoContext;

    impl PickRasterizer for NoContext {
        fn has_context(&self) -> bool {
            false
        }

        fn render_pixel(&mut self, _: &crate::camera::rig::ViewportRig, _: Vec2, _: &[PickPrimitive], _: &mut PickTarget) {}
    }

    fn engine() -> AnnotationEngine {
        AnnotationEngine::with_defaults(EngineConfig::default()).unwrap()
    }

    fn spec(name: &str, x: f32) -> BoxSpec {
        BoxSpec::new(name, Vec3::new(x, 0.0, 0.0), Vec3::new(2.0, 2.0, 2.0)).with_category("car")
    }

    #[test]
    fn engine_without_gpu_context_fails_fast() {
        let result = AnnotationEngine::new(
            EngineConfig::default(),
            Box::new(NoContext),
            Box::new(CategoryTable::builtin()),
        );
        assert!(matches!(result, Err(EngineError::NoGpuContext)));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut engine = engine();
        assert_eq!(engine.add_entity(spec("a", 0.0)).unwrap(), 1);
        assert!(matches!(
            engine.add_entity(spec("a", 5.0)),
            Err(EngineError::DuplicateEntity(_))
        ));
        assert_eq!(engine.add_entity(spec("b", 5.0)).unwrap(), 2);
    }

    #[test]
    fn labels_follow_the_cloud() {
        let mut engine = engine();
        engine.add_entity(spec("a", 0.0)).unwrap();
        assert_eq!(engine.entity("a").unwrap().label, "Car 0");

        let cloud = DecodedPointCloud::from_points(
            vec![0.0, 0.0, 0.0, 0.5, 0.5, 0.5, 9.0, 9.0, 9.0],
            Vec::new(),
        );
        engine.set_point_cloud(Arc::new(cloud));
        let a = engine.entity("a").unwrap();
        assert_eq!(a.contained_points, 2);
        assert_eq!(a.label, "Car 2");
    }

    #[test]
    fn soft_delete_keeps_pick_slot_and_dispose_frees_it() {
        let mut engine = engine();
        let id = engine.add_entity(spec("a", 0.0)).unwrap();
        engine.soft_delete("a").unwrap();
        assert!(engine.entity("a").unwrap().hidden);
        assert!(!engine.pick_scene.contains(id));
        assert!(engine.pick_scene.is_reserved(id));
        assert_eq!(engine.visible_entities().count(), 0);

        engine.restore("a").unwrap();
        assert!(engine.pick_scene.contains(id));

        engine.dispose_entity("a").unwrap();
        assert!(!engine.pick_scene.is_reserved(id));
        assert!(engine.entity("a").is_none());
        assert!(matches!(engine.soft_delete("a"), Err(EngineError::UnknownEntity(_))));
    }

    #[test]
    fn queued_commands_apply_after_the_frame() {
        struct QueueingRenderer {
            views: usize,
        }

        impl FrameRenderer for QueueingRenderer {
            fn render_view(&mut self, _: &crate::camera::rig::ViewportRig, _: f32, scene: &SceneView<'_>) {
                self.views += 1;
                if self.views == 1 {
                    scene.commands.push(EngineCommand::SoftDelete("a".into()));
                    // nothing changes mid-frame
                    assert!(!scene.entities[0].hidden);
                }
            }
        }

        let mut engine = engine();
        engine.add_entity(spec("a", 0.0)).unwrap();
        let mut renderer = QueueingRenderer { views: 0 };
        assert!(engine.render_frame(&mut renderer));
        assert_eq!(renderer.views, 4);
        assert!(engine.entity("a").unwrap().hidden);
        assert!(engine.commands().is_empty());
    }

    #[test]
    fn subscribers_see_typed_events() {
        let mut engine = engine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = engine.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        engine.add_entity(spec("a", 0.0)).unwrap();
        engine.soft_delete("a").unwrap();
        assert!(engine.unsubscribe(id));
        engine.restore("a").unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                EngineEvent::EntityAdded {
                    name: "a".into(),
                    pick_id: 1
                },
                EngineEvent::EntitySoftDeleted { name: "a".into() },
            ]
        );
    }
}
