//! Id-color picking against the entity scene and the hover scene of the active entity.

pub mod rasterizer;
pub mod ray;
pub mod scene;

use crate::camera::rig::ViewKind;
use crate::engine::AnnotationEngine;
use bevy::log::{debug, warn};
use bevy::math::Vec2;
use scene::HoverTarget;

impl AnnotationEngine {
    /// Id under `pixel` of `view`, 0 for background.
    pub fn pick_id_at(&mut self, view: ViewKind, pixel: Vec2) -> u32 {
        let primitives = self.pick_scene.primitives();
        self.rasterizer.render_pixel(
            self.viewports.rig(view),
            pixel,
            &primitives,
            &mut self.pick_target,
        );
        self.pick_target.read_id()
    }

    /// Select the entity under the pointer, or deselect on a background hit.
    pub fn pick(&mut self, view: ViewKind, pixel: Vec2) -> Option<String> {
        let id = self.pick_id_at(view, pixel);
        let hit = self
            .entities
            .by_pick_id(id)
            .filter(|entity| !entity.hidden)
            .map(|entity| entity.name.clone());
        debug!("Pick at {:?} in {} view read id {}", pixel, view.as_str(), id);

        match &hit {
            Some(name) => {
                if let Err(e) = self.select(name) {
                    warn!("Pick hit '{}' but it could not be selected: {}", name, e);
                }
            }
            None => {
                self.deselect();
            }
        }
        hit
    }

    /// Which part of the active entity is under the pointer.
    pub fn hover_probe(&mut self, view: ViewKind, pixel: Vec2) -> Option<HoverTarget> {
        if self.hover_scene.is_empty() {
            return None;
        }
        let primitives = self.hover_scene.primitives();
        self.rasterizer.render_pixel(
            self.viewports.rig(view),
            pixel,
            &primitives,
            &mut self.pick_target,
        );
        HoverTarget::from_id(self.pick_target.read_id())
    }
}
