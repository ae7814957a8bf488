use super::ray::{point_segment_distance, ray_hits_obb};
use super::scene::{PickPrimitive, PickShape, id_to_rgb, rgb_to_id};
use crate::camera::rig::{Ray, ViewportRig};
use crate::engine::entity::LocalExtent;
use bevy::math::Vec2;
use constants::picking::{HOVER_CORNER_SIZE_PX, HOVER_DEPTH_BIAS, HOVER_OUTLINE_WIDTH_PX};

/// 1x1 RGBA render target. A cleared target reads as id 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickTarget {
    pixel: [u8; 4],
}

impl Default for PickTarget {
    fn default() -> Self {
        Self { pixel: [0, 0, 0, 255] }
    }
}

impl PickTarget {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn write(&mut self, rgb: [u8; 3]) {
        self.pixel = [rgb[0], rgb[1], rgb[2], 255];
    }

    pub fn pixel(&self) -> [u8; 4] {
        self.pixel
    }

    pub fn read_id(&self) -> u32 {
        rgb_to_id([self.pixel[0], self.pixel[1], self.pixel[2]])
    }
}

/// Renders the pick scene region under one pixel.
///
/// Implementations offset the rig's view so the pixel fills the 1x1 target, then draw each
/// primitive with the flat color of its id and depth testing on.
pub trait PickRasterizer: Send + Sync {
    fn has_context(&self) -> bool;

    fn render_pixel(
        &mut self,
        rig: &ViewportRig,
        pixel: Vec2,
        primitives: &[PickPrimitive],
        target: &mut PickTarget,
    );
}

/// CPU rasterizer: the nearest primitive along the ray through the pixel center wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct RayCastRasterizer;

impl PickRasterizer for RayCastRasterizer {
    fn has_context(&self) -> bool {
        true
    }

    fn render_pixel(
        &mut self,
        rig: &ViewportRig,
        pixel: Vec2,
        primitives: &[PickPrimitive],
        target: &mut PickTarget,
    ) {
        target.clear();
        let center = pixel.floor() + Vec2::splat(0.5);
        let ray = rig.ray_from_pixel(center);

        let mut nearest: Option<(f32, u32)> = None;
        for primitive in primitives {
            let depth = match primitive.shape {
                PickShape::Solid => {
                    ray_hits_obb(ray.origin, ray.direction, primitive.world, &primitive.extent)
                }
                PickShape::Outline => {
                    outline_depth(rig, &ray, center, primitive).map(|t| t - HOVER_DEPTH_BIAS)
                }
                PickShape::Corners => {
                    corner_depth(rig, &ray, center, primitive).map(|t| t - 2.0 * HOVER_DEPTH_BIAS)
                }
            };
            if let Some(t) = depth {
                if nearest.is_none_or(|(best, _)| t < best) {
                    nearest = Some((t, primitive.id));
                }
            }
        }

        if let Some((_, id)) = nearest {
            target.write(id_to_rgb(id));
        }
    }
}

fn world_corners(primitive: &PickPrimitive) -> [bevy::math::Vec3; 8] {
    primitive
        .extent
        .corners()
        .map(|c| primitive.world.transform_point3(c))
}

fn outline_depth(rig: &ViewportRig, ray: &Ray, pixel: Vec2, primitive: &PickPrimitive) -> Option<f32> {
    let corners = world_corners(primitive);
    let mut best: Option<f32> = None;
    for (a, b) in LocalExtent::EDGES {
        let (Some(pa), Some(pb)) = (rig.world_to_pixel(corners[a]), rig.world_to_pixel(corners[b])) else {
            continue;
        };
        let (distance, s) = point_segment_distance(pixel, pa, pb);
        let t = ray.depth_of(corners[a].lerp(corners[b], s));
        // in front of the near plane only
        if distance <= HOVER_OUTLINE_WIDTH_PX && t >= 0.0 {
            best = Some(best.map_or(t, |current| current.min(t)));
        }
    }
    best
}

fn corner_depth(rig: &ViewportRig, ray: &Ray, pixel: Vec2, primitive: &PickPrimitive) -> Option<f32> {
    let half = HOVER_CORNER_SIZE_PX * 0.5;
    world_corners(primitive)
        .into_iter()
        .filter(|corner| {
            rig.world_to_pixel(*corner)
                .is_some_and(|p| (p - pixel).abs().max_element() <= half)
        })
        .map(|corner| ray.depth_of(corner))
        .filter(|t| *t >= 0.0)
        .reduce(f32::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::rig::ViewKind;
    use crate::picking::scene::HoverPickScene;
    use bevy::math::{Mat4, Vec3};
    use constants::picking::{HOVER_CORNER_ID, HOVER_MESH_ID, HOVER_OUTLINE_ID};

    fn top_rig() -> ViewportRig {
        let mut rig = ViewportRig::orthographic(ViewKind::Top, 20.0, 50.0);
        rig.set_size(200, 200);
        rig
    }

    fn pixel_id(rig: &ViewportRig, pixel: Vec2, primitives: &[PickPrimitive]) -> u32 {
        let mut target = PickTarget::default();
        RayCastRasterizer.render_pixel(rig, pixel, primitives, &mut target);
        target.read_id()
    }

    #[test]
    fn nearer_solid_wins() {
        let extent = LocalExtent::from_dimension(Vec3::splat(2.0));
        let low = PickPrimitive {
            id: 1,
            shape: PickShape::Solid,
            world: Mat4::from_translation(Vec3::new(0.0, 0.0, -10.0)),
            extent,
        };
        let high = PickPrimitive {
            id: 2,
            world: Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)),
            ..low
        };
        let rig = top_rig();
        assert_eq!(pixel_id(&rig, Vec2::new(100.0, 100.0), &[low, high]), 2);
        assert_eq!(pixel_id(&rig, Vec2::new(5.0, 5.0), &[low, high]), 0);
    }

    #[test]
    fn hover_parts_resolve_by_screen_position() {
        let rig = top_rig();
        let mut hover = HoverPickScene::default();
        // 4x4 box below the origin: 10 px per unit, corners at 80 and 120 px
        hover.mirror(
            Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)),
            LocalExtent::from_dimension(Vec3::new(4.0, 4.0, 2.0)),
        );
        let primitives = hover.primitives();

        assert_eq!(pixel_id(&rig, Vec2::new(100.0, 100.0), &primitives), HOVER_MESH_ID);
        assert_eq!(pixel_id(&rig, Vec2::new(100.0, 80.0), &primitives), HOVER_OUTLINE_ID);
        assert_eq!(pixel_id(&rig, Vec2::new(120.0, 120.0), &primitives), HOVER_CORNER_ID);
        assert_eq!(pixel_id(&rig, Vec2::new(20.0, 20.0), &primitives), 0);
    }
}
