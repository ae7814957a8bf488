use crate::engine::entity::LocalExtent;
use bevy::math::{Mat4, Vec2, Vec3};

/// Ray parameter of the first hit on an oriented box given by `world` and its local extent.
pub fn ray_hits_obb(origin: Vec3, dir: Vec3, world: Mat4, extent: &LocalExtent) -> Option<f32> {
    let inv = world.inverse();
    // affine, so t is the same in both spaces
    let o_local = inv.transform_point3(origin);
    let d_local = inv.transform_vector3(dir);
    ray_aabb_hit_t(o_local, d_local, extent.min, extent.max)
}

/// Slab test. Returns the entry distance, or the exit distance when starting inside.
pub fn ray_aabb_hit_t(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> Option<f32> {
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;

    for axis in 0..3 {
        let (o, d) = (origin[axis], dir[axis]);
        if d.abs() < f32::EPSILON {
            if o < min[axis] || o > max[axis] {
                return None;
            }
            continue;
        }
        let (mut near, mut far) = ((min[axis] - o) / d, (max[axis] - o) / d);
        if near > far {
            std::mem::swap(&mut near, &mut far);
        }
        t_enter = t_enter.max(near);
        t_exit = t_exit.min(far);
        if t_enter > t_exit {
            return None;
        }
    }

    if t_exit < 0.0 {
        return None;
    }
    Some(if t_enter >= 0.0 { t_enter } else { t_exit })
}

/// Distance from `p` to segment `a..b` and the segment parameter of the closest point.
pub fn point_segment_distance(p: Vec2, a: Vec2, b: Vec2) -> (f32, f32) {
    let ab = b - a;
    let len_sq = ab.length_squared();
    let s = if len_sq <= f32::EPSILON {
        0.0
    } else {
        ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0)
    };
    (p.distance(a + ab * s), s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::Quat;

    #[test]
    fn slab_hit_from_outside_and_inside() {
        let (min, max) = (Vec3::splat(-1.0), Vec3::splat(1.0));
        assert_eq!(ray_aabb_hit_t(Vec3::new(-5.0, 0.0, 0.0), Vec3::X, min, max), Some(4.0));
        assert_eq!(ray_aabb_hit_t(Vec3::ZERO, Vec3::X, min, max), Some(1.0));
        assert_eq!(ray_aabb_hit_t(Vec3::new(5.0, 0.0, 0.0), Vec3::X, min, max), None);
        assert_eq!(ray_aabb_hit_t(Vec3::new(-5.0, 2.0, 0.0), Vec3::X, min, max), None);
    }

    #[test]
    fn rotated_box_is_hit_along_its_long_axis() {
        let extent = LocalExtent::from_dimension(Vec3::new(10.0, 1.0, 1.0));
        let world = Mat4::from_rotation_translation(
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::new(0.0, 0.0, 0.0),
        );
        // long axis now runs along world Y
        assert!(ray_hits_obb(Vec3::new(0.0, 4.0, 10.0), Vec3::NEG_Z, world, &extent).is_some());
        assert!(ray_hits_obb(Vec3::new(4.0, 0.0, 10.0), Vec3::NEG_Z, world, &extent).is_none());
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let (d, s) = point_segment_distance(Vec2::new(3.0, 1.0), Vec2::ZERO, Vec2::new(2.0, 0.0));
        assert_eq!(s, 1.0);
        assert!((d - 2f32.sqrt()).abs() < 1e-6);
    }
}
