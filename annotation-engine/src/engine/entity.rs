/// Bounding-box entities and their display parts
use crate::camera::rig::ViewKind;
use bevy::math::{EulerRot, Mat4, Quat, Vec3};
use bevy::prelude::Transform;

/// Axis-aligned box of the unscaled geometry, in entity space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalExtent {
    pub min: Vec3,
    pub max: Vec3,
}

impl LocalExtent {
    /// Box edges as corner index pairs, see [`LocalExtent::corners`].
    pub const EDGES: [(usize, usize); 12] = [
        (0, 1),
        (2, 3),
        (4, 5),
        (6, 7),
        (0, 2),
        (1, 3),
        (4, 6),
        (5, 7),
        (0, 4),
        (1, 5),
        (2, 6),
        (3, 7),
    ];

    /// Box of `dimension` centered on the origin.
    pub fn from_dimension(dimension: Vec3) -> Self {
        let half = dimension.abs() * 0.5;
        Self {
            min: -half,
            max: half,
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn half_size(&self) -> Vec3 {
        self.size() * 0.5
    }

    /// Inclusive on every face.
    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Corner `i` takes `max` on x when bit 0 is set, y for bit 1, z for bit 2.
    pub fn corners(&self) -> [Vec3; 8] {
        std::array::from_fn(|i| {
            Vec3::new(
                if i & 1 != 0 { self.max.x } else { self.min.x },
                if i & 2 != 0 { self.max.y } else { self.min.y },
                if i & 4 != 0 { self.max.z } else { self.min.z },
            )
        })
    }
}

/// Creation parameters. Rotation is XYZ Euler radians.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSpec {
    pub name: String,
    pub position: Vec3,
    pub rotation: Vec3,
    pub dimension: Vec3,
    pub category: String,
    pub active: bool,
    pub point_count: Option<usize>,
}

impl BoxSpec {
    pub fn new(name: impl Into<String>, position: Vec3, dimension: Vec3) -> Self {
        Self {
            name: name.into(),
            position,
            rotation: Vec3::ZERO,
            dimension,
            category: "unknown".to_string(),
            active: false,
            point_count: None,
        }
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn activated(mut self) -> Self {
        self.active = true;
        self
    }

    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.position).with_rotation(euler_to_quat(self.rotation))
    }
}

pub fn euler_to_quat(rotation: Vec3) -> Quat {
    Quat::from_euler(EulerRot::XYZ, rotation.x, rotation.y, rotation.z)
}

pub fn quat_to_euler(rotation: Quat) -> Vec3 {
    let (x, y, z) = rotation.to_euler(EulerRot::XYZ);
    Vec3::new(x, y, z)
}

/// Which parts of an entity a view draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartVisibility {
    pub solid: bool,
    pub outline: bool,
    pub corners: bool,
    pub heading: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxEntity {
    pub name: String,
    pub pick_id: u32,
    pub transform: Transform,
    pub extent: LocalExtent,
    pub color: [f32; 3],
    pub category: String,
    pub label: String,
    /// No ground truth in the displayed frame.
    pub ghosted: bool,
    /// Soft deleted: not drawn as solid and not pickable.
    pub hidden: bool,
    pub active: bool,
    pub contained_points: usize,
}

impl BoxEntity {
    pub fn world_matrix(&self) -> Mat4 {
        self.transform.compute_matrix()
    }

    /// World-space size of the box.
    pub fn dimension(&self) -> Vec3 {
        self.extent.size() * self.transform.scale
    }

    pub fn world_corners(&self) -> [Vec3; 8] {
        self.extent.corners().map(|c| self.transform.transform_point(c))
    }

    pub fn parts(&self, view: ViewKind) -> PartVisibility {
        if self.hidden {
            return PartVisibility::default();
        }
        match (self.active, view.is_orthographic()) {
            (true, false) => PartVisibility {
                outline: true,
                heading: true,
                ..Default::default()
            },
            (true, true) => PartVisibility {
                outline: true,
                corners: true,
                ..Default::default()
            },
            (false, false) => PartVisibility {
                solid: true,
                outline: true,
                heading: true,
                corners: false,
            },
            (false, true) => PartVisibility {
                solid: true,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_corners_span_the_box() {
        let extent = LocalExtent::from_dimension(Vec3::new(2.0, 4.0, 6.0));
        let corners = extent.corners();
        assert_eq!(corners[0], Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(corners[7], Vec3::new(1.0, 2.0, 3.0));
        for (a, b) in LocalExtent::EDGES {
            let diff = (corners[a] - corners[b]).abs();
            assert_eq!(diff.cmpgt(Vec3::ZERO).bitmask().count_ones(), 1);
        }
        assert!(extent.contains(Vec3::new(1.0, 2.0, 3.0)));
        assert!(!extent.contains(Vec3::new(1.01, 0.0, 0.0)));
    }
}
