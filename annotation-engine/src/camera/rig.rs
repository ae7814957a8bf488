use bevy::math::{Mat4, Vec2, Vec3, Vec4};
use constants::coordinate_system::WORLD_UP;
use constants::render_settings::{
    MAIN_FAR, MAIN_FOV_DEGREES, MAIN_INITIAL_POSITION, MAIN_MAX_DISTANCE, MAIN_MIN_DISTANCE,
    ORTHO_FAR,
};
use serde::{Deserialize, Serialize};

/// One of the four synchronized views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Main,
    Top,
    Front,
    Side,
}

impl ViewKind {
    pub const ALL: [ViewKind; 4] = [Self::Main, Self::Top, Self::Front, Self::Side];
    pub const ORTHOGRAPHIC: [ViewKind; 3] = [Self::Top, Self::Front, Self::Side];

    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "main" => Some(Self::Main),
            "top" => Some(Self::Top),
            "front" => Some(Self::Front),
            "side" => Some(Self::Side),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Top => "top",
            Self::Front => "front",
            Self::Side => "side",
        }
    }

    pub fn is_orthographic(self) -> bool {
        self != Self::Main
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Main => 0,
            Self::Top => 1,
            Self::Front => 2,
            Self::Side => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective { fov_y_degrees: f32, near: f32, far: f32 },
    /// `size` is the visible height in world units at zoom 1.
    Orthographic { size: f32, near: f32, far: f32 },
}

/// Per-rig pointer state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    Selecting,
    DrawPick,
    DrawDrag,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Parameter of the point on the ray closest to `p`.
    pub fn depth_of(&self, p: Vec3) -> f32 {
        (p - self.origin).dot(self.direction)
    }
}

/// Plane `normal · p + constant = 0` that new boxes are placed on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasePlane {
    pub normal: [f32; 3],
    pub constant: f32,
}

impl Default for BasePlane {
    fn default() -> Self {
        Self {
            normal: constants::coordinate_system::DEFAULT_BASE_PLANE_NORMAL,
            constant: constants::coordinate_system::DEFAULT_BASE_PLANE_CONSTANT,
        }
    }
}

impl BasePlane {
    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal).normalize_or(Vec3::Z)
    }

    /// Forward intersection of `ray` with the plane.
    pub fn intersect(&self, ray: &Ray) -> Option<Vec3> {
        let normal = self.normal();
        let denom = normal.dot(ray.direction);
        if denom.abs() < 1e-6 {
            return None;
        }
        let t = -(normal.dot(ray.origin) + self.constant) / denom;
        (t >= 0.0).then(|| ray.at(t))
    }
}

/// Camera pose, projection and pointer state of one view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportRig {
    pub kind: ViewKind,
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: Projection,
    pub width: u32,
    pub height: u32,
    pub zoom: f32,
    pub controls_enabled: bool,
    pub state: InteractionState,
}

impl ViewportRig {
    pub fn main() -> Self {
        Self {
            kind: ViewKind::Main,
            position: Vec3::from_array(MAIN_INITIAL_POSITION),
            target: Vec3::ZERO,
            up: Vec3::from_array(WORLD_UP),
            projection: Projection::Perspective {
                fov_y_degrees: MAIN_FOV_DEGREES,
                near: constants::render_settings::MAIN_NEAR,
                far: MAIN_FAR,
            },
            width: 0,
            height: 0,
            zoom: 1.0,
            controls_enabled: true,
            state: InteractionState::Idle,
        }
    }

    /// Orthographic rig sitting `distance` away from the origin on its fixed axis.
    pub fn orthographic(kind: ViewKind, size: f32, distance: f32) -> Self {
        let (position, up) = match kind {
            ViewKind::Top => (Vec3::new(0.0, 0.0, distance), Vec3::Y),
            ViewKind::Front => (Vec3::new(0.0, distance, 0.0), Vec3::Z),
            ViewKind::Side | ViewKind::Main => (Vec3::new(distance, 0.0, 0.0), Vec3::Z),
        };
        Self {
            kind,
            position,
            target: Vec3::ZERO,
            up,
            projection: Projection::Orthographic {
                size,
                near: (distance - 0.1).max(0.01),
                far: ORTHO_FAR,
            },
            width: 0,
            height: 0,
            zoom: 1.0,
            controls_enabled: true,
            state: InteractionState::Idle,
        }
    }

    pub fn aspect(&self) -> f32 {
        if self.width == 0 || self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn distance(&self) -> f32 {
        self.position.distance(self.target)
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Z)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        let zoom = self.zoom.max(f32::EPSILON);
        match self.projection {
            Projection::Perspective {
                fov_y_degrees,
                near,
                far,
            } => {
                let half = (fov_y_degrees.to_radians() * 0.5).tan() / zoom;
                Mat4::perspective_rh(2.0 * half.atan(), self.aspect(), near, far)
            }
            Projection::Orthographic { size, near, far } => {
                let half_h = size * 0.5 / zoom;
                let half_w = half_h * self.aspect();
                Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, near, far)
            }
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Ray through a pixel, origin top-left, y down.
    pub fn ray_from_pixel(&self, pixel: Vec2) -> Ray {
        let size = self.pixel_size();
        let ndc = Vec2::new(2.0 * pixel.x / size.x - 1.0, 1.0 - 2.0 * pixel.y / size.y);
        let inverse = self.view_projection().inverse();
        let near = inverse.project_point3(ndc.extend(0.0));
        let far = inverse.project_point3(ndc.extend(1.0));
        Ray {
            origin: near,
            direction: (far - near).normalize_or(self.forward()),
        }
    }

    /// Pixel a world point projects to, or `None` behind the camera.
    pub fn world_to_pixel(&self, point: Vec3) -> Option<Vec2> {
        let clip = self.view_projection() * Vec4::new(point.x, point.y, point.z, 1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let size = self.pixel_size();
        Some(Vec2::new(
            (ndc.x + 1.0) * 0.5 * size.x,
            (1.0 - ndc.y) * 0.5 * size.y,
        ))
    }

    /// Slide pose and target so the scene follows a pointer drag of `delta` pixels.
    pub fn pan(&mut self, delta: Vec2) {
        let size = self.pixel_size();
        let world_per_pixel = match self.projection {
            Projection::Perspective { fov_y_degrees, .. } => {
                2.0 * self.distance() * (fov_y_degrees.to_radians() * 0.5).tan()
                    / self.zoom.max(f32::EPSILON)
                    / size.y
            }
            Projection::Orthographic { size: extent, .. } => {
                extent / self.zoom.max(f32::EPSILON) / size.y
            }
        };
        let forward = self.forward();
        let right = forward.cross(self.up).normalize_or(Vec3::X);
        let screen_up = right.cross(forward);
        let offset = (-right * delta.x + screen_up * delta.y) * world_per_pixel;
        self.position += offset;
        self.target += offset;
    }

    /// Zoom in by `factor` (> 1 magnifies). Perspective rigs dolly toward the target.
    pub fn zoom_by(&mut self, factor: f32) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        match self.projection {
            Projection::Perspective { .. } => {
                let distance = (self.distance() / factor).clamp(MAIN_MIN_DISTANCE, MAIN_MAX_DISTANCE);
                self.position = self.target - self.forward() * distance;
            }
            Projection::Orthographic { .. } => {
                self.zoom = (self.zoom * factor).clamp(0.01, 100.0);
            }
        }
    }

    pub(crate) fn pixel_size(&self) -> Vec2 {
        Vec2::new(self.width.max(1) as f32, self.height.max(1) as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn near(a: Vec3, b: Vec3) -> bool {
        a.distance(b) < 1e-3
    }

    #[test]
    fn center_pixel_ray_points_at_target() {
        let mut rig = ViewportRig::main();
        rig.set_size(400, 300);
        let ray = rig.ray_from_pixel(Vec2::new(200.0, 150.0));
        assert!(near(ray.direction, rig.forward()));
    }

    #[test]
    fn world_to_pixel_inverts_ray_from_pixel() {
        let mut rig = ViewportRig::orthographic(ViewKind::Top, 20.0, 50.0);
        rig.set_size(200, 100);
        let p = Vec3::new(3.0, -2.0, 0.0);
        let px = rig.world_to_pixel(p).unwrap();
        let ray = rig.ray_from_pixel(px);
        let hit = BasePlane::default().intersect(&ray).unwrap();
        assert!(near(hit, p));
    }

    #[test]
    fn top_view_maps_world_axes_to_screen() {
        let mut rig = ViewportRig::orthographic(ViewKind::Top, 20.0, 50.0);
        rig.set_size(100, 100);
        let center = rig.world_to_pixel(Vec3::ZERO).unwrap();
        let east = rig.world_to_pixel(Vec3::X).unwrap();
        let north = rig.world_to_pixel(Vec3::Y).unwrap();
        assert!(east.x > center.x);
        assert!(north.y < center.y);
        // 20 world units across 100 px
        assert!((east.x - center.x - 5.0).abs() < 1e-3);
    }

    #[test]
    fn ortho_zoom_shrinks_visible_extent() {
        let mut rig = ViewportRig::orthographic(ViewKind::Front, 20.0, 50.0);
        rig.set_size(100, 100);
        let before = rig.world_to_pixel(Vec3::Z).unwrap();
        rig.zoom_by(2.0);
        let after = rig.world_to_pixel(Vec3::Z).unwrap();
        assert_eq!(rig.zoom, 2.0);
        assert!((50.0 - after.y) > (50.0 - before.y) * 1.9);
    }

    #[test]
    fn perspective_zoom_is_clamped() {
        let mut rig = ViewportRig::main();
        rig.zoom_by(1e6);
        assert!((rig.distance() - MAIN_MIN_DISTANCE).abs() < 1e-3);
    }

    #[test]
    fn pan_moves_pose_and_target_together() {
        let mut rig = ViewportRig::orthographic(ViewKind::Top, 20.0, 50.0);
        rig.set_size(100, 100);
        rig.pan(Vec2::new(10.0, 0.0));
        assert!(near(rig.target, Vec3::new(-2.0, 0.0, 0.0)));
        assert!(near(rig.position - rig.target, Vec3::new(0.0, 0.0, 50.0)));
    }

    #[test]
    fn parallel_ray_misses_plane() {
        let ray = Ray {
            origin: Vec3::Z,
            direction: Vec3::X,
        };
        assert_eq!(BasePlane::default().intersect(&ray), None);
    }
}
