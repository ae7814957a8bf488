use super::rig::{ViewKind, ViewportRig};
use crate::engine::entity::LocalExtent;
use bevy::math::Vec3;
use bevy::prelude::Transform;
use constants::render_settings::{RESIZE_HEIGHT_STEP, RESIZE_WIDTH_STEP};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    #[default]
    Continuous,
    /// Render only after `request_render`; several requests collapse into one frame.
    OnDemand,
}

/// Snap container sizes to multiples of 4 px wide and 10 px high.
pub fn snap_size(width: u32, height: u32) -> (u32, u32) {
    (
        width / RESIZE_WIDTH_STEP * RESIZE_WIDTH_STEP,
        height / RESIZE_HEIGHT_STEP * RESIZE_HEIGHT_STEP,
    )
}

/// The main rig and the three orthographic rigs, rendered as one logical view.
#[derive(Debug, Clone)]
pub struct ViewportSet {
    rigs: [ViewportRig; 4],
    distance: f32,
    mode: RenderMode,
    render_requested: bool,
    frames_rendered: u64,
}

impl ViewportSet {
    pub fn new(ortho_size: f32, distance: f32, mode: RenderMode) -> Self {
        Self {
            rigs: [
                ViewportRig::main(),
                ViewportRig::orthographic(ViewKind::Top, ortho_size, distance),
                ViewportRig::orthographic(ViewKind::Front, ortho_size, distance),
                ViewportRig::orthographic(ViewKind::Side, ortho_size, distance),
            ],
            distance,
            mode,
            render_requested: true,
            frames_rendered: 0,
        }
    }

    pub fn rig(&self, kind: ViewKind) -> &ViewportRig {
        &self.rigs[kind.index()]
    }

    pub fn rig_mut(&mut self, kind: ViewKind) -> &mut ViewportRig {
        &mut self.rigs[kind.index()]
    }

    pub fn rigs(&self) -> impl Iterator<Item = &ViewportRig> {
        self.rigs.iter()
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: RenderMode) {
        self.mode = mode;
        self.render_requested = true;
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// One zoom for the three orthographic rigs: the value two of them agree on, else 1.
    pub fn resolve_zoom(&self) -> f32 {
        let top = self.rig(ViewKind::Top).zoom;
        let front = self.rig(ViewKind::Front).zoom;
        let side = self.rig(ViewKind::Side).zoom;
        if top == front || top == side {
            top
        } else if front == side {
            front
        } else {
            1.0
        }
    }

    /// Zoom interaction on one view. Orthographic zoom is shared by all three rigs.
    pub fn zoom_view(&mut self, kind: ViewKind, factor: f32) {
        if kind.is_orthographic() {
            for ortho in ViewKind::ORTHOGRAPHIC {
                self.rig_mut(ortho).zoom_by(factor);
            }
        } else {
            self.rig_mut(kind).zoom_by(factor);
        }
        self.request_render();
    }

    /// Frame a box in every orthographic rig and reset their zoom.
    pub fn fly_to(&mut self, extent: &LocalExtent, transform: &Transform) {
        let center = transform.transform_point(extent.center());
        let half = extent.half_size() * transform.scale;
        let dir_x = transform.rotation * Vec3::X;
        let dir_y = transform.rotation * Vec3::Y;
        let distance = self.distance;

        let top = self.rig_mut(ViewKind::Top);
        top.position = center + Vec3::Z * (distance + half.z);
        top.target = center;
        top.up = Vec3::new(dir_y.x, dir_y.y, 0.0).normalize_or(Vec3::Y);
        top.zoom = 1.0;

        let front = self.rig_mut(ViewKind::Front);
        front.position = center + dir_y * (distance + half.y);
        front.target = center;
        front.zoom = 1.0;

        let side = self.rig_mut(ViewKind::Side);
        side.position = center + dir_x * (distance + half.x);
        side.target = center;
        side.zoom = 1.0;

        self.request_render();
    }

    pub fn request_render(&mut self) {
        self.render_requested = true;
    }

    pub fn needs_render(&self) -> bool {
        self.mode == RenderMode::Continuous || self.render_requested
    }

    /// Draw main, then front, top and side with the resolved zoom.
    ///
    /// Returns false when on-demand mode had nothing to draw.
    pub fn render_frame(&mut self, mut draw: impl FnMut(&ViewportRig, f32)) -> bool {
        if !self.needs_render() {
            return false;
        }
        let zoom = self.resolve_zoom();
        let main = &self.rigs[ViewKind::Main.index()];
        draw(main, main.zoom);
        for kind in [ViewKind::Front, ViewKind::Top, ViewKind::Side] {
            let rig = self.rig_mut(kind);
            rig.zoom = zoom;
            draw(rig, zoom);
        }
        self.render_requested = false;
        self.frames_rendered += 1;
        true
    }

    /// Apply a container resize to one rig. Returns the snapped size.
    pub fn resize(&mut self, kind: ViewKind, width: u32, height: u32) -> (u32, u32) {
        let (width, height) = snap_size(width, height);
        let rig = self.rig_mut(kind);
        if (rig.width, rig.height) != (width, height) {
            rig.set_size(width, height);
            self.request_render();
        }
        (width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::Quat;
    use std::f32::consts::FRAC_PI_2;

    fn set(mode: RenderMode) -> ViewportSet {
        ViewportSet::new(20.0, 50.0, mode)
    }

    fn zooms(viewports: &mut ViewportSet, top: f32, front: f32, side: f32) {
        viewports.rig_mut(ViewKind::Top).zoom = top;
        viewports.rig_mut(ViewKind::Front).zoom = front;
        viewports.rig_mut(ViewKind::Side).zoom = side;
    }

    #[test]
    fn zoom_follows_the_agreeing_pair() {
        let mut viewports = set(RenderMode::Continuous);
        zooms(&mut viewports, 2.0, 2.0, 3.0);
        assert_eq!(viewports.resolve_zoom(), 2.0);
        zooms(&mut viewports, 3.0, 2.0, 2.0);
        assert_eq!(viewports.resolve_zoom(), 2.0);
        zooms(&mut viewports, 2.0, 3.0, 2.0);
        assert_eq!(viewports.resolve_zoom(), 2.0);
        zooms(&mut viewports, 1.5, 2.0, 3.0);
        assert_eq!(viewports.resolve_zoom(), 1.0);
    }

    #[test]
    fn render_frame_writes_resolved_zoom_back() {
        let mut viewports = set(RenderMode::Continuous);
        zooms(&mut viewports, 4.0, 4.0, 1.25);
        let mut order = Vec::new();
        viewports.render_frame(|rig, zoom| order.push((rig.kind, zoom)));
        assert_eq!(
            order,
            vec![
                (ViewKind::Main, 1.0),
                (ViewKind::Front, 4.0),
                (ViewKind::Top, 4.0),
                (ViewKind::Side, 4.0),
            ]
        );
        assert_eq!(viewports.rig(ViewKind::Side).zoom, 4.0);
    }

    #[test]
    fn on_demand_collapses_requests() {
        let mut viewports = set(RenderMode::OnDemand);
        assert!(viewports.render_frame(|_, _| {}));
        assert!(!viewports.render_frame(|_, _| {}));
        viewports.request_render();
        viewports.request_render();
        viewports.request_render();
        assert!(viewports.render_frame(|_, _| {}));
        assert!(!viewports.render_frame(|_, _| {}));
        assert_eq!(viewports.frames_rendered(), 2);
    }

    #[test]
    fn resize_snaps_to_steps() {
        let mut viewports = set(RenderMode::Continuous);
        assert_eq!(viewports.resize(ViewKind::Top, 643, 479), (640, 470));
        assert_eq!(viewports.rig(ViewKind::Top).width, 640);
        assert_eq!(snap_size(3, 9), (0, 0));
    }

    #[test]
    fn fly_to_frames_box_along_fixed_axes() {
        let mut viewports = set(RenderMode::OnDemand);
        viewports.render_frame(|_, _| {});
        zooms(&mut viewports, 3.0, 3.0, 3.0);

        let extent = LocalExtent::from_dimension(Vec3::new(2.0, 4.0, 1.0));
        let transform = Transform::from_xyz(10.0, 5.0, 0.5).with_rotation(Quat::from_rotation_z(FRAC_PI_2));
        viewports.fly_to(&extent, &transform);

        let center = Vec3::new(10.0, 5.0, 0.5);
        let top = viewports.rig(ViewKind::Top);
        assert!(top.position.distance(center + Vec3::Z * 50.5) < 1e-4);
        // box Y rotated onto world -X
        assert!(top.up.distance(Vec3::NEG_X) < 1e-4);

        let front = viewports.rig(ViewKind::Front);
        assert!(front.position.distance(center + Vec3::NEG_X * 52.0) < 1e-4);
        let side = viewports.rig(ViewKind::Side);
        assert!(side.position.distance(center + Vec3::Y * 51.0) < 1e-4);

        for kind in ViewKind::ORTHOGRAPHIC {
            assert_eq!(viewports.rig(kind).target, center);
            assert_eq!(viewports.rig(kind).zoom, 1.0);
        }
        assert!(viewports.needs_render());
    }

    #[test]
    fn ortho_zoom_is_linked() {
        let mut viewports = set(RenderMode::Continuous);
        viewports.zoom_view(ViewKind::Side, 2.0);
        assert_eq!(viewports.resolve_zoom(), 2.0);
        assert_eq!(viewports.rig(ViewKind::Top).zoom, 2.0);
    }
}
