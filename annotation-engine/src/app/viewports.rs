use super::Engine;
use crate::camera::rig::{self, ViewKind, ViewportRig};
use crate::engine::render::{FrameRenderer, SceneView};
use bevy::prelude::*;
use bevy::render::camera::{ScalingMode, Viewport};
use bevy::render::view::RenderLayers;
use bevy::window::PrimaryWindow;

/// Cloud mesh, seen by every camera.
pub const SHARED_LAYER: usize = 0;
pub const MAIN_LAYER: usize = 1;
pub const ORTHO_LAYER: usize = 2;

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportCamera(pub ViewKind);

/// Where each view sits in the window, in physical pixels.
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub struct ViewportLayout {
    window: UVec2,
    rects: Vec<(ViewKind, URect)>,
}

impl ViewportLayout {
    /// Main takes the left two thirds. Top, front and side stack on the right.
    pub fn compute(window: UVec2) -> Self {
        let main_width = window.x * 2 / 3;
        let side_width = window.x - main_width;
        let row = window.y / 3;

        let mut rects = vec![(
            ViewKind::Main,
            URect::new(0, 0, main_width, window.y),
        )];
        for (i, kind) in [ViewKind::Top, ViewKind::Front, ViewKind::Side].into_iter().enumerate() {
            let top = row * i as u32;
            let bottom = if i == 2 { window.y } else { top + row };
            rects.push((kind, URect::new(main_width, top, main_width + side_width, bottom)));
        }
        Self { window, rects }
    }

    pub fn rect(&self, kind: ViewKind) -> Option<URect> {
        self.rects.iter().find(|(k, _)| *k == kind).map(|(_, r)| *r)
    }

    /// View under a physical cursor position and the pixel inside that view.
    pub fn hit(&self, cursor: Vec2) -> Option<(ViewKind, Vec2)> {
        self.rects.iter().find_map(|(kind, rect)| {
            let min = rect.min.as_vec2();
            let max = rect.max.as_vec2();
            let inside = cursor.x >= min.x && cursor.y >= min.y && cursor.x < max.x && cursor.y < max.y;
            inside.then(|| (*kind, cursor - min))
        })
    }

    fn snap(&mut self, kind: ViewKind, size: (u32, u32)) {
        if let Some((_, rect)) = self.rects.iter_mut().find(|(k, _)| *k == kind) {
            rect.max = rect.min + UVec2::new(size.0, size.1);
        }
    }
}

/// Draw order: main, front, top, side.
fn camera_order(kind: ViewKind) -> isize {
    match kind {
        ViewKind::Main => 0,
        ViewKind::Front => 1,
        ViewKind::Top => 2,
        ViewKind::Side => 3,
    }
}

pub fn spawn_viewport_cameras(mut commands: Commands, engine: Res<Engine>) {
    for kind in ViewKind::ALL {
        let rig = engine.viewports().rig(kind);
        let layer = if kind.is_orthographic() {
            ORTHO_LAYER
        } else {
            MAIN_LAYER
        };
        commands.spawn((
            Camera3d::default(),
            Camera {
                order: camera_order(kind),
                clear_color: if kind == ViewKind::Main {
                    ClearColorConfig::Default
                } else {
                    ClearColorConfig::Custom(Color::srgb(0.05, 0.05, 0.08))
                },
                ..default()
            },
            camera_transform(rig),
            camera_projection(rig, rig.zoom),
            RenderLayers::layer(SHARED_LAYER).with(layer),
            ViewportCamera(kind),
        ));
    }
    info!("Spawned {} viewport cameras", ViewKind::ALL.len());
}

pub fn camera_transform(rig: &ViewportRig) -> Transform {
    Transform::from_translation(rig.position).looking_at(rig.target, rig.up)
}

pub fn camera_projection(rig: &ViewportRig, zoom: f32) -> Projection {
    match rig.projection {
        rig::Projection::Perspective {
            fov_y_degrees,
            near,
            far,
        } => Projection::Perspective(PerspectiveProjection {
            fov: fov_y_degrees.to_radians(),
            near,
            far,
            aspect_ratio: rig.aspect(),
        }),
        rig::Projection::Orthographic { size, near, far } => {
            Projection::Orthographic(OrthographicProjection {
                near,
                far,
                scaling_mode: ScalingMode::FixedVertical {
                    viewport_height: size,
                },
                scale: 1.0 / zoom.max(f32::EPSILON),
                ..OrthographicProjection::default_3d()
            })
        }
    }
}

/// Recompute the quadrant layout when the window changes and hand snapped sizes to the rigs.
pub fn layout_viewports(
    windows: Query<&Window, With<PrimaryWindow>>,
    mut layout: ResMut<ViewportLayout>,
    mut engine: ResMut<Engine>,
    mut cameras: Query<(&ViewportCamera, &mut Camera)>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let size = window.physical_size();
    if size == layout.window || size.x == 0 || size.y == 0 {
        return;
    }

    let mut next = ViewportLayout::compute(size);
    for kind in ViewKind::ALL {
        let Some(rect) = next.rect(kind) else {
            continue;
        };
        let snapped = engine.resize(kind, rect.width(), rect.height());
        next.snap(kind, snapped);
    }
    for (view, mut camera) in &mut cameras {
        if let Some(rect) = next.rect(view.0) {
            camera.viewport = Some(Viewport {
                physical_position: rect.min,
                physical_size: rect.size().max(UVec2::ONE),
                ..default()
            });
        }
    }
    debug!("Viewport layout for {}x{}", size.x, size.y);
    *layout = next;
}

/// Rig poses taken during one engine frame.
#[derive(Default)]
struct PoseCollector {
    poses: Vec<(ViewKind, Transform, Projection)>,
}

impl FrameRenderer for PoseCollector {
    fn render_view(&mut self, rig: &ViewportRig, zoom: f32, _scene: &SceneView<'_>) {
        self.poses
            .push((rig.kind, camera_transform(rig), camera_projection(rig, zoom)));
    }
}

/// Per-frame render tick. In on-demand mode cameras only move when a render was requested.
pub fn render_tick(
    mut engine: ResMut<Engine>,
    mut cameras: Query<(&ViewportCamera, &mut Transform, &mut Projection)>,
) {
    let mut collector = PoseCollector::default();
    if !engine.render_frame(&mut collector) {
        return;
    }
    for (view, mut transform, mut projection) in &mut cameras {
        if let Some((_, pose, lens)) = collector.poses.iter().find(|(kind, ..)| *kind == view.0) {
            *transform = *pose;
            *projection = lens.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_covers_the_window_without_overlap() {
        let layout = ViewportLayout::compute(UVec2::new(1200, 900));
        let main = layout.rect(ViewKind::Main).unwrap();
        let top = layout.rect(ViewKind::Top).unwrap();
        let side = layout.rect(ViewKind::Side).unwrap();
        assert_eq!(main.width(), 800);
        assert_eq!(top.min, UVec2::new(800, 0));
        assert_eq!(side.max, UVec2::new(1200, 900));
    }

    #[test]
    fn cursor_maps_into_the_view_under_it() {
        let layout = ViewportLayout::compute(UVec2::new(1200, 900));
        assert_eq!(
            layout.hit(Vec2::new(850.0, 310.0)),
            Some((ViewKind::Front, Vec2::new(50.0, 10.0)))
        );
        assert_eq!(layout.hit(Vec2::new(1300.0, 10.0)), None);
    }

    #[test]
    fn orthographic_projection_follows_zoom() {
        let rig = ViewportRig::orthographic(ViewKind::Top, 20.0, 50.0);
        let Projection::Orthographic(ortho) = camera_projection(&rig, 2.0) else {
            panic!("expected an orthographic lens");
        };
        assert_eq!(ortho.scale, 0.5);
    }
}
