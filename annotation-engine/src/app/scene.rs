/// Scene content drawn by bevy: the displayed cloud, box solids, gizmo outlines and labels
use super::Engine;
use super::viewports::{MAIN_LAYER, ORTHO_LAYER, SHARED_LAYER, ViewportCamera};
use crate::camera::rig::{ViewKind, ViewportRig};
use crate::engine::entity::{BoxEntity, LocalExtent};
use bevy::prelude::*;
use bevy::render::mesh::PrimitiveTopology;
use bevy::render::render_asset::RenderAssetUsages;
use bevy::render::view::{NoFrustumCulling, RenderLayers};
use bevy::ui::UiTargetCamera;
use bevy::window::PrimaryWindow;
use constants::render_settings::{ACTIVE_COLOR, GHOST_DASH_SIZE, LABEL_FONT_SIZE};
use pcd_decoder::DecodedPointCloud;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default, Reflect, GizmoConfigGroup)]
pub struct MainViewGizmos;

#[derive(Default, Reflect, GizmoConfigGroup)]
pub struct OrthoViewGizmos;

#[derive(Component)]
pub struct PointCloudMesh;

/// Solid body of one entity.
#[derive(Component)]
pub struct SolidBox(pub String);

/// Label text of one entity, drawn over the main view.
#[derive(Component)]
pub struct EntityLabel(pub String);

pub fn configure_gizmo_layers(mut config_store: ResMut<GizmoConfigStore>) {
    let (main, _) = config_store.config_mut::<MainViewGizmos>();
    main.render_layers = RenderLayers::layer(MAIN_LAYER);
    main.line.width = 2.0;
    let (ortho, _) = config_store.config_mut::<OrthoViewGizmos>();
    ortho.render_layers = RenderLayers::layer(ORTHO_LAYER);
    ortho.line.width = 1.5;
}

/// Vertex colors: intensity ramp when the cloud has one, height ramp otherwise.
pub fn point_colors(cloud: &DecodedPointCloud) -> Vec<[f32; 4]> {
    let (values, range) = if cloud.has_intensity() {
        (cloud.intensity.as_slice(), cloud.ranges.intensity)
    } else {
        (cloud.positions.as_slice(), cloud.ranges.z)
    };
    let stride = if cloud.has_intensity() { 1 } else { 3 };
    let offset = if cloud.has_intensity() { 0 } else { 2 };
    let span = range.span();

    (0..cloud.len())
        .map(|i| {
            let v = values.get(i * stride + offset).copied().unwrap_or(range.min);
            let t = if span > f32::EPSILON {
                ((v - range.min) / span).clamp(0.0, 1.0)
            } else {
                0.5
            };
            [0.25 + 0.75 * t, 0.4 + 0.6 * t, 1.0 - 0.5 * t, 1.0]
        })
        .collect()
}

pub fn create_point_cloud_mesh(cloud: &DecodedPointCloud) -> Mesh {
    let positions: Vec<[f32; 3]> = cloud
        .positions
        .chunks_exact(3)
        .map(|p| [p[0], p[1], p[2]])
        .collect();
    let mut mesh = Mesh::new(PrimitiveTopology::PointList, RenderAssetUsages::RENDER_WORLD);
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, point_colors(cloud));
    mesh
}

/// Rebuild the cloud mesh when the engine swaps its cloud.
pub fn update_point_cloud_mesh(
    mut commands: Commands,
    engine: Res<Engine>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    existing: Query<Entity, With<PointCloudMesh>>,
    mut shown: Local<Option<Arc<DecodedPointCloud>>>,
) {
    let current = engine.point_cloud();
    let unchanged = match (current, shown.as_ref()) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    };
    if unchanged {
        return;
    }

    for entity in &existing {
        commands.entity(entity).despawn();
    }
    *shown = current.cloned();
    let Some(cloud) = shown.as_ref() else {
        return;
    };

    commands.spawn((
        Mesh3d(meshes.add(create_point_cloud_mesh(cloud))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::WHITE,
            unlit: true,
            ..default()
        })),
        Transform::IDENTITY,
        NoFrustumCulling,
        RenderLayers::layer(SHARED_LAYER),
        PointCloudMesh,
    ));
    info!("Point cloud mesh rebuilt with {} points", cloud.len());
}

fn solid_transform(entity: &BoxEntity) -> Transform {
    let local = Transform::from_translation(entity.extent.center()).with_scale(entity.extent.size());
    entity.transform.mul_transform(local)
}

/// Keep one translucent cuboid per entity whose solid part is showing.
pub fn update_solid_boxes(
    mut commands: Commands,
    engine: Res<Engine>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut solids: Query<(Entity, &SolidBox, &mut Transform)>,
    mut unit_cube: Local<Option<Handle<Mesh>>>,
) {
    let mut wanted: HashMap<&str, &BoxEntity> = engine
        .entities()
        .iter()
        .filter(|e| e.parts(ViewKind::Main).solid || e.parts(ViewKind::Top).solid)
        .map(|e| (e.name.as_str(), e))
        .collect();

    for (id, solid, mut transform) in &mut solids {
        match wanted.remove(solid.0.as_str()) {
            Some(entity) => {
                let target = solid_transform(entity);
                if *transform != target {
                    *transform = target;
                }
            }
            None => commands.entity(id).despawn(),
        }
    }

    let cube = unit_cube
        .get_or_insert_with(|| meshes.add(Cuboid::new(1.0, 1.0, 1.0)))
        .clone();
    for entity in wanted.into_values() {
        let [r, g, b] = entity.color;
        commands.spawn((
            Mesh3d(cube.clone()),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: Color::srgba(r, g, b, 0.25),
                alpha_mode: AlphaMode::Blend,
                unlit: true,
                cull_mode: None,
                ..default()
            })),
            solid_transform(entity),
            RenderLayers::layer(MAIN_LAYER).with(ORTHO_LAYER),
            SolidBox(entity.name.clone()),
        ));
    }
}

/// Split `a..b` into dashes of length `dash` separated by equal gaps.
pub fn dashed_segments(a: Vec3, b: Vec3, dash: f32) -> Vec<(Vec3, Vec3)> {
    let length = a.distance(b);
    if dash <= 0.0 || length <= dash {
        return vec![(a, b)];
    }
    let dir = (b - a) / length;
    let mut segments = Vec::new();
    let mut t = 0.0;
    while t < length {
        let end = (t + dash).min(length);
        segments.push((a + dir * t, a + dir * end));
        t += dash * 2.0;
    }
    segments
}

fn outline_color(entity: &BoxEntity) -> Color {
    let [r, g, b] = if entity.active { ACTIVE_COLOR } else { entity.color };
    Color::srgb(r, g, b)
}

fn draw_outline<T: GizmoConfigGroup>(gizmos: &mut Gizmos<T>, entity: &BoxEntity, color: Color) {
    let corners = entity.world_corners();
    for (a, b) in LocalExtent::EDGES {
        gizmos.line(corners[a], corners[b], color);
    }
}

fn draw_heading<T: GizmoConfigGroup>(gizmos: &mut Gizmos<T>, entity: &BoxEntity, color: Color) {
    let center = entity.transform.transform_point(entity.extent.center());
    let half_depth = entity.dimension().y * 0.5;
    let forward = entity.transform.rotation * Vec3::Y;
    gizmos.arrow(center, center + forward * (half_depth + 1.0), color);
}

fn draw_parts<T: GizmoConfigGroup>(gizmos: &mut Gizmos<T>, entity: &BoxEntity, view: ViewKind) {
    let parts = entity.parts(view);
    let color = outline_color(entity);
    if parts.outline {
        draw_outline(gizmos, entity, color);
    }
    if parts.heading {
        draw_heading(gizmos, entity, color);
    }
    if parts.corners {
        for corner in entity.world_corners() {
            gizmos.sphere(Isometry3d::from_translation(corner), 0.08, color);
        }
    }
}

pub fn draw_entity_gizmos(
    engine: Res<Engine>,
    mut main_gizmos: Gizmos<MainViewGizmos>,
    mut ortho_gizmos: Gizmos<OrthoViewGizmos>,
) {
    for entity in engine.entities() {
        if entity.ghosted {
            let [r, g, b] = entity.color;
            let color = Color::srgba(r, g, b, 0.6);
            let corners = entity.world_corners();
            for (a, b) in LocalExtent::EDGES {
                for (start, end) in dashed_segments(corners[a], corners[b], GHOST_DASH_SIZE) {
                    main_gizmos.line(start, end, color);
                }
            }
            continue;
        }
        draw_parts(&mut main_gizmos, entity, ViewKind::Main);
        draw_parts(&mut ortho_gizmos, entity, ViewKind::Top);
    }

    main_gizmos.circle(
        Isometry3d::IDENTITY,
        engine.config().range_circle_radius,
        Color::srgba(0.6, 0.6, 0.6, 0.5),
    );
}

/// Main view pixel of an entity's label, at the box center.
/// None when the entity is not shown or the center falls outside the view.
pub fn label_pixel(rig: &ViewportRig, entity: &BoxEntity) -> Option<Vec2> {
    if entity.hidden || entity.ghosted || entity.label.is_empty() {
        return None;
    }
    let center = entity.transform.transform_point(entity.extent.center());
    let pixel = rig.world_to_pixel(center)?;
    let size = rig.pixel_size();
    let inside = pixel.x >= 0.0 && pixel.y >= 0.0 && pixel.x < size.x && pixel.y < size.y;
    inside.then_some(pixel)
}

/// Keep one text node per labelled entity, placed over its box in the main view.
pub fn update_entity_labels(
    mut commands: Commands,
    engine: Res<Engine>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(Entity, &ViewportCamera)>,
    mut labels: Query<(Entity, &EntityLabel, &mut Node, &mut Text, &mut TextColor)>,
) {
    let Some(main_camera) = cameras
        .iter()
        .find(|(_, view)| view.0 == ViewKind::Main)
        .map(|(id, _)| id)
    else {
        return;
    };
    // Rig pixels are physical, UI positions logical.
    let scale = windows.single().map(|w| w.scale_factor()).unwrap_or(1.0);
    let rig = engine.viewports().rig(ViewKind::Main);
    let mut wanted: HashMap<&str, (&BoxEntity, Vec2)> = engine
        .entities()
        .iter()
        .filter_map(|e| label_pixel(rig, e).map(|at| (e.name.as_str(), (e, at / scale))))
        .collect();

    for (id, label, mut node, mut text, mut color) in &mut labels {
        let Some((entity, at)) = wanted.remove(label.0.as_str()) else {
            commands.entity(id).despawn();
            continue;
        };
        if node.left != Val::Px(at.x) || node.top != Val::Px(at.y) {
            node.left = Val::Px(at.x);
            node.top = Val::Px(at.y);
        }
        if text.0 != entity.label {
            text.0 = entity.label.clone();
        }
        let target = outline_color(entity);
        if color.0 != target {
            color.0 = target;
        }
    }

    for (entity, at) in wanted.into_values() {
        commands.spawn((
            Text::new(entity.label.clone()),
            TextFont {
                font_size: LABEL_FONT_SIZE,
                ..default()
            },
            TextColor(outline_color(entity)),
            Node {
                position_type: PositionType::Absolute,
                left: Val::Px(at.x),
                top: Val::Px(at.y),
                ..default()
            },
            UiTargetCamera(main_camera),
            EntityLabel(entity.name.clone()),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashes_cover_half_the_edge() {
        let segments = dashed_segments(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 0.2);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].0, Vec3::new(0.4, 0.0, 0.0));
        let covered: f32 = segments.iter().map(|(a, b)| a.distance(*b)).sum();
        assert!((covered - 0.6).abs() < 1e-5);
    }

    #[test]
    fn short_edges_stay_solid() {
        let a = Vec3::ZERO;
        let b = Vec3::new(0.0, 0.1, 0.0);
        assert_eq!(dashed_segments(a, b, 0.2), vec![(a, b)]);
    }

    #[test]
    fn colors_follow_intensity() {
        let cloud = DecodedPointCloud::from_points(
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            vec![0.0, 10.0],
        );
        let colors = point_colors(&cloud);
        assert_eq!(colors.len(), 2);
        assert_eq!(colors[0], [0.25, 0.4, 1.0, 1.0]);
        assert_eq!(colors[1], [1.0, 1.0, 0.5, 1.0]);
    }

    #[test]
    fn flat_cloud_gets_a_neutral_color() {
        let cloud = DecodedPointCloud::from_points(vec![0.0, 0.0, 2.0], Vec::new());
        assert_eq!(point_colors(&cloud)[0][3], 1.0);
        assert_eq!(point_colors(&cloud).len(), 1);
    }

    #[test]
    fn labels_sit_over_shown_boxes_only() {
        use crate::engine::AnnotationEngine;
        use crate::engine::entity::BoxSpec;
        use crate::config::EngineConfig;

        let mut engine = AnnotationEngine::with_defaults(EngineConfig::default()).unwrap();
        engine.resize(ViewKind::Main, 800, 600);
        for (name, x) in [("near", 0.0), ("far", 500.0), ("gone", 2.0)] {
            engine
                .add_entity(BoxSpec::new(name, Vec3::new(x, 0.0, 0.75), Vec3::splat(1.5)))
                .unwrap();
        }
        engine.soft_delete("gone").unwrap();

        let rig = engine.viewports().rig(ViewKind::Main);
        let near = engine.entity("near").unwrap();
        let at = label_pixel(rig, near).unwrap();
        assert_eq!(Some(at), rig.world_to_pixel(Vec3::new(0.0, 0.0, 0.75)));
        assert!(label_pixel(rig, engine.entity("far").unwrap()).is_none());
        assert!(label_pixel(rig, engine.entity("gone").unwrap()).is_none());

        let mut blank = near.clone();
        blank.label.clear();
        assert!(label_pixel(rig, &blank).is_none());
    }
}
