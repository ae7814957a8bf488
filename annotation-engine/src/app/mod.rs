//! Bevy shell: four camera viewports driven by the engine's rigs, pointer and keyboard
//! routing, cache event draining, gizmo drawing and labels of the entities.

pub mod frames;
pub mod gpu_pick;
pub mod input;
pub mod scene;
pub mod setup;
pub mod viewports;

use crate::config::EngineConfig;
use crate::engine::AnnotationEngine;
use crate::engine::category::CategoryTable;
use asset_cache::CacheStore;
use bevy::prelude::*;
use bevy::render::renderer::{RenderDevice, RenderQueue};
use gpu_pick::GpuPickRasterizer;

/// The engine as a bevy resource.
#[derive(Resource, Deref, DerefMut)]
pub struct Engine(pub AnnotationEngine);

/// The cache worker handle as a bevy resource.
#[derive(Resource, Deref)]
pub struct Cache(pub CacheStore);

/// Configuration the engine is built from once the render device exists.
#[derive(Resource, Deref)]
pub struct EngineSettings(pub EngineConfig);

pub struct AnnotationPlugin;

/// Build the engine on the GPU rasterizer. Without a render device the app exits.
pub fn init_engine(
    mut commands: Commands,
    settings: Res<EngineSettings>,
    device: Option<Res<RenderDevice>>,
    queue: Option<Res<RenderQueue>>,
    mut exit: EventWriter<AppExit>,
) {
    let rasterizer = GpuPickRasterizer::new(device.as_deref(), queue.as_deref());
    let categories = CategoryTable::new(settings.categories.clone());
    match AnnotationEngine::new(settings.0.clone(), Box::new(rasterizer), Box::new(categories)) {
        Ok(engine) => commands.insert_resource(Engine(engine)),
        Err(e) => {
            error!("Annotation engine failed to start: {}", e);
            exit.write(AppExit::error());
        }
    }
}

impl Plugin for AnnotationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<viewports::ViewportLayout>()
            .init_gizmo_group::<scene::MainViewGizmos>()
            .init_gizmo_group::<scene::OrthoViewGizmos>()
            .add_systems(PreStartup, init_engine)
            .add_systems(
                Startup,
                (
                    viewports::spawn_viewport_cameras,
                    scene::configure_gizmo_layers,
                    frames::request_frame_assets,
                )
                    .run_if(resource_exists::<Engine>),
            )
            .add_systems(
                Update,
                (
                    viewports::layout_viewports,
                    input::pointer_input,
                    input::keyboard_input,
                    frames::drain_cache_events,
                    frames::poll_frame_loader,
                    viewports::render_tick,
                    scene::update_point_cloud_mesh,
                    scene::update_solid_boxes,
                    scene::draw_entity_gizmos,
                    scene::update_entity_labels,
                )
                    .chain()
                    .run_if(resource_exists::<Engine>),
            );
    }
}
