use super::frames::Frames;
use super::{AnnotationPlugin, Cache, EngineSettings};
use crate::config::EngineConfig;
use crate::rpc::WebRpcPlugin;
use bevy::asset::AssetMetaCheck;
use bevy::prelude::*;
use bevy::window::PresentMode;

/// Build the annotation app from the engine config and, when given, a cache worker and frame
/// sequence. The engine itself is created at startup on the render device.
pub fn create_app(config: EngineConfig, cache: Option<Cache>, frames: Option<Frames>) -> App {
    let mut app = App::new();

    app.add_plugins(create_default_plugins())
        .insert_resource(ClearColor(Color::srgb(0.02, 0.02, 0.03)))
        .insert_resource(EngineSettings(config))
        .add_plugins(AnnotationPlugin)
        .add_plugins(WebRpcPlugin);

    if let Some(cache) = cache {
        app.insert_resource(cache);
    }
    if let Some(frames) = frames {
        app.insert_resource(frames);
    }
    app
}

fn create_default_plugins() -> impl PluginGroup {
    let window_config = WindowPlugin {
        primary_window: Some(create_window_config()),
        ..default()
    };

    let asset_config = AssetPlugin {
        meta_check: AssetMetaCheck::Never,
        ..default()
    };

    DefaultPlugins.set(window_config).set(asset_config)
}

fn create_window_config() -> Window {
    Window {
        title: "LiDAR annotation".into(),
        present_mode: PresentMode::AutoVsync,
        ..default()
    }
}
