use crate::camera::rig::BasePlane;
use crate::camera::sync::RenderMode;
use crate::engine::category::{CategoryEntry, builtin_entries};
use crate::error::{EngineError, Result};
use crate::tools::draw::DrawMode;
use constants::render_settings::{
    DEFAULT_BOX_DIMENSION, ORTHO_STANDOFF_DISTANCE, ORTHO_VIEW_SIZE, RANGE_CIRCLE_RADIUS,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Runtime settings of the annotation engine. Every field is optional in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub base_plane: BasePlane,
    pub default_dimension: [f32; 3],
    pub default_category: String,
    pub render_mode: RenderMode,
    pub draw_mode: DrawMode,
    pub ortho_view_size: f32,
    pub ortho_distance: f32,
    pub range_circle_radius: f32,
    pub categories: Vec<CategoryEntry>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_plane: BasePlane::default(),
            default_dimension: DEFAULT_BOX_DIMENSION,
            default_category: "car".to_string(),
            render_mode: RenderMode::default(),
            draw_mode: DrawMode::default(),
            ortho_view_size: ORTHO_VIEW_SIZE,
            ortho_distance: ORTHO_STANDOFF_DISTANCE,
            range_circle_radius: RANGE_CIRCLE_RADIUS,
            categories: builtin_entries(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "render_mode": "on_demand", "base_plane": { "normal": [0, 0, 1], "constant": -1.5 } }"#,
        )
        .unwrap();
        assert_eq!(config.render_mode, RenderMode::OnDemand);
        assert_eq!(config.base_plane.constant, -1.5);
        assert_eq!(config.ortho_view_size, ORTHO_VIEW_SIZE);
        assert_eq!(config.draw_mode, DrawMode::None);
        assert!(!config.categories.is_empty());
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            EngineConfig::from_json_str("{ nope"),
            Err(EngineError::Config(_))
        ));
    }
}
