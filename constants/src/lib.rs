//! Shared tunables for the decoder, the asset cache and the annotation engine.

pub mod cache;
pub mod category;
pub mod coordinate_system;
pub mod picking;
pub mod render_settings;
