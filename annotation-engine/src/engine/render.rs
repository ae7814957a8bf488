use super::commands::CommandQueue;
use super::entity::BoxEntity;
use crate::camera::rig::ViewportRig;
use pcd_decoder::DecodedPointCloud;

/// Read-only scene handed to the renderer for one frame.
pub struct SceneView<'a> {
    pub entities: &'a [BoxEntity],
    pub cloud: Option<&'a DecodedPointCloud>,
    pub active: Option<&'a str>,
    /// Mutations raised while drawing go here and are applied after the frame.
    pub commands: &'a CommandQueue,
}

pub trait FrameRenderer {
    fn render_view(&mut self, rig: &ViewportRig, zoom: f32, scene: &SceneView<'_>);
}
