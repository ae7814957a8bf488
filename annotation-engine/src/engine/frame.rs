/// Frame switching: read a frame's cloud from the cache, then diff its boxes against the entities
use super::AnnotationEngine;
use super::diff::FrameBox;
use super::events::EngineEvent;
use crate::error::{EngineError, Result};
use asset_cache::{AssetRequest, CacheError, CacheStore, ReadHandle};
use bevy::log::{debug, info, warn};
use pcd_decoder::DecodedPointCloud;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameData {
    /// Cache name of the frame's point cloud.
    pub point_cloud_asset: String,
    /// Where the cache fetches it from. Defaults to `<asset>.pcd`.
    #[serde(default)]
    pub point_cloud_url: Option<String>,
    #[serde(default)]
    pub boxes: Vec<FrameBox>,
}

impl FrameData {
    pub fn new(point_cloud_asset: impl Into<String>, boxes: Vec<FrameBox>) -> Self {
        Self {
            point_cloud_asset: point_cloud_asset.into(),
            point_cloud_url: None,
            boxes,
        }
    }

    pub fn url(&self) -> String {
        self.point_cloud_url
            .clone()
            .unwrap_or_else(|| format!("{}.pcd", self.point_cloud_asset))
    }

    pub fn asset_request(&self) -> AssetRequest {
        AssetRequest::new(self.point_cloud_asset.clone(), self.url())
    }
}

pub trait FrameDataProvider: Send + Sync {
    fn frame_count(&self) -> usize;
    fn frame(&self, index: usize) -> Option<FrameData>;
}

/// Frames listed in one JSON document: `{"frames": [{"point_cloud_asset": ..., "boxes": [...]}]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameList {
    pub frames: Vec<FrameData>,
}

impl FrameList {
    /// Cache requests for every frame's cloud, in frame order.
    pub fn asset_requests(&self) -> Vec<AssetRequest> {
        self.frames.iter().map(FrameData::asset_request).collect()
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&json).map_err(|e| EngineError::Config(e.to_string()))
    }
}

impl FrameDataProvider for FrameList {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn frame(&self, index: usize) -> Option<FrameData> {
        self.frames.get(index).cloned()
    }
}

struct PendingFrame {
    index: usize,
    boxes: Vec<FrameBox>,
    read: ReadHandle<Arc<DecodedPointCloud>>,
}

/// Tracks the displayed frame and at most one frame in flight.
#[derive(Default)]
pub struct FrameLoader {
    current: Option<usize>,
    pending: Option<PendingFrame>,
}

impl FrameLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn pending(&self) -> Option<usize> {
        self.pending.as_ref().map(|p| p.index)
    }

    /// Request a frame's cloud. A newer request replaces one still in flight.
    pub fn load_frame(&mut self, index: usize, data: FrameData, cache: &CacheStore) -> Result<()> {
        if self.current == Some(index) {
            return Err(EngineError::FrameAlreadyCurrent(index));
        }
        let read = cache.read_point(&data.point_cloud_asset);
        let superseded = self.pending.replace(PendingFrame {
            index,
            boxes: data.boxes,
            read,
        });
        if let Some(stale) = superseded {
            debug!("Frame {} superseded by frame {}", stale.index, index);
        }
        Ok(())
    }

    pub fn load_from(
        &mut self,
        provider: &dyn FrameDataProvider,
        index: usize,
        cache: &CacheStore,
    ) -> Result<()> {
        let data = provider.frame(index).ok_or(EngineError::UnknownFrame(index))?;
        self.load_frame(index, data, cache)
    }

    /// Non-blocking. Applies the pending frame once its cloud has been read.
    pub fn poll(&mut self, engine: &mut AnnotationEngine) -> Option<Result<usize>> {
        let outcome = self.pending.as_mut()?.read.try_take()?;
        let pending = self.pending.take()?;
        Some(self.finish(engine, pending.index, &pending.boxes, outcome))
    }

    /// Blocking variant of [`poll`](Self::poll) for tools and tests.
    pub fn wait(&mut self, engine: &mut AnnotationEngine) -> Option<Result<usize>> {
        let pending = self.pending.take()?;
        let outcome = pending.read.wait();
        Some(self.finish(engine, pending.index, &pending.boxes, outcome))
    }

    fn finish(
        &mut self,
        engine: &mut AnnotationEngine,
        index: usize,
        boxes: &[FrameBox],
        outcome: std::result::Result<Arc<DecodedPointCloud>, CacheError>,
    ) -> Result<usize> {
        match outcome {
            Ok(cloud) => {
                // The diff refreshes every box it keeps visible, against the new cloud.
                engine.swap_point_cloud(cloud);
                let summary = engine.diff_frame(boxes);
                self.current = Some(index);
                info!(
                    "Frame {} loaded: {} matched, {} ghosted",
                    index, summary.matched, summary.ghosted
                );
                engine.emit(EngineEvent::FrameLoaded { index });
                Ok(index)
            }
            Err(e) => {
                warn!("Frame {} failed to load: {}", index, e);
                engine.emit(EngineEvent::FrameLoadFailed {
                    index,
                    error: e.to_string(),
                });
                Err(EngineError::Cache(e))
            }
        }
    }
}
