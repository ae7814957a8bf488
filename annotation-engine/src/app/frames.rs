use super::{Cache, Engine};
use crate::engine::frame::{FrameDataProvider, FrameList, FrameLoader};
use crate::error::EngineError;
use asset_cache::CacheEvent;
use bevy::prelude::*;

/// Frame sequence being annotated and the loader switching between its frames.
#[derive(Resource)]
pub struct Frames {
    pub list: FrameList,
    pub loader: FrameLoader,
    /// Frame to retry once its cloud lands in the cache.
    pub wanted: Option<usize>,
}

impl Frames {
    pub fn new(list: FrameList) -> Self {
        Self {
            list,
            loader: FrameLoader::new(),
            wanted: None,
        }
    }

    /// Index `step` frames away from the current one, clamped to the sequence.
    pub fn step_from_current(&self, step: isize) -> Option<usize> {
        let count = self.list.frame_count();
        if count == 0 {
            return None;
        }
        let current = self.loader.pending().or(self.loader.current()).unwrap_or(0) as isize;
        let next = (current + step).clamp(0, count as isize - 1) as usize;
        Some(next)
    }

    pub fn request(&mut self, index: usize, cache: &Cache) {
        match self.loader.load_from(&self.list, index, cache) {
            Ok(()) => {
                self.wanted = Some(index);
                debug!("Requested frame {}", index);
            }
            Err(EngineError::FrameAlreadyCurrent(_)) => {}
            Err(e) => warn!("Cannot load frame {}: {}", index, e),
        }
    }
}

/// Queue every frame's cloud with the cache worker, then ask for the first frame.
pub fn request_frame_assets(frames: Option<ResMut<Frames>>, cache: Option<Res<Cache>>) {
    let (Some(mut frames), Some(cache)) = (frames, cache) else {
        return;
    };
    let requests = frames.list.asset_requests();
    if requests.is_empty() {
        return;
    }
    info!(
        "Storing {} frame clouds for task '{}'",
        requests.len(),
        cache.task_name()
    );
    if let Err(e) = cache.store_task(requests, Vec::new()) {
        error!("Cache worker refused the frame assets: {}", e);
        return;
    }
    frames.request(0, &cache);
}

pub fn drain_cache_events(mut frames: Option<ResMut<Frames>>, cache: Option<Res<Cache>>) {
    let Some(cache) = cache else {
        return;
    };
    for event in cache.poll_events() {
        match &event {
            CacheEvent::Ready { task } => info!("Cache ready for task '{}'", task),
            CacheEvent::NoAvailable { error } => warn!("Cache unavailable: {}", error),
            CacheEvent::Error { message } => error!("Cache worker error: {}", message),
            CacheEvent::NetworkError { name, url, reason } => {
                warn!("Fetching '{}' from {} failed: {}", name, url, reason)
            }
            CacheEvent::TaskDbCreated { task } => debug!("Created task store '{}'", task),
            CacheEvent::TaskEvicted { task } => info!("Evicted task '{}'", task),
            CacheEvent::PointStored {
                name,
                already_stored,
            } => {
                debug!("Stored cloud '{}' (already stored: {})", name, already_stored);
                if let Some(frames) = frames.as_deref_mut() {
                    retry_wanted(frames, name, &cache);
                }
            }
            CacheEvent::PointStoreFailed { name, error } => {
                warn!("Storing cloud '{}' failed: {}", name, error)
            }
            CacheEvent::ImageStored { name, .. } => debug!("Stored image '{}'", name),
            CacheEvent::ImageStoreFailed { name, error } => {
                warn!("Storing image '{}' failed: {}", name, error)
            }
        }
    }
}

/// A wanted frame that is neither current nor pending failed earlier. Try again.
fn retry_wanted(frames: &mut Frames, stored: &str, cache: &Cache) {
    let Some(index) = frames.wanted else {
        return;
    };
    if frames.loader.current() == Some(index) || frames.loader.pending().is_some() {
        return;
    }
    let matches = frames
        .list
        .frame(index)
        .is_some_and(|data| data.point_cloud_asset == stored);
    if matches {
        frames.request(index, cache);
    }
}

/// Apply a frame whose cloud arrived. PageDown/PageUp step through the sequence.
pub fn poll_frame_loader(
    frames: Option<ResMut<Frames>>,
    cache: Option<Res<Cache>>,
    keyboard: Res<ButtonInput<KeyCode>>,
    mut engine: ResMut<Engine>,
) {
    let (Some(mut frames), Some(cache)) = (frames, cache) else {
        return;
    };

    let step = if keyboard.any_just_pressed([KeyCode::PageDown, KeyCode::KeyN]) {
        1
    } else if keyboard.any_just_pressed([KeyCode::PageUp, KeyCode::KeyP]) {
        -1
    } else {
        0
    };
    if step != 0 {
        if let Some(index) = frames.step_from_current(step) {
            frames.request(index, &cache);
        }
    }

    match frames.loader.poll(&mut engine) {
        Some(Ok(index)) => info!("Showing frame {}", index),
        Some(Err(e)) => debug!("Frame not ready: {}", e),
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::frame::FrameData;

    fn frames(count: usize) -> Frames {
        Frames::new(FrameList {
            frames: (0..count)
                .map(|i| FrameData::new(format!("frame-{i}"), Vec::new()))
                .collect(),
        })
    }

    #[test]
    fn stepping_is_clamped_to_the_sequence() {
        let frames = frames(3);
        assert_eq!(frames.step_from_current(-1), Some(0));
        assert_eq!(frames.step_from_current(5), Some(2));
        assert_eq!(Frames::new(FrameList::default()).step_from_current(1), None);
    }
}
