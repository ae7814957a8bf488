/// Worker notifications and the subscriber list that receives them
use crate::error::CacheError;

#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    /// Session lifecycle finished, eviction included.
    Ready { task: String },
    /// No storage medium. The store is a no-op whose reads report `NotFound`.
    NoAvailable { error: CacheError },
    /// Worker level failure not tied to one asset.
    Error { message: String },
    /// A fetch failed. Always followed by the matching `*StoreFailed` event.
    NetworkError {
        name: String,
        url: String,
        reason: String,
    },
    TaskDbCreated { task: String },
    TaskEvicted { task: String },
    PointStored { name: String, already_stored: bool },
    PointStoreFailed { name: String, error: CacheError },
    ImageStored { name: String, already_stored: bool },
    ImageStoreFailed { name: String, error: CacheError },
}

impl CacheEvent {
    /// Asset name carried by per-asset events.
    pub fn asset_name(&self) -> Option<&str> {
        match self {
            Self::PointStored { name, .. }
            | Self::PointStoreFailed { name, .. }
            | Self::ImageStored { name, .. }
            | Self::ImageStoreFailed { name, .. }
            | Self::NetworkError { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&CacheEvent) + Send>;

/// Explicit subscriber list, dispatched in subscription order.
#[derive(Default)]
pub struct EventSubscribers {
    next_id: u64,
    callbacks: Vec<(SubscriptionId, Callback)>,
}

impl EventSubscribers {
    pub fn subscribe(&mut self, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, callback));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(existing, _)| *existing != id);
        self.callbacks.len() != before
    }

    pub fn dispatch(&mut self, event: &CacheEvent) {
        for (_, callback) in self.callbacks.iter_mut() {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}
