use crate::tools::draw::DrawMode;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    EntityAdded { name: String, pick_id: u32 },
    EntitySelected { name: String },
    EntityDeselected { name: String },
    /// Pose or size changed and the containment count was refreshed.
    EntityTransformed { name: String, contained_points: usize },
    EntitySoftDeleted { name: String },
    /// Soft deleted by a frame diff for lack of ground truth.
    EntityGhosted { name: String },
    EntityRestored { name: String },
    EntityDisposed { name: String },
    DrawModeChanged { mode: DrawMode },
    PointCloudSwapped { points: usize },
    FrameLoaded { index: usize },
    FrameLoadFailed { index: usize, error: String },
}

impl EngineEvent {
    pub fn entity_name(&self) -> Option<&str> {
        match self {
            Self::EntityAdded { name, .. }
            | Self::EntitySelected { name }
            | Self::EntityDeselected { name }
            | Self::EntityTransformed { name, .. }
            | Self::EntitySoftDeleted { name }
            | Self::EntityGhosted { name }
            | Self::EntityRestored { name }
            | Self::EntityDisposed { name } => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&EngineEvent) + Send + Sync>;

/// Listeners owned by the engine, called in subscription order.
#[derive(Default)]
pub struct EngineSubscribers {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

impl EngineSubscribers {
    pub fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        before != self.listeners.len()
    }

    pub fn emit(&mut self, event: &EngineEvent) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
