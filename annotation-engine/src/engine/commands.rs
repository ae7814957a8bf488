//! Mutations raised while a frame is being drawn, applied once the frame is done.
use super::entity::BoxSpec;
use crate::tools::manipulation::TransformOp;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    Add(BoxSpec),
    Select(String),
    Deselect,
    Transform { name: String, op: TransformOp },
    SoftDelete(String),
    Restore(String),
    Dispose(String),
}

/// Shared handle. Clones push into the same queue.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    pending: Arc<Mutex<Vec<EngineCommand>>>,
}

impl CommandQueue {
    fn lock(&self) -> MutexGuard<'_, Vec<EngineCommand>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, command: EngineCommand) {
        self.lock().push(command);
    }

    /// Take everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<EngineCommand> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
