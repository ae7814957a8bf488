/// Client side of the cache: sends commands, drains events, hands out reads
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::events::{CacheEvent, EventSubscribers, SubscriptionId};
use crate::fetch::AssetFetcher;
use crate::medium::StoreMedium;
use crate::records::{AssetRequest, ImageRecord, ImageRequest};
use crate::worker::{Command, Worker};
use pcd_decoder::DecodedPointCloud;
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::{mpsc as tokio_mpsc, oneshot};
use tracing::info;

/// Pending or settled answer to a read request.
pub struct ReadHandle<T> {
    state: ReadState<T>,
}

enum ReadState<T> {
    Waiting(oneshot::Receiver<Result<T>>),
    Settled(Result<T>),
    Taken,
}

impl<T> ReadHandle<T> {
    fn waiting(rx: oneshot::Receiver<Result<T>>) -> Self {
        Self {
            state: ReadState::Waiting(rx),
        }
    }

    fn settled(value: Result<T>) -> Self {
        Self {
            state: ReadState::Settled(value),
        }
    }

    /// Block the calling thread until the worker answers.
    ///
    /// Must not be called from inside an async runtime.
    pub fn wait(self) -> Result<T> {
        match self.state {
            ReadState::Waiting(rx) => rx.blocking_recv().unwrap_or(Err(CacheError::WorkerGone)),
            ReadState::Settled(value) => value,
            ReadState::Taken => Err(CacheError::WorkerGone),
        }
    }

    pub async fn recv(self) -> Result<T> {
        match self.state {
            ReadState::Waiting(rx) => rx.await.unwrap_or(Err(CacheError::WorkerGone)),
            ReadState::Settled(value) => value,
            ReadState::Taken => Err(CacheError::WorkerGone),
        }
    }

    /// Non-blocking poll for frame loops. Yields the answer at most once.
    pub fn try_take(&mut self) -> Option<Result<T>> {
        match std::mem::replace(&mut self.state, ReadState::Taken) {
            ReadState::Waiting(mut rx) => match rx.try_recv() {
                Ok(value) => Some(value),
                Err(oneshot::error::TryRecvError::Empty) => {
                    self.state = ReadState::Waiting(rx);
                    None
                }
                Err(oneshot::error::TryRecvError::Closed) => Some(Err(CacheError::WorkerGone)),
            },
            ReadState::Settled(value) => Some(value),
            ReadState::Taken => None,
        }
    }
}

struct Inbox {
    events: mpsc::Receiver<CacheEvent>,
    subscribers: EventSubscribers,
}

/// Handle to one cache worker. Dropping it stops the worker thread.
pub struct CacheStore {
    commands: tokio_mpsc::UnboundedSender<Command>,
    inbox: Mutex<Inbox>,
    handle: Option<JoinHandle<()>>,
    task_name: String,
}

impl CacheStore {
    /// Start a worker for `config.task_name`.
    ///
    /// With no medium the worker reports `NoAvailable` and every read answers `NotFound`.
    pub fn spawn(
        config: CacheConfig,
        medium: Option<Box<dyn StoreMedium>>,
        fetcher: Arc<dyn AssetFetcher>,
    ) -> Result<Self> {
        let (command_tx, command_rx) = tokio_mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel();
        let task_name = config.task_name.clone();

        let worker = Worker::new(config, medium, fetcher, event_tx);
        let handle = thread::Builder::new()
            .name("asset-cache-worker".into())
            .spawn(move || worker.run(command_rx))
            .map_err(|_| CacheError::WorkerGone)?;
        info!("Started cache worker for task '{}'", task_name);

        Ok(Self {
            commands: command_tx,
            inbox: Mutex::new(Inbox {
                events: event_rx,
                subscribers: EventSubscribers::default(),
            }),
            handle: Some(handle),
            task_name,
        })
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| CacheError::WorkerGone)
    }

    /// Fetch, decode and store every entry not already present.
    pub fn store_task(&self, points: Vec<AssetRequest>, images: Vec<ImageRequest>) -> Result<()> {
        self.send(Command::StoreTask { points, images })
    }

    /// Retry entries previously reported failed, overwriting any partial write.
    pub fn restore_task(&self, points: Vec<AssetRequest>, images: Vec<ImageRequest>) -> Result<()> {
        self.send(Command::RestoreTask { points, images })
    }

    /// Re-run the session lifecycle for another task on the same worker.
    pub fn switch_task(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.task_name = name.clone();
        self.send(Command::SwitchTask { name })
    }

    pub fn read_point(&self, name: &str) -> ReadHandle<Arc<DecodedPointCloud>> {
        let (reply, rx) = oneshot::channel();
        match self.send(Command::ReadPoint {
            name: name.to_string(),
            reply,
        }) {
            Ok(()) => ReadHandle::waiting(rx),
            Err(err) => ReadHandle::settled(Err(err)),
        }
    }

    pub fn read_image(&self, name: &str) -> ReadHandle<ImageRecord> {
        let (reply, rx) = oneshot::channel();
        match self.send(Command::ReadImage {
            name: name.to_string(),
            reply,
        }) {
            Ok(()) => ReadHandle::waiting(rx),
            Err(err) => ReadHandle::settled(Err(err)),
        }
    }

    fn inbox(&self) -> MutexGuard<'_, Inbox> {
        self.inbox.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(
        &self,
        callback: impl FnMut(&CacheEvent) + Send + 'static,
    ) -> SubscriptionId {
        self.inbox().subscribers.subscribe(Box::new(callback))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inbox().subscribers.unsubscribe(id)
    }

    /// Drain every event received so far, dispatching each to the subscribers.
    pub fn poll_events(&self) -> Vec<CacheEvent> {
        let mut inbox = self.inbox();
        let mut drained = Vec::new();
        loop {
            match inbox.events.try_recv() {
                Ok(event) => {
                    inbox.subscribers.dispatch(&event);
                    drained.push(event);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        drained
    }

    /// Block for the next event, dispatching it to the subscribers.
    pub fn wait_event(&self, timeout: Duration) -> Option<CacheEvent> {
        let mut inbox = self.inbox();
        match inbox.events.recv_timeout(timeout) {
            Ok(event) => {
                inbox.subscribers.dispatch(&event);
                Some(event)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CacheStore {
    fn drop(&mut self) {
        self.stop();
    }
}
