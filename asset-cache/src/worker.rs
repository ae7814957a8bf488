//! The cache worker: one OS thread running a current-thread tokio runtime.
//!
//! Commands arrive on an unbounded channel. Fetch and decode run on the
//! runtime's blocking pool; every medium mutation happens here, on the worker
//! itself, as completions are joined. Each completion carries the generation it
//! was started under, and completions from an older generation are dropped.

use crate::config::CacheConfig;
use crate::error::{CacheError, Result, StoreError, StoreResult};
use crate::events::CacheEvent;
use crate::fetch::{AssetFetcher, FetchError};
use crate::medium::{DatabaseSchema, StoreMedium, StoreSchema};
use crate::records::{AssetRequest, ImageRecord, ImageRequest, PointRecord};
use crate::registry::TaskRegistry;
use constants::cache::IMAGE_INDICES;
use pcd_decoder::DecodedPointCloud;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc;
use tokio::sync::{mpsc as tokio_mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub(crate) type PointReply = oneshot::Sender<Result<Arc<DecodedPointCloud>>>;
pub(crate) type ImageReply = oneshot::Sender<Result<ImageRecord>>;

pub(crate) enum Command {
    StoreTask {
        points: Vec<AssetRequest>,
        images: Vec<ImageRequest>,
    },
    RestoreTask {
        points: Vec<AssetRequest>,
        images: Vec<ImageRequest>,
    },
    ReadPoint {
        name: String,
        reply: PointReply,
    },
    ReadImage {
        name: String,
        reply: ImageReply,
    },
    SwitchTask {
        name: String,
    },
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Pending,
    Stored,
    Failed,
}

enum Payload {
    Point(PointRecord),
    Image(ImageRecord),
}

struct Completion {
    generation: u64,
    name: String,
    is_image: bool,
    overwrite: bool,
    result: Result<Payload>,
}

/// Per-kind bookkeeping: entry states plus the single waiter allowed per name.
struct Entries<T> {
    states: HashMap<String, EntryState>,
    waiters: HashMap<String, oneshot::Sender<Result<T>>>,
}

impl<T> Default for Entries<T> {
    fn default() -> Self {
        Self {
            states: HashMap::new(),
            waiters: HashMap::new(),
        }
    }
}

impl<T> Entries<T> {
    /// A waiter whose reader was dropped no longer holds the name.
    fn has_live_waiter(&self, name: &str) -> bool {
        self.waiters.get(name).is_some_and(|w| !w.is_closed())
    }

    /// Names a restore should fetch again: failed this session, or never seen and absent
    /// from the medium.
    fn needs_restore(&self, name: &str, stored: &[String]) -> bool {
        match self.states.get(name) {
            Some(EntryState::Failed) => true,
            Some(EntryState::Pending | EntryState::Stored) => false,
            None => !stored.iter().any(|s| s == name),
        }
    }

    fn resolve(&mut self, name: &str, value: Result<T>) {
        if let Some(waiter) = self.waiters.remove(name) {
            let _ = waiter.send(value);
        }
    }

    fn clear(&mut self) {
        for (name, waiter) in self.waiters.drain() {
            let _ = waiter.send(Err(CacheError::NotFound(name)));
        }
        self.states.clear();
    }
}

pub(crate) struct Worker {
    config: CacheConfig,
    medium: Option<Box<dyn StoreMedium>>,
    fetcher: Arc<dyn AssetFetcher>,
    events: mpsc::Sender<CacheEvent>,
    registry: Option<TaskRegistry>,
    task_db_open: bool,
    generation: u64,
    points: Entries<Arc<DecodedPointCloud>>,
    images: Entries<ImageRecord>,
    jobs: JoinSet<Completion>,
}

impl Worker {
    pub fn new(
        config: CacheConfig,
        medium: Option<Box<dyn StoreMedium>>,
        fetcher: Arc<dyn AssetFetcher>,
        events: mpsc::Sender<CacheEvent>,
    ) -> Self {
        Self {
            config,
            medium,
            fetcher,
            events,
            registry: None,
            task_db_open: false,
            generation: 0,
            points: Entries::default(),
            images: Entries::default(),
            jobs: JoinSet::new(),
        }
    }

    /// Thread entry point.
    pub fn run(self, commands: tokio_mpsc::UnboundedReceiver<Command>) {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = self.events.send(CacheEvent::Error {
                    message: format!("failed to start cache runtime: {err}"),
                });
                return;
            }
        };
        runtime.block_on(self.serve(commands));
        // Blocking fetches still running belong to a finished session.
        runtime.shutdown_background();
    }

    async fn serve(mut self, mut commands: tokio_mpsc::UnboundedReceiver<Command>) {
        self.open_session();
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    None | Some(Command::Shutdown) => break,
                    Some(command) => self.handle(command),
                },
                Some(joined) = self.jobs.join_next(), if !self.jobs.is_empty() => match joined {
                    Ok(completion) => self.complete(completion),
                    Err(err) => self.emit(CacheEvent::Error {
                        message: format!("cache job aborted: {err}"),
                    }),
                },
            }
        }
        debug!("Cache worker for '{}' stopped", self.config.task_name);
    }

    fn emit(&self, event: CacheEvent) {
        let _ = self.events.send(event);
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::StoreTask { points, images } => self.store_task(points, images),
            Command::RestoreTask { points, images } => {
                if self.medium.is_none() {
                    return;
                }
                if let Err(err) = self.ensure_task_db() {
                    self.emit(CacheEvent::Error {
                        message: err.to_string(),
                    });
                    return;
                }
                let stored_points = self.stored_keys(&self.config.points_store);
                for request in points {
                    if self.points.needs_restore(&request.name, &stored_points) {
                        self.spawn_point(request, true);
                    }
                }
                let stored_images = self.stored_keys(&self.config.images_store);
                for request in images {
                    if self.images.needs_restore(&request.name, &stored_images) {
                        self.spawn_image(request, true);
                    }
                }
            }
            Command::ReadPoint { name, reply } => self.read_point(name, reply),
            Command::ReadImage { name, reply } => self.read_image(name, reply),
            Command::SwitchTask { name } => {
                self.generation += 1;
                self.points.clear();
                self.images.clear();
                self.task_db_open = false;
                info!("Switching cache task '{}' -> '{}'", self.config.task_name, name);
                self.config.task_name = name;
                self.open_session();
            }
            Command::Shutdown => {}
        }
    }

    /// Registry open plus eviction, before any fetch of this task begins.
    fn open_session(&mut self) {
        let Some(medium) = self.medium.as_deref_mut() else {
            self.emit(CacheEvent::NoAvailable {
                error: CacheError::StorageUnavailable,
            });
            return;
        };

        let registry = match TaskRegistry::open(medium, &self.config) {
            Ok(registry) => registry,
            Err(err) => {
                warn!("Task registry unavailable, cache disabled: {err}");
                self.medium = None;
                self.emit(CacheEvent::Error {
                    message: err.to_string(),
                });
                self.emit(CacheEvent::NoAvailable {
                    error: CacheError::StorageUnavailable,
                });
                return;
            }
        };

        let task = self.config.task_name.clone();
        match registry.evict_for(medium, &task, self.config.effective_limit()) {
            Ok(evicted) => {
                for task in evicted {
                    self.emit(CacheEvent::TaskEvicted { task });
                }
            }
            Err(err) => self.emit(CacheEvent::Error {
                message: format!("eviction failed: {err}"),
            }),
        }
        self.registry = Some(registry);
        self.emit(CacheEvent::Ready { task });
    }

    fn task_schema(&self) -> DatabaseSchema {
        DatabaseSchema {
            version: self.config.db_version,
            stores: vec![
                StoreSchema {
                    name: self.config.points_store.clone(),
                    key_path: "name".to_string(),
                    indices: Vec::new(),
                },
                StoreSchema {
                    name: self.config.images_store.clone(),
                    key_path: "name".to_string(),
                    indices: IMAGE_INDICES.iter().map(|s| s.to_string()).collect(),
                },
            ],
        }
    }

    /// Open the task database and register the task on first use.
    fn ensure_task_db(&mut self) -> StoreResult<()> {
        if self.task_db_open {
            return Ok(());
        }
        let schema = self.task_schema();
        let task = self.config.task_name.clone();
        let (Some(medium), Some(registry)) = (self.medium.as_deref_mut(), self.registry.as_ref())
        else {
            return Err(StoreError::NoSuchDatabase(task));
        };

        medium.open_database(&task, &schema)?;
        if !registry.contains(medium, &task)? {
            registry.record(medium, &task)?;
        }
        self.task_db_open = true;
        self.emit(CacheEvent::TaskDbCreated { task });
        Ok(())
    }

    fn stored_keys(&self, store: &str) -> Vec<String> {
        self.medium
            .as_deref()
            .and_then(|m| m.keys(&self.config.task_name, store).ok())
            .unwrap_or_default()
    }

    fn store_task(&mut self, points: Vec<AssetRequest>, images: Vec<ImageRequest>) {
        if self.medium.is_none() {
            return;
        }
        if let Err(err) = self.ensure_task_db() {
            self.emit(CacheEvent::Error {
                message: format!("cannot open task database: {err}"),
            });
            return;
        }

        let stored_points = self.stored_keys(&self.config.points_store);
        for request in points {
            if stored_points.contains(&request.name) {
                self.points.states.insert(request.name.clone(), EntryState::Stored);
                self.emit(CacheEvent::PointStored {
                    name: request.name,
                    already_stored: true,
                });
            } else if self.points.states.get(&request.name) != Some(&EntryState::Pending) {
                self.spawn_point(request, false);
            }
        }

        let stored_images = self.stored_keys(&self.config.images_store);
        for request in images {
            if stored_images.contains(&request.name) {
                self.images.states.insert(request.name.clone(), EntryState::Stored);
                self.emit(CacheEvent::ImageStored {
                    name: request.name,
                    already_stored: true,
                });
            } else if self.images.states.get(&request.name) != Some(&EntryState::Pending) {
                self.spawn_image(request, false);
            }
        }
    }

    fn spawn_point(&mut self, request: AssetRequest, overwrite: bool) {
        self.points.states.insert(request.name.clone(), EntryState::Pending);
        let fetcher = self.fetcher.clone();
        let generation = self.generation;
        self.jobs.spawn_blocking(move || {
            let result = contained(&request.name, || {
                fetcher
                    .fetch(&request.url)
                    .map_err(network_error)
                    .and_then(|bytes| pcd_decoder::decode(&bytes).map_err(CacheError::from))
                    .map(|cloud| {
                        Payload::Point(PointRecord {
                            name: request.name.clone(),
                            url: request.url.clone(),
                            cloud,
                        })
                    })
            });
            Completion {
                generation,
                name: request.name,
                is_image: false,
                overwrite,
                result,
            }
        });
    }

    fn spawn_image(&mut self, request: ImageRequest, overwrite: bool) {
        self.images.states.insert(request.name.clone(), EntryState::Pending);
        let fetcher = self.fetcher.clone();
        let generation = self.generation;
        self.jobs.spawn_blocking(move || {
            let result = contained(&request.name, || {
                fetcher
                    .fetch(&request.url)
                    .map_err(network_error)
                    .and_then(|bytes| ImageRecord::from_fetched(&request, bytes))
                    .map(Payload::Image)
            });
            Completion {
                generation,
                name: request.name,
                is_image: true,
                overwrite,
                result,
            }
        });
    }

    fn complete(&mut self, completion: Completion) {
        if completion.generation != self.generation {
            debug!("Discarding stale completion for '{}'", completion.name);
            return;
        }
        let Completion {
            name,
            is_image,
            overwrite,
            result,
            ..
        } = completion;

        let outcome = result.and_then(|payload| self.persist(payload, overwrite));
        match outcome {
            Ok((Payload::Point(record), already_stored)) => {
                self.points.states.insert(name.clone(), EntryState::Stored);
                self.points.resolve(&name, Ok(Arc::new(record.cloud)));
                self.emit(CacheEvent::PointStored {
                    name,
                    already_stored,
                });
            }
            Ok((Payload::Image(record), already_stored)) => {
                self.images.states.insert(name.clone(), EntryState::Stored);
                self.images.resolve(&name, Ok(record));
                self.emit(CacheEvent::ImageStored {
                    name,
                    already_stored,
                });
            }
            Err(error) => {
                warn!("Storing '{}' failed: {}", name, error);
                if let CacheError::NetworkError { url, reason } = &error {
                    self.emit(CacheEvent::NetworkError {
                        name: name.clone(),
                        url: url.clone(),
                        reason: reason.clone(),
                    });
                }
                if is_image {
                    self.images.states.insert(name.clone(), EntryState::Failed);
                    self.images.resolve(&name, Err(error.clone()));
                    self.emit(CacheEvent::ImageStoreFailed { name, error });
                } else {
                    self.points.states.insert(name.clone(), EntryState::Failed);
                    self.points.resolve(&name, Err(error.clone()));
                    self.emit(CacheEvent::PointStoreFailed { name, error });
                }
            }
        }
    }

    /// Write a fetched payload. Returns it with whether the key was already present.
    fn persist(&mut self, payload: Payload, overwrite: bool) -> Result<(Payload, bool)> {
        let task = self.config.task_name.clone();
        let (store, record) = match &payload {
            Payload::Point(p) => (self.config.points_store.clone(), p.to_stored()?),
            Payload::Image(i) => (self.config.images_store.clone(), i.to_stored()?),
        };
        let medium = self
            .medium
            .as_deref_mut()
            .ok_or(CacheError::StorageUnavailable)?;

        let written = if overwrite {
            medium.put(&task, &store, record)
        } else {
            medium.add(&task, &store, record)
        };
        match written {
            Ok(()) => Ok((payload, false)),
            Err(StoreError::KeyExists { .. }) => Ok((payload, true)),
            Err(err) => Err(err.into()),
        }
    }

    fn read_point(&mut self, name: String, reply: PointReply) {
        match self.points.states.get(&name).copied() {
            Some(EntryState::Pending) => {
                if self.points.has_live_waiter(&name) {
                    let _ = reply.send(Err(CacheError::AlreadyPending(name)));
                } else {
                    self.points.waiters.insert(name, reply);
                }
            }
            Some(EntryState::Failed) => {
                let _ = reply.send(Err(CacheError::NotFound(name)));
            }
            // Stored now or by an earlier session of this task.
            Some(EntryState::Stored) | None => {
                let record = self.load(&self.config.points_store, &name).and_then(|r| {
                    PointRecord::from_stored(&r).map_err(CacheError::from)
                });
                let _ = reply.send(record.map(|r| Arc::new(r.cloud)));
            }
        }
    }

    fn read_image(&mut self, name: String, reply: ImageReply) {
        match self.images.states.get(&name).copied() {
            Some(EntryState::Pending) => {
                if self.images.has_live_waiter(&name) {
                    let _ = reply.send(Err(CacheError::AlreadyPending(name)));
                } else {
                    self.images.waiters.insert(name, reply);
                }
            }
            Some(EntryState::Failed) => {
                let _ = reply.send(Err(CacheError::NotFound(name)));
            }
            Some(EntryState::Stored) | None => {
                let record = self.load(&self.config.images_store, &name).and_then(|r| {
                    ImageRecord::from_stored(&r).map_err(CacheError::from)
                });
                let _ = reply.send(record);
            }
        }
    }

    fn load(&self, store: &str, name: &str) -> Result<crate::medium::StoredRecord> {
        let not_found = || CacheError::NotFound(name.to_string());
        let medium = self.medium.as_deref().ok_or_else(not_found)?;
        medium
            .get(&self.config.task_name, store, name)
            .ok()
            .flatten()
            .ok_or_else(not_found)
    }
}

/// Run a fetch/decode job, turning a panic into a per-asset failure.
fn contained<T>(name: &str, job: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(CacheError::JobPanicked {
            name: name.to_string(),
            reason,
        })
    })
}

fn network_error(err: FetchError) -> CacheError {
    CacheError::NetworkError {
        url: err.url().to_string(),
        reason: err.to_string(),
    }
}
