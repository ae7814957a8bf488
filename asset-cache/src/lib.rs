//! Worker-backed persistent cache for decoded point clouds and images.
//!
//! A [`CacheStore`] owns one background thread. The calling thread only sends
//! commands and drains [`CacheEvent`]s; fetching, decoding and every write to
//! the [`StoreMedium`] happen on the worker.
//!
//! Each editing session caches under a task name. When a new task opens and
//! the registry already holds `task_limit` tasks, the oldest by creation time
//! are destroyed first.
//!
//! ```rust,ignore
//! let store = CacheStore::spawn(
//!     CacheConfig::new("task-42"),
//!     Some(Box::new(DiskMedium::open("cache")?)),
//!     Arc::new(FileFetcher::with_root("frames")),
//! )?;
//! store.store_task(vec![AssetRequest::new("0001", "0001.pcd")], vec![])?;
//! let cloud = store.read_point("0001").wait()?;
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod fetch;
pub mod medium;
pub mod records;
pub mod registry;
pub mod store;
mod worker;

pub use config::CacheConfig;
pub use error::{CacheError, Result, StoreError};
pub use events::{CacheEvent, SubscriptionId};
pub use fetch::{AssetFetcher, FetchError, FileFetcher};
pub use medium::{DiskMedium, MemoryMedium, StoreMedium};
pub use records::{AssetRequest, ImageRecord, ImageRequest, PointRecord};
pub use registry::{TaskRecord, TaskRegistry};
pub use store::{CacheStore, ReadHandle};
