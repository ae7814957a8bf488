use pcd_decoder::DecodeError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors reported per asset name or returned to readers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CacheError {
    #[error("corrupt asset data: {0}")]
    CorruptData(String),

    #[error("unsupported field type for '{field}': TYPE {kind} SIZE {size}")]
    UnsupportedFieldType {
        field: String,
        kind: char,
        size: usize,
    },

    /// Fetch failure. Recoverable through `restore_task`.
    #[error("network error fetching {url}: {reason}")]
    NetworkError { url: String, reason: String },

    /// Fetch or decode panicked. Recoverable through `restore_task`.
    #[error("processing '{name}' panicked: {reason}")]
    JobPanicked { name: String, reason: String },

    #[error("asset '{0}' is not cached")]
    NotFound(String),

    #[error("a read for '{0}' is already pending")]
    AlreadyPending(String),

    #[error("no persistent storage medium is available")]
    StorageUnavailable,

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("cache worker is no longer running")]
    WorkerGone,
}

impl From<DecodeError> for CacheError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::UnsupportedFieldType { field, kind, size } => {
                Self::UnsupportedFieldType { field, kind, size }
            }
            other => Self::CorruptData(other.to_string()),
        }
    }
}

/// Failures of the storage medium itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("i/o failure: {0}")]
    Io(String),

    #[error("key '{key}' already exists in '{store}'")]
    KeyExists { store: String, key: String },

    #[error("database '{0}' does not exist")]
    NoSuchDatabase(String),

    #[error("object store '{0}' does not exist")]
    NoSuchStore(String),

    #[error("key '{key}' shares its file name with '{existing}'")]
    NameCollision { key: String, existing: String },

    #[error("record codec failure: {0}")]
    Codec(String),

    #[error("storage medium lock poisoned")]
    Poisoned,
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}
