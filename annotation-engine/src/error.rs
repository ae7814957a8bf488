use asset_cache::CacheError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Picking and the orthographic views cannot run without one.
    #[error("no GPU context available")]
    NoGpuContext,
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),
    #[error("entity '{0}' already exists")]
    DuplicateEntity(String),
    #[error("entity '{0}' is deleted")]
    EntityHidden(String),
    #[error("no active entity")]
    NoActiveEntity,
    #[error("frame {0} is already current")]
    FrameAlreadyCurrent(usize),
    #[error("frame {0} is not provided")]
    UnknownFrame(usize),
    #[error("pick id space exhausted")]
    PickIdsExhausted,
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
