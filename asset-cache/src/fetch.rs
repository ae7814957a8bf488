/// Asset fetching behind a trait so the worker never knows the transport
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("{url}: {reason}")]
    Transport { url: String, reason: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            Self::Status { url, .. } | Self::Transport { url, .. } => url,
        }
    }
}

/// Blocking fetch of one asset. Called from the worker's blocking pool.
pub trait AssetFetcher: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Serves `file://` URLs and plain paths, relative paths resolved against `root`.
#[derive(Debug, Clone, Default)]
pub struct FileFetcher {
    root: Option<PathBuf>,
}

impl FileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, url: &str) -> Result<PathBuf, FetchError> {
        let path = match url.split_once("://") {
            Some(("file", rest)) => PathBuf::from(rest),
            Some((scheme, _)) => {
                return Err(FetchError::Transport {
                    url: url.to_string(),
                    reason: format!("unsupported scheme '{scheme}'"),
                });
            }
            None => PathBuf::from(url),
        };
        Ok(match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        })
    }
}

impl AssetFetcher for FileFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let path = self.resolve(url)?;
        std::fs::read(&path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => FetchError::Status {
                url: url.to_string(),
                status: 404,
            },
            _ => FetchError::Transport {
                url: url.to_string(),
                reason: err.to_string(),
            },
        })
    }
}
