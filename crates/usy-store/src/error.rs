use std::path::PathBuf;

/// Errors from remote stores and raw feeds.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested file does not exist (yet).
    #[error("remote content not found")]
    NotFound,
    /// The write carried a missing or stale version token.
    #[error("version conflict status={status}: {message}")]
    Conflict { status: u16, message: String },
    #[error("remote store rejected credentials status={status}: {message}")]
    Auth { status: u16, message: String },
    #[error("http error status={status}: {message}")]
    Http { status: u16, message: String },
    /// Network failure or timeout.
    #[error("transport error: {0}")]
    Transport(String),
    /// The response arrived but its payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            StoreError::Decode(e.to_string())
        } else {
            StoreError::Transport(e.to_string())
        }
    }
}

/// Errors from the local cache file.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cache file {path} is not a valid player list: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("player list encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}
