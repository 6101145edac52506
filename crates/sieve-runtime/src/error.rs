//! Runtime error types

/// Failure talking to a key-value store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Stored value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Storage rejected the write: {0}")]
    Rejected(String),
}

/// Failure retrieving a remote list.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("Response body from {url} is unreadable: {reason}")]
    Body { url: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}
