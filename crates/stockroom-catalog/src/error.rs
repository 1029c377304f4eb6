//! Error types for fetching and snapshot storage

use std::path::PathBuf;
use thiserror::Error;

/// Why a catalog fetch was aborted
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, timeout, or body read failure
    #[error("transport failure while fetching page {page}: {source}")]
    Transport {
        page: u32,
        #[source]
        source: reqwest::Error,
    },

    /// Upstream answered with a non-success status
    #[error("upstream returned status {status} for page {page}")]
    Status { page: u32, status: u16 },

    /// Upstream answered 2xx but the body is not a product page
    #[error("upstream sent an unreadable body for page {page}: {reason}")]
    Decode { page: u32, reason: String },
}

impl FetchError {
    pub fn page(&self) -> u32 {
        match self {
            FetchError::Transport { page, .. }
            | FetchError::Status { page, .. }
            | FetchError::Decode { page, .. } => *page,
        }
    }

    /// True for failures raised by the upstream service rather than the network
    pub fn is_upstream(&self) -> bool {
        !matches!(self, FetchError::Transport { .. })
    }
}

/// Snapshot read/write failures
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("snapshot not found at {}", path.display())]
    NotFound { path: PathBuf },

    #[error("snapshot at {} is corrupt: {source}", path.display())]
    CorruptData {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on snapshot {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize catalog: {0}")]
    Serialize(#[from] serde_json::Error),
}
