/// Error types for the photo frame
///
/// Every failure here is recoverable: the UI and the prefetch worker
/// log the error and retry later. The variants only exist so the logs
/// say what went wrong.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    /// Transport-level failure (DNS, connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The endpoint answered, but not with something we can show
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Image bytes could not be decoded
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {source_name}: {source}")]
    ConfigParse {
        source_name: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config: {0}")]
    ConfigInvalid(String),

    /// A blocking task panicked or was cancelled
    #[error("Worker task failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, FrameError>;
