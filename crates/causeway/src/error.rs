//! Error types surfaced through task outcomes and the client API.

use std::io;

use thiserror::Error;

use causeway_cache::CacheError;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Terminal failure of a request or a client operation.
#[derive(Debug, Error)]
pub enum Error {
    /// A relative path was submitted while no base URL is configured.
    #[error("no base URL configured for relative path: {path}")]
    MissingBaseUrl { path: String },

    /// The resolved URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The transport reported a failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A typed read of the payload failed.
    #[error("decode failed: {message}")]
    Decode { message: String },

    /// The task was cancelled before it finished.
    #[error("request cancelled")]
    Cancelled,

    /// The cache store failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Failure at the transport boundary.
///
/// Timeouts and non-success statuses are ordinary transport failures; the
/// request layer treats them uniformly when deciding on cache fallback.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, DNS, or protocol failure.
    #[error("network error: {0}")]
    Network(String),

    /// The configured timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-success status.
    #[error("HTTP status {status}")]
    Status {
        status: u16,
        /// Response body text, kept for diagnosis.
        body: String,
    },

    /// Local file I/O while staging a download or reading an upload part.
    #[error("file I/O error: {0}")]
    Io(#[from] io::Error),
}
