use thiserror::Error;

/// Failures raised by cache store implementations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache serialization failed: {0}")]
    Serialization(#[from] postcard::Error),

    #[error("cache database error: {0}")]
    Database(#[from] sled::Error),
}
