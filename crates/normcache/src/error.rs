//! # Environment Errors

use crate::network::NetworkError;
use normcache_core::CacheError;
use thiserror::Error;

/// Errors returned by [`Environment`](crate::Environment) operations.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    /// Parsing, normalization or selection failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The network layer reported a failure.
    #[error("network layer failed: {0}")]
    Network(#[from] NetworkError),

    /// The network layer returned a payload without an object `data` member.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// No Tokio runtime to run the query on, or its task failed.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl EnvironmentError {
    /// True if the store simply does not know the requested data yet.
    #[must_use]
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Self::Cache(e) if e.is_cache_miss())
    }

    /// Get the underlying cache error, if any.
    #[must_use]
    pub fn as_cache_error(&self) -> Option<&CacheError> {
        match self {
            Self::Cache(e) => Some(e),
            _ => None,
        }
    }
}
