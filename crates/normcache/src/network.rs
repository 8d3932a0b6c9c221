//! # Network Layer
//!
//! The external collaborator that sends a query and returns the response
//! payload. Transport, auth and retries are entirely its business.
//!
//! Any async closure `Fn(String) -> impl Future<Output = Result<Value, NetworkError>>`
//! is a network layer:
//!
//! ```
//! use normcache::{Environment, NetworkError};
//! use serde_json::{Value, json};
//!
//! let env = Environment::new(|_query: String| async move {
//!     Ok::<Value, NetworkError>(json!({"data": {}}))
//! });
//! # let _ = env;
//! ```

use serde_json::Value;
use std::future::Future;
use thiserror::Error;

/// Failure reported by a network layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct NetworkError {
    message: String,
}

impl NetworkError {
    /// Create an error with a description.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Get the description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Sends a query and resolves to the full response payload (`{"data": ...}`).
///
/// Must be `Send + Sync`: several queries may be in flight at once.
pub trait NetworkLayer: Send + Sync {
    /// Execute `query` and return the raw response.
    fn execute(&self, query: &str) -> impl Future<Output = Result<Value, NetworkError>> + Send;
}

impl<F, Fut> NetworkLayer for F
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, NetworkError>> + Send,
{
    fn execute(&self, query: &str) -> impl Future<Output = Result<Value, NetworkError>> + Send {
        self(query.to_owned())
    }
}
