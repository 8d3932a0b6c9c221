//! # normcache
//!
//! A GraphQL client environment over the normalized record store in
//! `normcache-core`.
//!
//! The [`Environment`] sends queries through a caller-supplied
//! [`NetworkLayer`], normalizes each response into the shared store, and
//! answers fragment reads from that store.
//!
//! ```no_run
//! use normcache::{Environment, NetworkError};
//! use serde_json::{Value, json};
//!
//! # async fn demo() -> Result<(), normcache::EnvironmentError> {
//! let env = Environment::new(|_query: String| async move {
//!     Ok::<Value, NetworkError>(json!({
//!         "data": {"person": {"id": "cGVvcGxlOjEz", "name": "Chewbacca"}}
//!     }))
//! });
//!
//! env.send_query(r#"{ person(id: "cGVvcGxlOjEz") { id name } }"#).await?;
//! let person = env.read_fragment("cGVvcGxlOjEz", "fragment P on Person { name }")?;
//! assert_eq!(person, json!({"name": "Chewbacca"}));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod environment;
pub mod error;
pub mod network;
pub mod telemetry;

pub use config::{EnvironmentConfig, LogConfig, LogFormat};
pub use environment::Environment;
pub use error::EnvironmentError;
pub use network::{NetworkError, NetworkLayer};
pub use telemetry::init_tracing;

/// The store types, re-exported for callers that inspect snapshots.
pub use normcache_core::{
    CacheError, EntityId, FieldValue, MergeSummary, Record, RecordSource, RecordStore, Scalar,
    StorageKey,
};
