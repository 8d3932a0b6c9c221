//! # Environment
//!
//! Owns the single record store and the network layer. Every write to the
//! store goes through [`Environment::send_query`] (or [`Environment::publish`]),
//! and every read through the selector.
//!
//! ## Concurrency
//!
//! The store sits behind a `RwLock`. A query holds no lock while it waits on
//! the network; the write lock is taken only for the synchronous merge of an
//! already complete normalization result. Readers therefore see the store
//! either entirely before or entirely after any one merge, and concurrent
//! queries land in completion order (last merge wins per field).
//!
//! The network wait and the merge run on a detached Tokio task. A caller that
//! stops awaiting `send_query` (timeout, `select!`, dropped task) does not
//! cancel the merge.

use crate::config::EnvironmentConfig;
use crate::error::EnvironmentError;
use crate::network::NetworkLayer;
use normcache_core::{
    DATA_KEY, Document, EntityId, MergeSummary, OperationDefinition, OperationKind, RecordStore,
    normalize, select,
};
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// A GraphQL client environment: network layer plus normalized store.
///
/// Cloning is cheap and every clone shares the same store.
pub struct Environment<N> {
    network: Arc<N>,
    store: Arc<RwLock<RecordStore>>,
    config: Arc<EnvironmentConfig>,
    root_id: EntityId,
}

impl<N> Clone for Environment<N> {
    fn clone(&self) -> Self {
        Self {
            network: Arc::clone(&self.network),
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            root_id: self.root_id.clone(),
        }
    }
}

impl<N: NetworkLayer + 'static> Environment<N> {
    /// Create an environment with an empty store and default settings.
    pub fn new(network: N) -> Self {
        Self::with_config(network, EnvironmentConfig::default())
    }

    /// Create an environment with an empty store.
    pub fn with_config(network: N, config: EnvironmentConfig) -> Self {
        info!(
            root_id = %config.root_id,
            recursion_limit = config.parser_recursion_limit,
            "environment created"
        );
        Self {
            network: Arc::new(network),
            store: Arc::new(RwLock::new(RecordStore::new())),
            root_id: EntityId::new(config.root_id.clone()),
            config: Arc::new(config),
        }
    }

    /// The settings this environment was built with.
    #[must_use]
    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// Id of the query root record.
    #[must_use]
    pub fn root_id(&self) -> &EntityId {
        &self.root_id
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Send a single-operation document and merge its response.
    ///
    /// Returns the raw response once the merge has completed. On any error
    /// the store is unchanged. Must be called from within a Tokio runtime.
    pub async fn send_query(&self, query: &str) -> Result<Value, EnvironmentError> {
        self.send_operation(query, None).await
    }

    /// Like [`send_query`](Self::send_query), picking `operation_name` out of
    /// a multi-operation document.
    pub async fn send_operation(
        &self,
        query: &str,
        operation_name: Option<&str>,
    ) -> Result<Value, EnvironmentError> {
        let document = self.parse(query)?;
        let operation = executable(&document, operation_name)?;
        debug!(operation = operation.name.as_deref().unwrap_or("<anonymous>"), "sending query");

        let runtime = Handle::try_current().map_err(|e| EnvironmentError::Runtime(e.to_string()))?;
        let pending = PendingQuery {
            network: Arc::clone(&self.network),
            store: Arc::clone(&self.store),
            root_id: self.root_id.clone(),
            query: query.to_owned(),
            operation_name: operation_name.map(str::to_owned),
            document,
        };

        runtime
            .spawn(pending.run())
            .await
            .map_err(|e| EnvironmentError::Runtime(e.to_string()))?
    }

    /// Merge a response obtained elsewhere (server-side rendering, a
    /// subscription transport, a fixture) as if `query` had been sent.
    pub fn publish(
        &self,
        query: &str,
        operation_name: Option<&str>,
        response: &Value,
    ) -> Result<MergeSummary, EnvironmentError> {
        let document = self.parse(query)?;
        let operation = executable(&document, operation_name)?;
        merge_response(&self.store, &self.root_id, &document, operation, response)
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Read a fragment rooted at `root_id`.
    ///
    /// `source` may be a `fragment ... on T { ... }` definition (optionally
    /// followed by the fragments it spreads) or a bare `{ ... }` selection.
    pub fn read_fragment(
        &self,
        root_id: impl Into<EntityId>,
        source: &str,
    ) -> Result<Value, EnvironmentError> {
        self.read_fragment_named(root_id, source, None)
    }

    /// Alias of [`read_fragment`](Self::read_fragment).
    pub fn select_data(
        &self,
        root_id: impl Into<EntityId>,
        source: &str,
    ) -> Result<Value, EnvironmentError> {
        self.read_fragment(root_id, source)
    }

    /// Read the fragment called `fragment_name` out of `source`, or the
    /// document's first selection when `None`.
    pub fn read_fragment_named(
        &self,
        root_id: impl Into<EntityId>,
        source: &str,
        fragment_name: Option<&str>,
    ) -> Result<Value, EnvironmentError> {
        let document = self.parse(source)?;
        let selections = document.read_selection(fragment_name)?;
        let root_id = root_id.into();
        let store = self.read_store();
        Ok(select(&*store, &root_id, selections, document.fragments())?)
    }

    /// Answer a query from the store alone, without a network trip.
    pub fn read_query(&self, query: &str) -> Result<Value, EnvironmentError> {
        let document = self.parse(query)?;
        let operation = document.operation(None)?;
        let store = self.read_store();
        Ok(select(&*store, &self.root_id, &operation.selections, document.fragments())?)
    }

    /// A copy of the current store contents.
    #[must_use]
    pub fn snapshot(&self) -> RecordStore {
        self.read_store().clone()
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn parse(&self, source: &str) -> Result<Document, EnvironmentError> {
        Ok(Document::parse_with_limit(source, self.config.parser_recursion_limit)?)
    }

    // Poisoning is recovered as in `merge_response`.
    fn read_store(&self) -> RwLockReadGuard<'_, RecordStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

}

/// A sent query, owned by the task that awaits its response.
struct PendingQuery<N> {
    network: Arc<N>,
    store: Arc<RwLock<RecordStore>>,
    root_id: EntityId,
    query: String,
    operation_name: Option<String>,
    document: Document,
}

impl<N: NetworkLayer> PendingQuery<N> {
    async fn run(self) -> Result<Value, EnvironmentError> {
        let response = self.network.execute(&self.query).await.inspect_err(|e| {
            warn!(error = %e, "network layer failed");
        })?;

        let operation = executable(&self.document, self.operation_name.as_deref())?;
        merge_response(&self.store, &self.root_id, &self.document, operation, &response)?;
        Ok(response)
    }
}

/// Normalize `response` against `operation` and merge it under one write lock.
fn merge_response(
    store: &RwLock<RecordStore>,
    root_id: &EntityId,
    document: &Document,
    operation: &OperationDefinition,
    response: &Value,
) -> Result<MergeSummary, EnvironmentError> {
    let data = response
        .get(DATA_KEY)
        .and_then(Value::as_object)
        .ok_or_else(|| {
            warn!("response has no data object");
            EnvironmentError::MalformedResponse(format!("expected an object under '{DATA_KEY}'"))
        })?;

    let records = normalize(&operation.selections, document.fragments(), data, root_id)
        .inspect_err(|e| warn!(error = %e, "normalization failed, store unchanged"))?;

    // The store is only mutated by an infallible merge, so a poisoned lock
    // still guards consistent data.
    let summary = store
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .merge(records);
    debug!(
        created = summary.created,
        updated = summary.updated,
        "response merged"
    );
    Ok(summary)
}

/// Pick the operation to send. Subscriptions have no single response to merge.
fn executable<'d>(
    document: &'d Document,
    operation_name: Option<&str>,
) -> Result<&'d OperationDefinition, EnvironmentError> {
    let operation = document.operation(operation_name)?;
    if operation.kind == OperationKind::Subscription {
        return Err(normcache_core::CacheError::NotExecutable(
            "subscriptions are not supported".to_owned(),
        )
        .into());
    }
    Ok(operation)
}

// =============================================================================
// TESTS
// =============================================================================
