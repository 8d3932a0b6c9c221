//! # normcache-core
//!
//! The normalized record store for GraphQL results - THE LOGIC.
//!
//! This crate turns nested query responses into a flat graph of records keyed
//! by entity identity, merges them into a shared store, and reconstructs any
//! requested selection back out of that store by following references.
//!
//! ## Pipeline
//!
//! ```text
//! source text ──► Document (AST + FragmentTable)
//!                     │
//! response data ──► normalize ──► NormalizedRecords ──► RecordStore::merge
//!                                                            │
//!               select(root, selection, fragments) ◄─────────┘
//! ```
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies (pure Rust)
//! - Records never nest: links are explicit `{"__ref": id}` values
//! - Normalization either yields a complete result or an error; the store is
//!   only touched by merging a complete result

// =============================================================================
// MODULES
// =============================================================================

pub mod document;
pub mod normalizer;
pub mod primitives;
pub mod selector;
pub mod storage_key;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{CacheError, EntityId, FieldValue, Record, Reference, Scalar, StorageKey};

// =============================================================================
// RE-EXPORTS: Document, Normalizer, Store, Selector
// =============================================================================

pub use document::{
    Argument, ArgumentValue, Document, Field, FragmentDefinition, FragmentSpread, FragmentTable,
    InlineFragment, OperationDefinition, OperationKind, Selection,
};
pub use normalizer::{NormalizedRecords, normalize};
pub use selector::select;
pub use store::{DanglingLink, MergeSummary, RecordSource, RecordStore};

// =============================================================================
// RE-EXPORTS: Primitives
// =============================================================================

pub use primitives::{DATA_KEY, DEFAULT_RECURSION_LIMIT, ID_FIELD, REF_KEY, ROOT_ID};
