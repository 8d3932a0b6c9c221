//! # Core Type Definitions
//!
//! This module contains all core types for the normalized record store:
//! - Identifiers (`EntityId`, `StorageKey`)
//! - Record values (`Scalar`, `Reference`, `FieldValue`)
//! - Records (`Record`)
//! - Error types (`CacheError`)
//!
//! ## Determinism Guarantees
//!
//! - Records are `BTreeMap`-backed, so iteration and serialization order are
//!   stable across runs
//! - A `FieldValue` is either a scalar or a reference, never a nested object;
//!   nesting is always expressed through another record

use crate::primitives::ROOT_ID;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Opaque identity of one entity in the store.
///
/// Taken from the `id` field of response objects, or synthetic for operation
/// roots (`client:root`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create an entity id from any string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The synthetic id of the unnamed query root.
    #[must_use]
    pub fn root() -> Self {
        Self(ROOT_ID.to_owned())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Cache key of one field selection: field name plus literal arguments.
///
/// Built by [`crate::storage_key`]; two selections of the same field with the
/// same arguments always produce equal keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    /// Wrap an already-encoded key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// RECORD VALUES
// =============================================================================

/// A leaf value copied from a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// JSON `null`.
    Null,
    /// JSON boolean.
    Boolean(bool),
    /// JSON number, kept exactly as received.
    Number(serde_json::Number),
    /// JSON string.
    String(String),
}

impl Scalar {
    /// Convert a response value into a scalar.
    ///
    /// Returns `None` for arrays and objects.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(Self::Null),
            serde_json::Value::Bool(b) => Some(Self::Boolean(*b)),
            serde_json::Value::Number(n) => Some(Self::Number(n.clone())),
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    /// Convert back into a response value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Boolean(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::String(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Check whether this is `null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// A link from one record to another.
///
/// Serialized as `{"__ref": "<id>"}`. Only the normalizer produces these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Reference {
    /// The referenced entity.
    #[serde(rename = "__ref")]
    pub id: EntityId,
}

/// The value stored under one storage key of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Link to another record.
    Reference(Reference),
    /// Leaf value.
    Scalar(Scalar),
}

impl FieldValue {
    /// Create a reference value.
    #[must_use]
    pub fn reference(id: EntityId) -> Self {
        Self::Reference(Reference { id })
    }

    /// Get the referenced id, if this value is a link.
    #[must_use]
    pub fn as_reference(&self) -> Option<&EntityId> {
        match self {
            Self::Reference(r) => Some(&r.id),
            Self::Scalar(_) => None,
        }
    }
}

impl From<Scalar> for FieldValue {
    fn from(scalar: Scalar) -> Self {
        Self::Scalar(scalar)
    }
}

// =============================================================================
// RECORD
// =============================================================================

/// Everything known about one entity: storage key -> value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<StorageKey, FieldValue>,
}

impl Record {
    /// Create a new empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value stored under a key.
    #[must_use]
    pub fn get(&self, key: &StorageKey) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Store a value, returning the one it replaced.
    pub fn insert(&mut self, key: StorageKey, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(key, value)
    }

    /// Check whether a key is present.
    #[must_use]
    pub fn contains_key(&self, key: &StorageKey) -> bool {
        self.fields.contains_key(key)
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the record holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over all (key, value) pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&StorageKey, &FieldValue)> {
        self.fields.iter()
    }

    /// Iterate over all outgoing references.
    pub fn references(&self) -> impl Iterator<Item = (&StorageKey, &EntityId)> {
        self.fields
            .iter()
            .filter_map(|(key, value)| value.as_reference().map(|id| (key, id)))
    }

    /// Union another record into this one; incoming values win.
    ///
    /// Keys present here but absent from `other` are left untouched.
    pub fn absorb(&mut self, other: Record) {
        self.fields.extend(other.fields);
    }
}

impl FromIterator<(StorageKey, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (StorageKey, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors raised while parsing documents, normalizing responses or selecting
/// data back out of the store.
///
/// Normalization errors abort the whole merge for that response. Selection
/// errors are split by [`CacheError::is_cache_miss`] (refetch and retry) and
/// [`CacheError::is_store_corruption`] (a bug).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// A linked child object carries no usable `id`.
    #[error("cannot identify entity linked from {parent} at {field}: object has no usable `id`")]
    UnidentifiableEntity {
        /// Entity whose field links to the anonymous object.
        parent: EntityId,
        /// Storage key of the linking field.
        field: StorageKey,
    },

    /// An argument value is not a scalar literal.
    #[error("unsupported argument `{argument}` on field `{field}`: {reason}")]
    UnsupportedArgument {
        /// Field name the argument belongs to.
        field: String,
        /// Argument name.
        argument: String,
        /// What kind of value was found.
        reason: String,
    },

    /// A value does not have the shape its selection requires.
    #[error("unsupported shape for {field} on {entity}: {reason}")]
    UnsupportedShape {
        /// Entity being read or written.
        entity: EntityId,
        /// Field whose value has the wrong shape.
        field: StorageKey,
        /// What was expected and found.
        reason: String,
    },

    /// Fragment spreads form a cycle.
    #[error("fragment cycle: {}", path.join(" -> "))]
    FragmentCycle {
        /// Spread chain, ending with the repeated fragment.
        path: Vec<String>,
    },

    /// A chain of nested fragment spreads is deeper than the document allows.
    #[error("fragment `{fragment}` nested more than {limit} spreads deep")]
    FragmentDepthExceeded {
        /// Spread that would exceed the limit.
        fragment: String,
        /// Configured nesting limit.
        limit: usize,
    },

    /// The root of a read is not in the store.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// A selected field has never been written for this entity.
    #[error("missing field {field} on {entity}")]
    MissingField {
        /// Entity that was read.
        entity: EntityId,
        /// Storage key that is absent.
        field: StorageKey,
    },

    /// A stored reference points to an entity that is not in the store.
    #[error("dangling reference from {entity} at {field} to {target}")]
    DanglingReference {
        /// Entity holding the reference.
        entity: EntityId,
        /// Storage key of the reference.
        field: StorageKey,
        /// Missing target.
        target: EntityId,
    },

    /// The GraphQL parser reported diagnostics.
    #[error("parse error: {0}")]
    Parse(String),

    /// A spread names a fragment the document does not define.
    #[error("unknown fragment `{0}`")]
    UnknownFragment(String),

    /// Two fragment definitions share a name.
    #[error("fragment `{0}` is defined more than once")]
    DuplicateFragment(String),

    /// The document has nothing that can be executed or read.
    #[error("document contains no operation or fragment to use")]
    MissingOperation,

    /// No operation with the requested name.
    #[error("operation `{0}` not found")]
    OperationNotFound(String),

    /// Several operations and no name to pick one.
    #[error("document defines {0} operations; an operation name is required")]
    AmbiguousOperation(usize),

    /// The document contains type-system definitions.
    #[error("document is not executable: {0}")]
    NotExecutable(String),
}

impl CacheError {
    /// True for errors meaning "the store does not know this yet".
    ///
    /// Callers handle these by refetching and retrying.
    #[must_use]
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Self::EntityNotFound(_) | Self::MissingField { .. })
    }

    /// True for graph-consistency violations, which never occur in normal operation.
    #[must_use]
    pub fn is_store_corruption(&self) -> bool {
        matches!(self, Self::DanglingReference { .. })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reference_serializes_as_ref_object() {
        let value = FieldValue::reference(EntityId::new("abc"));
        let json = serde_json::to_value(&value).expect("serialize");
        assert_eq!(json, json!({"__ref": "abc"}));
    }

    #[test]
    fn scalar_and_reference_deserialize_unambiguously() {
        let reference: FieldValue = serde_json::from_value(json!({"__ref": "x"})).expect("ref");
        assert_eq!(reference.as_reference(), Some(&EntityId::new("x")));

        let scalar: FieldValue = serde_json::from_value(json!(228)).expect("scalar");
        assert_eq!(scalar, FieldValue::Scalar(Scalar::Number(228.into())));

        let null: FieldValue = serde_json::from_value(json!(null)).expect("null");
        assert_eq!(null, FieldValue::Scalar(Scalar::Null));
    }

    #[test]
    fn scalar_rejects_structures() {
        assert!(Scalar::from_json(&json!([1, 2])).is_none());
        assert!(Scalar::from_json(&json!({"a": 1})).is_none());
        assert_eq!(
            Scalar::from_json(&json!("Wookie")).map(|s| s.to_json()),
            Some(json!("Wookie"))
        );
    }

    #[test]
    fn absorb_overwrites_and_keeps() {
        let mut existing: Record = [
            (StorageKey::new("a"), Scalar::Number(1.into()).into()),
            (StorageKey::new("b"), Scalar::Number(2.into()).into()),
        ]
        .into_iter()
        .collect();
        let incoming: Record = [
            (StorageKey::new("b"), Scalar::Number(20.into()).into()),
            (StorageKey::new("c"), Scalar::Number(30.into()).into()),
        ]
        .into_iter()
        .collect();

        existing.absorb(incoming);

        assert_eq!(existing.len(), 3);
        assert_eq!(
            existing.get(&StorageKey::new("a")),
            Some(&FieldValue::Scalar(Scalar::Number(1.into())))
        );
        assert_eq!(
            existing.get(&StorageKey::new("b")),
            Some(&FieldValue::Scalar(Scalar::Number(20.into())))
        );
    }

    #[test]
    fn error_classification() {
        assert!(CacheError::EntityNotFound(EntityId::root()).is_cache_miss());
        assert!(
            CacheError::MissingField {
                entity: EntityId::root(),
                field: StorageKey::new("name"),
            }
            .is_cache_miss()
        );
        let dangling = CacheError::DanglingReference {
            entity: EntityId::root(),
            field: StorageKey::new("person"),
            target: EntityId::new("gone"),
        };
        assert!(dangling.is_store_corruption());
        assert!(!dangling.is_cache_miss());
    }

    #[test]
    fn fragment_cycle_message_shows_path() {
        let err = CacheError::FragmentCycle {
            path: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "fragment cycle: A -> B -> A");
    }
}
