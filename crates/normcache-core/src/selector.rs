//! # Selector
//!
//! Reads a selection back out of a record source.
//!
//! The mirror of the normalizer: for every field the storage key is computed
//! and looked up in the current record. References are followed into their
//! target record with the field's child selections; fragment spreads read more
//! fields from the same record. The output is shaped like the `data` member of
//! a GraphQL response for the given selection.
//!
//! A fragment spread twice against the same record is read once.

use crate::document::{Field, FragmentTable, Selection};
use crate::store::RecordSource;
use crate::{CacheError, EntityId, FieldValue, Record, Scalar, StorageKey};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Select `selections` starting at the record of `root_id`.
///
/// Fails with [`CacheError::EntityNotFound`] if the root is unknown and with
/// [`CacheError::MissingField`] if any selected field was never written.
pub fn select<S: RecordSource + ?Sized>(
    source: &S,
    root_id: &EntityId,
    selections: &[Selection],
    fragments: &FragmentTable,
) -> Result<Value, CacheError> {
    let record = source
        .get(root_id)
        .ok_or_else(|| CacheError::EntityNotFound(root_id.clone()))?;

    let mut reader = Reader {
        source,
        fragments,
        active: Vec::new(),
    };
    let mut data = Map::new();
    reader.read_record(root_id, record, selections, &mut data)?;
    Ok(Value::Object(data))
}

struct Reader<'a, S: ?Sized> {
    source: &'a S,
    fragments: &'a FragmentTable,
    /// Spreads being expanded on the current path.
    active: Vec<String>,
}

impl<'a, S: RecordSource + ?Sized> Reader<'a, S> {
    fn read_record(
        &mut self,
        id: &EntityId,
        record: &'a Record,
        selections: &'a [Selection],
        out: &mut Map<String, Value>,
    ) -> Result<(), CacheError> {
        self.read_selections(id, record, selections, out, &mut BTreeSet::new())
    }

    /// `expanded` holds the fragments already read into `out` for this record.
    fn read_selections(
        &mut self,
        id: &EntityId,
        record: &'a Record,
        selections: &'a [Selection],
        out: &mut Map<String, Value>,
        expanded: &mut BTreeSet<&'a str>,
    ) -> Result<(), CacheError> {
        for selection in selections {
            match selection {
                Selection::Field(field) => {
                    let value = self.read_field(id, record, field)?;
                    insert_merged(out, field.response_key(), value);
                }
                Selection::FragmentSpread(spread) => {
                    let fragments = self.fragments;
                    let fragment = fragments.resolve(&spread.name, &self.active)?;
                    if !expanded.insert(spread.name.as_str()) {
                        continue;
                    }
                    self.active.push(spread.name.clone());
                    self.read_selections(id, record, &fragment.selections, out, expanded)?;
                    self.active.pop();
                }
                Selection::InlineFragment(inline) => {
                    self.read_selections(id, record, &inline.selections, out, expanded)?;
                }
            }
        }
        Ok(())
    }

    fn read_field(
        &mut self,
        id: &EntityId,
        record: &'a Record,
        field: &'a Field,
    ) -> Result<Value, CacheError> {
        let key = field.storage_key()?;
        let stored = record.get(&key).ok_or_else(|| CacheError::MissingField {
            entity: id.clone(),
            field: key.clone(),
        })?;

        match (&field.selections, stored) {
            (None, FieldValue::Scalar(scalar)) => Ok(scalar.to_json()),
            (Some(_), FieldValue::Scalar(Scalar::Null)) => Ok(Value::Null),
            (Some(children), FieldValue::Reference(reference)) => {
                let source = self.source;
                let target = source.get(&reference.id).ok_or_else(|| {
                    CacheError::DanglingReference {
                        entity: id.clone(),
                        field: key.clone(),
                        target: reference.id.clone(),
                    }
                })?;
                let mut child = Map::new();
                self.read_record(&reference.id, target, children, &mut child)?;
                Ok(Value::Object(child))
            }
            (None, FieldValue::Reference(_)) => Err(unsupported_shape(
                id,
                key,
                "linked field selected without sub-selections",
            )),
            (Some(_), FieldValue::Scalar(_)) => Err(unsupported_shape(
                id,
                key,
                "field with selections holds a scalar",
            )),
        }
    }
}

/// Insert under `key`, deep-merging with an object already there.
///
/// Two selections can produce the same response key, e.g. a field selected
/// both directly and through a fragment.
fn insert_merged(out: &mut Map<String, Value>, key: &str, value: Value) {
    match (out.get_mut(key), value) {
        (Some(Value::Object(existing)), Value::Object(incoming)) => {
            for (k, v) in incoming {
                insert_merged(existing, &k, v);
            }
        }
        (_, value) => {
            out.insert(key.to_owned(), value);
        }
    }
}

fn unsupported_shape(entity: &EntityId, field: StorageKey, reason: &str) -> CacheError {
    CacheError::UnsupportedShape {
        entity: entity.clone(),
        field,
        reason: reason.to_owned(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
