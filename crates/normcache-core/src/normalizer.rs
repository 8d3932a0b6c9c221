//! # Normalizer
//!
//! Flattens a response tree into identity-keyed records.
//!
//! The walk follows the selection AST and the response object side by side:
//! - leaf fields are copied as scalars under their storage key
//! - fields with child selections become a [`Reference`](crate::Reference)
//!   to the child's `id`, and the walk continues inside the child
//! - fragment spreads and inline fragments are expanded in place against the
//!   same entity, each named fragment at most once per object
//!
//! Nothing is written to a store here. The result is a complete
//! [`NormalizedRecords`] value, or an error and no result at all.

use crate::document::{Field, FragmentTable, Selection};
use crate::primitives::ID_FIELD;
use crate::store::RecordSource;
use crate::{CacheError, EntityId, FieldValue, Record, Scalar, StorageKey};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// NORMALIZATION RESULT
// =============================================================================

/// Records produced by one normalization pass, ready to merge.
///
/// Every reference inside points to an entity that is also inside.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedRecords {
    records: BTreeMap<EntityId, Record>,
}

impl NormalizedRecords {
    /// All (id, record) pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Record)> {
        self.records.iter()
    }

    fn record_mut(&mut self, id: &EntityId) -> &mut Record {
        self.records.entry(id.clone()).or_default()
    }
}

impl RecordSource for NormalizedRecords {
    fn get(&self, id: &EntityId) -> Option<&Record> {
        self.records.get(id)
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

impl IntoIterator for NormalizedRecords {
    type Item = (EntityId, Record);
    type IntoIter = std::collections::btree_map::IntoIter<EntityId, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl FromIterator<(EntityId, Record)> for NormalizedRecords {
    fn from_iter<I: IntoIterator<Item = (EntityId, Record)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

// =============================================================================
// NORMALIZE
// =============================================================================

/// Normalize `data` as the response to `selections`, rooted at `root_id`.
///
/// `fragments` must be the table of the document the selections come from.
pub fn normalize(
    selections: &[Selection],
    fragments: &FragmentTable,
    data: &Map<String, Value>,
    root_id: &EntityId,
) -> Result<NormalizedRecords, CacheError> {
    let mut walker = Walker {
        fragments,
        records: NormalizedRecords::default(),
        active: Vec::new(),
    };
    walker.records.record_mut(root_id);
    walker.traverse(root_id, data, selections)?;

    tracing::debug!(
        root = %root_id,
        entities = walker.records.len(),
        "normalized response"
    );
    Ok(walker.records)
}

struct Walker<'a> {
    fragments: &'a FragmentTable,
    records: NormalizedRecords,
    /// Spreads being expanded on the current path.
    active: Vec<String>,
}

impl<'a> Walker<'a> {
    fn traverse(
        &mut self,
        id: &EntityId,
        object: &Map<String, Value>,
        selections: &'a [Selection],
    ) -> Result<(), CacheError> {
        self.traverse_selections(id, object, selections, &mut BTreeSet::new())
    }

    /// `expanded` holds the fragments already applied to this object.
    fn traverse_selections(
        &mut self,
        id: &EntityId,
        object: &Map<String, Value>,
        selections: &'a [Selection],
        expanded: &mut BTreeSet<&'a str>,
    ) -> Result<(), CacheError> {
        for selection in selections {
            match selection {
                Selection::Field(field) => self.normalize_field(id, object, field)?,
                Selection::FragmentSpread(spread) => {
                    let fragments = self.fragments;
                    let fragment = fragments.resolve(&spread.name, &self.active)?;
                    if !expanded.insert(spread.name.as_str()) {
                        continue;
                    }
                    self.active.push(spread.name.clone());
                    self.traverse_selections(id, object, &fragment.selections, expanded)?;
                    self.active.pop();
                }
                Selection::InlineFragment(inline) => {
                    self.traverse_selections(id, object, &inline.selections, expanded)?;
                }
            }
        }
        Ok(())
    }

    fn normalize_field(
        &mut self,
        id: &EntityId,
        object: &Map<String, Value>,
        field: &'a Field,
    ) -> Result<(), CacheError> {
        let key = field.storage_key()?;
        let Some(value) = object.get(field.response_key()) else {
            tracing::trace!(entity = %id, field = %key, "response has no value for field");
            return Ok(());
        };

        let stored = match (&field.selections, value) {
            (None, value) => Scalar::from_json(value)
                .map(FieldValue::Scalar)
                .ok_or_else(|| unsupported_shape(id, &key, "leaf field holds a list or object"))?,
            (Some(_), Value::Null) => FieldValue::Scalar(Scalar::Null),
            (Some(children), Value::Object(child)) => {
                let child_id =
                    entity_id_of(child).ok_or_else(|| CacheError::UnidentifiableEntity {
                        parent: id.clone(),
                        field: key.clone(),
                    })?;
                self.records.record_mut(&child_id);
                self.traverse(&child_id, child, children)?;
                FieldValue::reference(child_id)
            }
            (Some(_), Value::Array(_)) => {
                return Err(unsupported_shape(
                    id,
                    &key,
                    "list-typed selections are not supported",
                ));
            }
            (Some(_), _) => {
                return Err(unsupported_shape(
                    id,
                    &key,
                    "field with selections holds a scalar",
                ));
            }
        };

        self.records.record_mut(id).insert(key, stored);
        Ok(())
    }
}

/// Identity of a response object: its `id` string, or a stringified integer id.
fn entity_id_of(object: &Map<String, Value>) -> Option<EntityId> {
    match object.get(ID_FIELD)? {
        Value::String(id) => Some(EntityId::new(id.as_str())),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(EntityId::new(n.to_string())),
        _ => None,
    }
}

fn unsupported_shape(entity: &EntityId, field: &StorageKey, reason: &str) -> CacheError {
    CacheError::UnsupportedShape {
        entity: entity.clone(),
        field: field.clone(),
        reason: reason.to_owned(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use serde_json::json;

    fn run(query: &str, data: Value) -> Result<NormalizedRecords, CacheError> {
        let doc = Document::parse(query).expect("parse");
        let op = doc.operation(None).expect("operation");
        let data = data.as_object().cloned().expect("object");
        normalize(&op.selections, doc.fragments(), &data, &EntityId::root())
    }

    fn field<'r>(records: &'r NormalizedRecords, id: &str, key: &str) -> Option<&'r FieldValue> {
        records.get(&EntityId::new(id))?.get(&StorageKey::new(key))
    }

    #[test]
    fn flattens_nested_entities() {
        let records = run(
            r#"{ person(id: "p1") { id name species { id name } } }"#,
            json!({"person": {"id": "p1", "name": "Chewbacca", "species": {"id": "s1", "name": "Wookie"}}}),
        )
        .expect("normalize");

        assert_eq!(records.len(), 3);
        assert_eq!(
            field(&records, "client:root", r#"person{"id":"p1"}"#),
            Some(&FieldValue::reference(EntityId::new("p1")))
        );
        assert_eq!(
            field(&records, "p1", "species"),
            Some(&FieldValue::reference(EntityId::new("s1")))
        );
        assert_eq!(
            field(&records, "s1", "name"),
            Some(&FieldValue::Scalar(Scalar::String("Wookie".into())))
        );
    }

    #[test]
    fn alias_reads_response_key_but_stores_field_key() {
        let records = run(
            r#"{ a: person(id: "1") { id } b: person(id: "2") { id } }"#,
            json!({"a": {"id": "1"}, "b": {"id": "2"}}),
        )
        .expect("normalize");

        assert!(field(&records, "client:root", r#"person{"id":"1"}"#).is_some());
        assert!(field(&records, "client:root", r#"person{"id":"2"}"#).is_some());
        assert!(field(&records, "client:root", "a").is_none());
    }

    #[test]
    fn child_without_id_is_unidentifiable() {
        let result = run(
            "{ viewer { id profile { bio } } }",
            json!({"viewer": {"id": "v", "profile": {"bio": "hi"}}}),
        );
        assert_eq!(
            result,
            Err(CacheError::UnidentifiableEntity {
                parent: EntityId::new("v"),
                field: StorageKey::new("profile"),
            })
        );
    }

    #[test]
    fn lists_are_unsupported() {
        let result = run(
            "{ people { id } }",
            json!({"people": [{"id": "1"}]}),
        );
        assert!(matches!(result, Err(CacheError::UnsupportedShape { .. })));

        let leaf = run("{ tags }", json!({"tags": ["a", "b"]}));
        assert!(matches!(leaf, Err(CacheError::UnsupportedShape { .. })));
    }

    #[test]
    fn null_link_is_stored_as_null() {
        let records = run(
            "{ me { id friend { id } } }",
            json!({"me": {"id": "1", "friend": null}}),
        )
        .expect("normalize");
        assert_eq!(
            field(&records, "1", "friend"),
            Some(&FieldValue::Scalar(Scalar::Null))
        );
    }

    #[test]
    fn integer_ids_are_stringified() {
        let records = run("{ node { id } }", json!({"node": {"id": 42}})).expect("normalize");
        assert!(records.contains(&EntityId::new("42")));
    }

    #[test]
    fn absent_response_keys_are_skipped() {
        let records = run("{ me { id name } }", json!({"me": {"id": "1"}})).expect("normalize");
        assert!(field(&records, "1", "name").is_none());
        assert!(field(&records, "1", "id").is_some());
    }

    #[test]
    fn fragment_spreads_are_inlined() {
        let records = run(
            "query { me { ...Who } } fragment Who on User { id ...Name ... on User { age } }
             fragment Name on User { name }",
            json!({"me": {"id": "1", "name": "Han", "age": 32}}),
        )
        .expect("normalize");

        assert!(field(&records, "1", "name").is_some());
        assert!(field(&records, "1", "age").is_some());
    }

    #[test]
    fn fragment_cycles_are_rejected() {
        let result = run(
            "query { me { ...A } } fragment A on User { id ...B } fragment B on User { ...A }",
            json!({"me": {"id": "1"}}),
        );
        assert_eq!(
            result,
            Err(CacheError::FragmentCycle {
                path: vec!["A".into(), "B".into(), "A".into()],
            })
        );
    }

    #[test]
    fn shared_entity_is_merged_within_one_result() {
        let records = run(
            "{ a { id x } b { id y } }",
            json!({"a": {"id": "same", "x": 1}, "b": {"id": "same", "y": 2}}),
        )
        .expect("normalize");
        let same = records.get(&EntityId::new("same")).expect("record");
        assert_eq!(same.len(), 3);
    }

    /// `F1` through `F{n}`, each spreading the next `times` times; the last selects `name`.
    fn spread_chain(n: usize, times: usize) -> String {
        let mut source = String::new();
        for i in 1..n {
            source.push_str(&format!("fragment F{i} on User {{"));
            for _ in 0..times {
                source.push_str(&format!(" ...F{}", i + 1));
            }
            source.push_str(" }\n");
        }
        source.push_str(&format!("fragment F{n} on User {{ name }}\n"));
        source
    }

    #[test]
    fn linked_field_holding_scalar_is_unsupported() {
        let result = run(
            "{ me { id friend { id } } }",
            json!({"me": {"id": "1", "friend": "2"}}),
        );
        assert_eq!(
            result,
            Err(CacheError::UnsupportedShape {
                entity: EntityId::new("1"),
                field: StorageKey::new("friend"),
                reason: "field with selections holds a scalar".into(),
            })
        );
    }

    #[test]
    fn non_string_non_integer_ids_are_unidentifiable() {
        for id in [json!(null), json!(true), json!(1.5), json!({"n": 1})] {
            let result = run("{ node { id } }", json!({"node": {"id": id.clone()}}));
            assert_eq!(
                result,
                Err(CacheError::UnidentifiableEntity {
                    parent: EntityId::root(),
                    field: StorageKey::new("node"),
                }),
                "id {id}"
            );
        }
    }

    #[test]
    fn deep_spread_chain_fails_instead_of_overflowing() {
        let query = format!("query {{ me {{ id ...F1 }} }}\n{}", spread_chain(3000, 1));
        let result = run(&query, json!({"me": {"id": "1", "name": "Han"}}));
        assert!(
            matches!(result, Err(CacheError::FragmentDepthExceeded { limit: 500, .. })),
            "{result:?}"
        );
    }

    #[test]
    fn spread_chain_within_limit_is_inlined() {
        let query = format!("query {{ me {{ id ...F1 }} }}\n{}", spread_chain(100, 1));
        let records = run(&query, json!({"me": {"id": "1", "name": "Han"}})).expect("normalize");
        assert_eq!(
            field(&records, "1", "name"),
            Some(&FieldValue::Scalar(Scalar::String("Han".into())))
        );
    }

    #[test]
    fn repeated_spreads_are_applied_once() {
        // Every level spreads the next one twice: 2^40 expansions without dedup.
        let query = format!("query {{ me {{ id ...F1 ...F1 }} }}\n{}", spread_chain(40, 2));
        let records = run(&query, json!({"me": {"id": "1", "name": "Han"}})).expect("normalize");
        assert_eq!(records.len(), 2);
        assert!(field(&records, "1", "name").is_some());
    }
}
