//! # Record Store
//!
//! The mapping EntityId -> Record that owns all normalized data.
//!
//! Records are created or updated only by [`RecordStore::merge`], which takes a
//! complete normalization result. A result is applied in one call that cannot
//! fail halfway, so a merge is either fully visible or not at all.

use crate::normalizer::NormalizedRecords;
use crate::{EntityId, Record, StorageKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// RECORDSOURCE TRAIT
// =============================================================================

/// Read access to a set of records.
///
/// Implemented by the store and by normalization results, so the selector can
/// read either.
pub trait RecordSource {
    /// Look up the record of an entity.
    fn get(&self, id: &EntityId) -> Option<&Record>;

    /// Number of entities.
    fn len(&self) -> usize;

    /// Check whether an entity is present.
    fn contains(&self, id: &EntityId) -> bool {
        self.get(id).is_some()
    }

    /// Check whether there are no entities.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// RECORD STORE
// =============================================================================

/// Counts reported by a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeSummary {
    /// Entities that did not exist before.
    pub created: usize,
    /// Existing entities that received fields.
    pub updated: usize,
}

/// A reference whose target is absent from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingLink {
    /// Entity holding the reference.
    pub entity: EntityId,
    /// Storage key of the reference.
    pub field: StorageKey,
    /// Missing target.
    pub target: EntityId,
}

/// The normalized store.
///
/// Uses `BTreeMap` so snapshots serialize in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordStore {
    records: BTreeMap<EntityId, Record>,
}

impl RecordStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Union a normalization result into the store.
    ///
    /// Per entity, incoming keys overwrite existing ones and keys absent from
    /// the incoming record are kept. Entities are created when missing.
    pub fn merge(&mut self, incoming: NormalizedRecords) -> MergeSummary {
        let mut summary = MergeSummary::default();
        for (id, record) in incoming {
            match self.records.get_mut(&id) {
                Some(existing) => {
                    existing.absorb(record);
                    summary.updated += 1;
                }
                None => {
                    self.records.insert(id, record);
                    summary.created += 1;
                }
            }
        }
        tracing::debug!(
            created = summary.created,
            updated = summary.updated,
            total = self.records.len(),
            "merged normalized records"
        );
        summary
    }

    /// All entity ids in order.
    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.records.keys()
    }

    /// All (id, record) pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Record)> {
        self.records.iter()
    }

    /// Every reference whose target is not in the store.
    ///
    /// Empty after any sequence of merges of normalizer output.
    #[must_use]
    pub fn dangling_references(&self) -> Vec<DanglingLink> {
        self.records
            .iter()
            .flat_map(|(entity, record)| {
                record
                    .references()
                    .filter(|(_, target)| !self.records.contains_key(target))
                    .map(move |(field, target)| DanglingLink {
                        entity: entity.clone(),
                        field: field.clone(),
                        target: target.clone(),
                    })
            })
            .collect()
    }
}

impl RecordSource for RecordStore {
    fn get(&self, id: &EntityId) -> Option<&Record> {
        self.records.get(id)
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

impl FromIterator<(EntityId, Record)> for RecordStore {
    fn from_iter<I: IntoIterator<Item = (EntityId, Record)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
