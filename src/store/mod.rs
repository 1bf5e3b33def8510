//! Entity persistence
//!
//! [`EntityStore`] is the persistence boundary the sync engine writes through.
//! Implementations must make `get_or_create` and `merge` atomic per row and
//! give relationships set semantics. [`SqliteStore`] is the SQLite-backed
//! implementation.

mod sqlite;

pub use sqlite::{SqliteStore, StoreStats};

use crate::graph::{CachedFields, EntityId, GraphEntity, MergePolicy};
use crate::Result;
use serde_json::Value;
use std::collections::BTreeSet;

/// A change to apply to one entity row
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMerge {
    /// Incoming projections
    pub fields: CachedFields,

    /// Replacement raw document; `None` leaves the stored one alone
    pub raw_document: Option<Value>,

    pub policy: MergePolicy,
}

impl FieldMerge {
    /// Result of a direct node fetch: replace the raw document, overwrite present fields
    pub fn direct(raw_document: Value, fields: CachedFields) -> Self {
        Self {
            fields,
            raw_document: Some(raw_document),
            policy: MergePolicy::Overwrite,
        }
    }

    /// Edge-derived data: fill empty fields only, never touch the raw document
    pub fn edge(fields: CachedFields) -> Self {
        Self {
            fields,
            raw_document: None,
            policy: MergePolicy::FillMissing,
        }
    }
}

/// Persistence for graph entities and their relationships
pub trait EntityStore: Send + Sync {
    /// Load an entity
    fn get(&self, id: &EntityId) -> Result<Option<GraphEntity>>;

    /// Load an entity, creating an id-only stub if it does not exist
    ///
    /// Returns the entity and whether this call created it. When two callers
    /// race on the same id, exactly one sees `true` and both get the same row.
    fn get_or_create(&self, id: &EntityId) -> Result<(GraphEntity, bool)>;

    /// Write a whole entity row (last write wins), keeping its creation time
    fn save(&self, entity: &GraphEntity) -> Result<GraphEntity>;

    /// Get-or-create and merge `update` into the row as one atomic step
    fn merge(&self, id: &EntityId, update: &FieldMerge) -> Result<(GraphEntity, bool)>;

    /// Relate two entities; returns false if they were already related
    ///
    /// Relating an entity to itself is a no-op.
    fn add_relationship(&self, a: &EntityId, b: &EntityId) -> Result<bool>;

    /// Peers of an entity
    fn list_relationships(&self, id: &EntityId) -> Result<BTreeSet<EntityId>>;

    /// Unrelate two entities; returns false if they were not related
    fn remove_relationship(&self, a: &EntityId, b: &EntityId) -> Result<bool>;

    /// Unrelate `id` from every peer in `peers` as one atomic step
    fn remove_relationships(&self, id: &EntityId, peers: &BTreeSet<EntityId>) -> Result<usize>;

    /// Number of stored entities
    fn count_entities(&self) -> Result<usize>;
}
