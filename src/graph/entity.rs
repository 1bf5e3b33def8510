//! Graph entity data structure
//!
//! A cached remote node: its id, typed projections of selected response
//! fields, the last fetched response verbatim, and audit timestamps.

use super::EntityId;
use crate::codec;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// How incoming cached fields combine with stored ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Direct fetch: incoming values replace stored ones, absent values keep them
    Overwrite,
    /// Edge-derived data: incoming values only fill fields that are still empty
    FillMissing,
}

/// Typed projections of selected response fields
///
/// Each field is independently optional; `None` means "never seen".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Profile URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Location display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

fn merge_field<T: Clone>(current: &mut Option<T>, incoming: &Option<T>, policy: MergePolicy) -> bool {
    let Some(value) = incoming else {
        return false;
    };
    if policy == MergePolicy::FillMissing && current.is_some() {
        return false;
    }
    *current = Some(value.clone());
    true
}

impl CachedFields {
    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge `incoming` into `self`, returning how many fields were written
    ///
    /// Absent incoming values never clear a stored value.
    pub fn merge(&mut self, incoming: &CachedFields, policy: MergePolicy) -> usize {
        [
            merge_field(&mut self.first_name, &incoming.first_name, policy),
            merge_field(&mut self.last_name, &incoming.last_name, policy),
            merge_field(&mut self.name, &incoming.name, policy),
            merge_field(&mut self.link, &incoming.link, policy),
            merge_field(&mut self.birthday, &incoming.birthday, policy),
            merge_field(&mut self.email, &incoming.email, policy),
            merge_field(&mut self.location, &incoming.location, policy),
            merge_field(&mut self.gender, &incoming.gender, policy),
            merge_field(&mut self.locale, &incoming.locale, policy),
        ]
        .into_iter()
        .filter(|written| *written)
        .count()
    }
}

/// A persisted graph node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEntity {
    /// Stable external identifier, immutable once stored
    pub id: EntityId,

    /// Queryable projections of the raw document
    #[serde(default)]
    pub fields: CachedFields,

    /// Most recent fetched response; an empty mapping if never fetched
    #[serde(default = "codec::empty_document")]
    pub raw_document: Value,

    /// First persistence time
    pub created: DateTime<Utc>,

    /// Last persistence time
    pub updated: DateTime<Utc>,
}

impl GraphEntity {
    /// Create an unsaved entity with only its id set
    pub fn new(id: impl Into<EntityId>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            fields: CachedFields::default(),
            raw_document: codec::empty_document(),
            created: now,
            updated: now,
        }
    }

    /// Whether this entity was only ever seen as someone's peer
    pub fn is_stub(&self) -> bool {
        codec::is_empty_document(&self.raw_document)
    }

    /// `"<name> (<id>)"`, or just the id when no name is cached
    pub fn display_name(&self) -> String {
        match self.fields.name.as_deref() {
            Some(name) => format!("{} ({})", name, self.id),
            None => self.id.to_string(),
        }
    }

    /// Update the timestamp to now
    pub fn touch(&mut self) {
        self.updated = Utc::now();
    }
}

impl fmt::Display for GraphEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
