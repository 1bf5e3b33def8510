//! Type-safe ID wrapper for graph entities

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// External identifier of a graph entity
///
/// The remote API hands out either numeric ids (e.g. `4`) or string ids
/// (e.g. `"100004"`); both are normalized to their decimal text form so the
/// same entity never ends up under two keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create a new EntityId from a string
    ///
    /// # Arguments
    /// * `id` - The entity ID string (e.g., "100004")
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Read an id out of a JSON value
    ///
    /// Accepts non-empty strings and integers; anything else yields `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(Self::new(s.trim())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::from(i))
                } else {
                    n.as_u64().map(Self::from)
                }
            }
            _ => None,
        }
    }

    /// Get the underlying string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id as an integer, when it is numeric
    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<i64> for EntityId {
    fn from(i: i64) -> Self {
        Self(i.to_string())
    }
}

impl From<u64> for EntityId {
    fn from(i: u64) -> Self {
        Self(i.to_string())
    }
}

impl From<&EntityId> for EntityId {
    fn from(id: &EntityId) -> Self {
        id.clone()
    }
}
