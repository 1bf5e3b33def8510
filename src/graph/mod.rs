//! Core graph data structures
//!
//! Defines EntityId, CachedFields, GraphEntity, and the table that projects
//! response keys onto cached fields.

mod entity;
mod ids;
mod projection;

pub use entity::{CachedFields, GraphEntity, MergePolicy};
pub use ids::EntityId;
pub use projection::{project, project_stub, FieldProjection, PROJECTIONS};
