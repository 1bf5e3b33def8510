//! Synchronization of remote graph data into the entity store
//!
//! [`SyncEngine`] pulls nodes and edge lists through a [`GraphFetcher`] and
//! merges them into an [`EntityStore`]. Merges are idempotent: re-running a
//! refresh never duplicates entities or relationships, and absent fields never
//! erase cached ones.
//!
//! [`GraphFetcher`]: crate::fetch::GraphFetcher
//! [`EntityStore`]: crate::store::EntityStore

mod engine;
mod report;

pub use engine::SyncEngine;
pub use report::{EdgeRefresh, EdgeSyncReport};
