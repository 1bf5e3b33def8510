//! GraphCache - a local cache of a remote social graph
//!
//! GraphCache keeps entities (people, pages) fetched from a remote graph API in
//! a local SQLite store, together with the relationships between them. Remote
//! data is merged idempotently: refreshing twice never duplicates anything,
//! and partial responses never erase what is already cached.
//!
//! # Architecture
//!
//! - **codec**: Text encoding of semi-structured documents
//! - **graph**: Core data structures (EntityId, GraphEntity, field projections)
//! - **fetch**: Remote graph access (GraphFetcher, HTTP adapter)
//! - **store**: Entity persistence (EntityStore, SQLite)
//! - **sync**: Refresh algorithms (SyncEngine)
//! - **observe**: Injected observers for sync events
//! - **config**: YAML configuration file and validation

// Core modules
pub mod codec;
pub mod config;
pub mod error;
pub mod graph;

// Components
pub mod fetch;
pub mod logging;
pub mod observe;
pub mod store;
pub mod sync;

// Re-exports
pub use error::{GraphCacheError, Result};
