//! Configuration system
//!
//! Loads ~/.config/graphcache/config.yaml with support for:
//! - Entity store location and SQLite tuning
//! - Remote graph API endpoint and token lookup
//! - Sync engine defaults

mod graphcache_config;
pub mod validation;

pub use graphcache_config::{GraphApiConfig, GraphCacheConfig, StoreConfig, SyncConfig};
pub use validation::{validate_config, validate_config_result, ValidationError};
