//! Error types for GraphCache
//!
//! Defines the error enum covering the failure modes of the codec, the remote
//! fetcher, the entity store and the configuration file. Uses thiserror for ergonomic error handling.

use crate::fetch::FetchError;
use thiserror::Error;

/// Result type alias for GraphCache operations
pub type Result<T> = std::result::Result<T, GraphCacheError>;

/// Error type for GraphCache operations
#[derive(Error, Debug)]
pub enum GraphCacheError {
    /// Incoming document text failed to parse or had the wrong shape
    #[error("Malformed document ({context}): {reason}")]
    MalformedDocument { context: String, reason: String },

    /// The remote fetch for an entity failed; nothing was written
    #[error("Fetch failed for {id}: {source}")]
    FetchFailed {
        id: String,
        #[source]
        source: FetchError,
    },

    /// A creation race on the same id that did not resolve to a surviving row
    #[error("Store conflict: {0}")]
    StoreConflict(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// SQLite database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl GraphCacheError {
    /// Build a `MalformedDocument` error
    pub fn malformed(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from the remote fetcher
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::FetchFailed { .. })
    }

    /// Whether this error reports a malformed document
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedDocument { .. })
    }
}
