//! Remote graph access
//!
//! The sync engine only needs two capabilities from the remote API: fetch one
//! node, and fetch the edge list of a node. [`GraphFetcher`] is that boundary;
//! [`HttpGraphFetcher`] implements it over the Graph API's REST endpoints.

mod http;

pub use http::{parse_edge_page, HttpGraphFetcher};

use crate::codec::RawDocument;
use crate::graph::EntityId;
use async_trait::async_trait;

/// Fetch failures reported by a [`GraphFetcher`]
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Graph API error: {0}")]
    Api(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{0}")]
    Other(String),
}

/// The peers of one node as returned by a [`GraphFetcher`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeList {
    /// One document per peer, in response order
    pub peers: Vec<RawDocument>,

    /// False when the fetcher stopped before the last page
    pub complete: bool,
}

impl EdgeList {
    /// A list holding every peer of the node
    pub fn complete(peers: Vec<RawDocument>) -> Self {
        Self {
            peers,
            complete: true,
        }
    }

    /// A list cut short; callers must not treat missing peers as removed
    pub fn truncated(peers: Vec<RawDocument>) -> Self {
        Self {
            peers,
            complete: false,
        }
    }
}

/// Source of remote graph data
///
/// Implementations apply their own timeout policy and never retry; a failure
/// is returned to the caller as-is.
#[async_trait]
pub trait GraphFetcher: Send + Sync {
    /// Fetch the document describing one node
    async fn fetch_node(&self, id: &EntityId) -> Result<RawDocument, FetchError>;

    /// Fetch the peers of a node
    async fn fetch_edges(&self, id: &EntityId) -> Result<EdgeList, FetchError>;
}
