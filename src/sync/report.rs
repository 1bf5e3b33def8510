//! Edge refresh options and results

use crate::graph::EntityId;

/// Options for [`SyncEngine::refresh_edges`](super::SyncEngine::refresh_edges)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeRefresh {
    /// Call the remote API; when false only the stored peer set is read
    pub fetch: bool,

    /// Remove stored relationships missing from the fetched edge list
    pub prune: bool,
}

impl EdgeRefresh {
    /// Read stored relationships only
    pub fn stored() -> Self {
        Self::default()
    }

    /// Fetch and merge without pruning
    pub fn fetch() -> Self {
        Self {
            fetch: true,
            prune: false,
        }
    }

    pub fn with_prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }
}

/// Outcome of one edge refresh
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EdgeSyncReport {
    /// Peer ids, in response order without duplicates (stored order when not fetching)
    pub peers: Vec<EntityId>,

    /// Peers that did not exist before this refresh
    pub created_peers: Vec<EntityId>,

    /// Peers newly related to the subject
    pub added: Vec<EntityId>,

    /// Peers whose relationship was pruned
    pub pruned: Vec<EntityId>,

    /// Payloads ignored as malformed or id-less
    pub skipped: usize,

    /// The fetcher stopped before the end of the edge list
    pub truncated: bool,

    /// Pruning was requested but not applied because the fetched list was incomplete
    pub prune_withheld: bool,
}

impl EdgeSyncReport {
    /// Check if the refresh changed the store
    pub fn has_changes(&self) -> bool {
        !self.created_peers.is_empty() || !self.added.is_empty() || !self.pruned.is_empty()
    }

    /// Total number of changes
    pub fn change_count(&self) -> usize {
        self.created_peers.len() + self.added.len() + self.pruned.len()
    }
}
