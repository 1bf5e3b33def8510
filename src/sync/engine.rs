//! Sync engine

use super::{EdgeRefresh, EdgeSyncReport};
use crate::codec::{self, RawDocument};
use crate::config::SyncConfig;
use crate::fetch::{FetchError, GraphFetcher};
use crate::graph::{project, project_stub, CachedFields, EntityId};
use crate::observe::{SyncObserver, TracingObserver};
use crate::store::{EntityStore, FieldMerge};
use crate::{GraphCacheError, Result};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Merges remote graph data into an entity store
///
/// Holds no per-call state; clones share the same fetcher, store and observer.
#[derive(Clone)]
pub struct SyncEngine {
    fetcher: Arc<dyn GraphFetcher>,
    store: Arc<dyn EntityStore>,
    observer: Arc<dyn SyncObserver>,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(fetcher: Arc<dyn GraphFetcher>, store: Arc<dyn EntityStore>) -> Self {
        Self {
            fetcher,
            store,
            observer: Arc::new(TracingObserver),
            config: SyncConfig::default(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Edge refresh options using the configured pruning default
    pub fn default_edge_refresh(&self) -> EdgeRefresh {
        EdgeRefresh::fetch().with_prune(self.config.prune_edges)
    }

    /// Refresh one entity and return its document
    ///
    /// Without `fetch` this only reads the store and returns the cached raw
    /// document (`{}` for unknown ids). With `fetch` the node is fetched,
    /// its recognized fields overwrite the cached ones, and the raw document is
    /// replaced. Fetch failures and malformed documents leave the store untouched.
    pub async fn refresh_entity(&self, id: &EntityId, fetch: bool) -> Result<Value> {
        if !fetch {
            let stored = self.store.get(id)?;
            return Ok(stored
                .map(|entity| entity.raw_document)
                .unwrap_or_else(codec::empty_document));
        }

        let document = self.fetch_document(id).await?;
        let fields = project(&document);
        let (_, created) = self
            .store
            .merge(id, &FieldMerge::direct(document.clone(), fields))?;

        self.observer.entity_refreshed(id, created);
        Ok(document)
    }

    /// Fetch and decode a node without storing anything
    pub async fn peek_entity(&self, id: &EntityId) -> Result<Value> {
        self.fetch_document(id).await
    }

    /// Refresh the relationships of one entity
    ///
    /// Each peer in the fetched edge list is created as a stub if unknown and
    /// related to `id`. Known peers keep their cached fields. With
    /// `options.prune`, stored relationships absent from the fetched list are
    /// removed once every addition is persisted, unless some payload had to be
    /// skipped or the fetcher returned a truncated list.
    pub async fn refresh_edges(&self, id: &EntityId, options: EdgeRefresh) -> Result<EdgeSyncReport> {
        if !options.fetch {
            let peers = self.store.list_relationships(id)?;
            return Ok(EdgeSyncReport {
                peers: peers.into_iter().collect(),
                ..Default::default()
            });
        }

        let edges = self
            .fetcher
            .fetch_edges(id)
            .await
            .map_err(|source| self.fetch_failed(id, source))?;

        self.store.get_or_create(id)?;

        let mut report = EdgeSyncReport::default();
        let mut fetched = BTreeSet::new();

        for (index, payload) in edges.peers.iter().enumerate() {
            let Some((peer_id, stub)) = self.edge_payload(id, index, payload) else {
                report.skipped += 1;
                continue;
            };

            // Self-references carry no relationship and say nothing about completeness
            if &peer_id == id {
                debug!(id = %id, index, "Ignoring self-referencing edge payload");
                continue;
            }

            if !fetched.insert(peer_id.clone()) {
                continue;
            }

            let (_, created) = self.store.get_or_create(&peer_id)?;
            if created {
                if !stub.is_empty() {
                    self.store.merge(&peer_id, &FieldMerge::edge(stub))?;
                }
                report.created_peers.push(peer_id.clone());
            }

            if self.store.add_relationship(id, &peer_id)? {
                report.added.push(peer_id.clone());
            }
            report.peers.push(peer_id);
        }

        report.truncated = !edges.complete;

        if options.prune {
            if report.skipped > 0 || report.truncated {
                info!(
                    id = %id,
                    skipped = report.skipped,
                    truncated = report.truncated,
                    "Edge list incomplete, not pruning"
                );
                report.prune_withheld = true;
            } else {
                let stored = self.store.list_relationships(id)?;
                let stale: BTreeSet<EntityId> = stored.difference(&fetched).cloned().collect();
                if !stale.is_empty() {
                    self.store.remove_relationships(id, &stale)?;
                    report.pruned = stale.into_iter().collect();
                }
            }
        }

        self.observer.edges_refreshed(id, &report);
        Ok(report)
    }

    /// Refresh many entities concurrently
    ///
    /// At most `concurrency` refreshes run at once. Results come back in the
    /// order of `ids`; one failure does not stop the others.
    pub async fn refresh_entities(&self, ids: &[EntityId], fetch: bool) -> Vec<(EntityId, Result<Value>)> {
        let concurrency = self.config.concurrency.max(1);
        debug!(count = ids.len(), concurrency, "Refreshing entities");

        let mut results: Vec<(usize, EntityId, Result<Value>)> = stream::iter(ids.iter().cloned().enumerate())
            .map(|(index, id)| async move {
                let result = self.refresh_entity(&id, fetch).await;
                (index, id, result)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        results.sort_by_key(|(index, _, _)| *index);
        results
            .into_iter()
            .map(|(_, id, result)| (id, result))
            .collect()
    }

    async fn fetch_document(&self, id: &EntityId) -> Result<Value> {
        let raw = self
            .fetcher
            .fetch_node(id)
            .await
            .map_err(|source| self.fetch_failed(id, source))?;

        let context = format!("node {}", id);
        let document = raw.decode().map_err(|e| {
            let reason = e.to_string();
            self.observer.malformed_document(&context, &reason);
            GraphCacheError::malformed(&context, reason)
        })?;

        if !document.is_object() {
            let reason = "document is not a mapping";
            self.observer.malformed_document(&context, reason);
            return Err(GraphCacheError::malformed(context, reason));
        }

        Ok(document)
    }

    /// Peer id and stub fields of one edge payload, or None if it must be skipped
    fn edge_payload(
        &self,
        subject: &EntityId,
        index: usize,
        payload: &RawDocument,
    ) -> Option<(EntityId, CachedFields)> {
        let skip = |reason: String| {
            self.observer.payload_skipped(subject, &reason);
            None
        };

        let value = match payload.decode() {
            Ok(value) => value,
            Err(e) => {
                self.observer
                    .malformed_document(&format!("edge payload {} of {}", index, subject), &e.to_string());
                return skip(format!("payload {} is malformed", index));
            }
        };

        if !value.is_object() {
            return skip(format!("payload {} is not a mapping", index));
        }

        let Some(peer_id) = value.get("id").and_then(EntityId::from_json) else {
            return skip(format!("payload {} has no id", index));
        };

        Some((peer_id, project_stub(&value)))
    }

    fn fetch_failed(&self, id: &EntityId, source: FetchError) -> GraphCacheError {
        self.observer.fetch_failed(id, &source);
        GraphCacheError::FetchFailed {
            id: id.to_string(),
            source,
        }
    }
}
