//! Sync observability
//!
//! The sync engine and the store report notable events (corrupt stored
//! documents, fetch failures, completed refreshes) to an injected
//! [`SyncObserver`] instead of a process-wide logger.

use crate::fetch::FetchError;
use crate::graph::EntityId;
use crate::sync::EdgeSyncReport;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Receiver for sync and storage events
///
/// Every method has a no-op default so implementors only override what they need.
pub trait SyncObserver: Send + Sync {
    /// Document text failed to parse or had the wrong shape
    fn malformed_document(&self, _context: &str, _reason: &str) {}

    /// The remote fetch for `id` failed
    fn fetch_failed(&self, _id: &EntityId, _error: &FetchError) {}

    /// A direct node fetch was merged into the store
    fn entity_refreshed(&self, _id: &EntityId, _created: bool) {}

    /// An edge list was merged into the store
    fn edges_refreshed(&self, _id: &EntityId, _report: &EdgeSyncReport) {}

    /// One edge payload was ignored
    fn payload_skipped(&self, _id: &EntityId, _reason: &str) {}
}

/// Observer that forwards every event to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn malformed_document(&self, context: &str, reason: &str) {
        tracing::error!(context = %context, reason = %reason, "Malformed document, treating as empty");
    }

    fn fetch_failed(&self, id: &EntityId, error: &FetchError) {
        tracing::warn!(id = %id, error = %error, "Graph fetch failed");
    }

    fn entity_refreshed(&self, id: &EntityId, created: bool) {
        tracing::debug!(id = %id, created, "Entity refreshed");
    }

    fn edges_refreshed(&self, id: &EntityId, report: &EdgeSyncReport) {
        tracing::info!(
            id = %id,
            peers = report.peers.len(),
            created = report.created_peers.len(),
            added = report.added.len(),
            pruned = report.pruned.len(),
            skipped = report.skipped,
            truncated = report.truncated,
            "Edges refreshed"
        );
    }

    fn payload_skipped(&self, id: &EntityId, reason: &str) {
        tracing::warn!(id = %id, reason = %reason, "Skipping edge payload");
    }
}

/// Observer that counts events
///
/// Useful for health reporting and for asserting on sync behaviour in tests.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    malformed: AtomicUsize,
    fetch_failures: AtomicUsize,
    entities_refreshed: AtomicUsize,
    edges_refreshed: AtomicUsize,
    payloads_skipped: AtomicUsize,
    malformed_contexts: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn malformed_count(&self) -> usize {
        self.malformed.load(Ordering::SeqCst)
    }

    pub fn fetch_failure_count(&self) -> usize {
        self.fetch_failures.load(Ordering::SeqCst)
    }

    pub fn entities_refreshed(&self) -> usize {
        self.entities_refreshed.load(Ordering::SeqCst)
    }

    pub fn edges_refreshed(&self) -> usize {
        self.edges_refreshed.load(Ordering::SeqCst)
    }

    pub fn payloads_skipped(&self) -> usize {
        self.payloads_skipped.load(Ordering::SeqCst)
    }

    /// Contexts of every malformed document seen so far, oldest first
    pub fn malformed_contexts(&self) -> Vec<String> {
        match self.malformed_contexts.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl SyncObserver for RecordingObserver {
    fn malformed_document(&self, context: &str, reason: &str) {
        TracingObserver.malformed_document(context, reason);
        self.malformed.fetch_add(1, Ordering::SeqCst);
        match self.malformed_contexts.lock() {
            Ok(mut guard) => guard.push(context.to_string()),
            Err(poisoned) => poisoned.into_inner().push(context.to_string()),
        }
    }

    fn fetch_failed(&self, id: &EntityId, error: &FetchError) {
        TracingObserver.fetch_failed(id, error);
        self.fetch_failures.fetch_add(1, Ordering::SeqCst);
    }

    fn entity_refreshed(&self, _id: &EntityId, _created: bool) {
        self.entities_refreshed.fetch_add(1, Ordering::SeqCst);
    }

    fn edges_refreshed(&self, _id: &EntityId, _report: &EdgeSyncReport) {
        self.edges_refreshed.fetch_add(1, Ordering::SeqCst);
    }

    fn payload_skipped(&self, id: &EntityId, reason: &str) {
        TracingObserver.payload_skipped(id, reason);
        self.payloads_skipped.fetch_add(1, Ordering::SeqCst);
    }
}
