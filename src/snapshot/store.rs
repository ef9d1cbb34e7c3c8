// src/snapshot/store.rs

//! Hot snapshot holder.
//!
//! The store owns the single pointer the query path reads. Readers clone
//! the `Arc` under a short read lock and keep answering from their copy
//! for as long as they hold it; a reload builds the replacement entirely
//! out-of-band and publishes it with one pointer swap. The superseded
//! snapshot is freed when its last reader drops it.

use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::snapshot::{ArtifactFetcher, Snapshot, load};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Result of a refresh round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new snapshot was published; carries its version.
    Refreshed(DateTime<Utc>),
    /// Another reload was already in flight; nothing was done.
    AlreadyInProgress,
}

/// Holds the current snapshot and coordinates reloads.
///
/// At most one reload runs at a time; queries never block on one.
pub struct SnapshotStore {
    current: RwLock<Option<Arc<Snapshot>>>,
    reloading: AtomicBool,
    metrics: Arc<Metrics>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
            reloading: AtomicBool::new(false),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// The snapshot queries should run against, or `None` before the
    /// first successful load ("not ready", never a crash).
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.read().clone()
    }

    /// Version identity of the current snapshot.
    pub fn version(&self) -> Option<DateTime<Utc>> {
        self.current().and_then(|s| s.version())
    }

    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Atomically publish a fully built snapshot. Readers in flight keep
    /// the previous one until they drop it.
    pub fn publish(&self, snapshot: Snapshot) {
        *self.current.write() = Some(Arc::new(snapshot));
    }

    /// Load an artifact from disk and publish it. Used at startup and by
    /// tests; failures leave the previous snapshot (if any) serving.
    pub fn load_from(&self, path: &Path) -> Result<DateTime<Utc>> {
        let snapshot = load(path)?;
        let version = snapshot
            .version()
            .ok_or_else(|| Error::CorruptArtifact("artifact has no dbchange row".to_string()))?;
        self.publish(snapshot);
        Ok(version)
    }

    /// Fetch the remote artifact and swap in the freshly built snapshot.
    ///
    /// Failure handling per the recoverable taxonomy: a fetch failure or
    /// corrupt artifact keeps the previous snapshot live, counts the
    /// failure and returns the error to the caller for logging; neither
    /// is fatal.
    pub async fn refresh(&self, fetcher: &ArtifactFetcher) -> Result<RefreshOutcome> {
        if self
            .reloading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Snapshot reload already in progress, skipping");
            return Ok(RefreshOutcome::AlreadyInProgress);
        }
        let result = self.refresh_inner(fetcher).await;
        self.reloading.store(false, Ordering::Release);
        result
    }

    async fn refresh_inner(&self, fetcher: &ArtifactFetcher) -> Result<RefreshOutcome> {
        self.metrics.record_reload_attempt();

        let path = match fetcher.fetch().await {
            Ok(path) => path,
            Err(e) => {
                self.metrics.record_fetch_failure();
                return Err(e);
            }
        };

        // Parsing and index building are CPU-bound; keep them off the
        // async workers serving queries and protocol traffic.
        let snapshot = match tokio::task::spawn_blocking(move || load(&path)).await {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                self.metrics.record_corrupt_artifact();
                return Err(e);
            }
            Err(e) => {
                self.metrics.record_corrupt_artifact();
                return Err(Error::IoError(format!("snapshot load task failed: {e}")));
            }
        };

        let version = snapshot
            .version()
            .ok_or_else(|| Error::CorruptArtifact("artifact has no dbchange row".to_string()))?;
        self.publish(snapshot);
        self.metrics.record_reload_complete();
        info!("Snapshot refreshed to version {}", version.to_rfc3339());
        Ok(RefreshOutcome::Refreshed(version))
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
