// src/metrics.rs

//! Process metrics tracking.
//!
//! Simple atomic counters for reload and protocol statistics, exposable
//! through a serializable snapshot.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Metrics collector shared across the cache and protocol components.
#[derive(Default)]
pub struct Metrics {
    /// Reload rounds started
    reloads_attempted: AtomicU64,
    /// Reload rounds that published a new snapshot
    reloads_completed: AtomicU64,
    /// Artifact downloads that failed (previous snapshot kept serving)
    fetch_failures: AtomicU64,
    /// Artifacts fetched but rejected as corrupt
    corrupt_artifacts: AtomicU64,
    /// Resolver batches answered
    queries_served: AtomicU64,
    /// Protocol connections accepted
    connections_opened: AtomicU64,
    /// Protocol connections closed or evicted
    connections_closed: AtomicU64,
    /// Convergence rounds completed (fleet-converged sent)
    rounds_converged: AtomicU64,
    /// Process start time
    start_time: std::sync::OnceLock<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        let metrics = Self::default();
        let _ = metrics.start_time.set(Instant::now());
        metrics
    }

    pub fn record_reload_attempt(&self) {
        self.reloads_attempted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reload_complete(&self) {
        self.reloads_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_corrupt_artifact(&self) {
        self.corrupt_artifacts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query(&self) {
        self.queries_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_round_converged(&self) {
        self.rounds_converged.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let uptime = self
            .start_time
            .get()
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO);

        MetricsSnapshot {
            reloads_attempted: self.reloads_attempted.load(Ordering::Relaxed),
            reloads_completed: self.reloads_completed.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            corrupt_artifacts: self.corrupt_artifacts.load(Ordering::Relaxed),
            queries_served: self.queries_served.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            rounds_converged: self.rounds_converged.load(Ordering::Relaxed),
            uptime_secs: uptime.as_secs(),
        }
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub reloads_attempted: u64,
    pub reloads_completed: u64,
    pub fetch_failures: u64,
    pub corrupt_artifacts: u64,
    pub queries_served: u64,
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub rounds_converged: u64,
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counters() {
        let metrics = Metrics::new();
        metrics.record_reload_attempt();
        metrics.record_reload_attempt();
        metrics.record_reload_complete();
        metrics.record_fetch_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.reloads_attempted, 2);
        assert_eq!(snapshot.reloads_completed, 1);
        assert_eq!(snapshot.fetch_failures, 1);
        assert_eq!(snapshot.corrupt_artifacts, 0);
    }
}
