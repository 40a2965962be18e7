//! Metrics hooks for covering filter maintenance
//!
//! Counts subscription churn and what the service published to peers.
//!
//! ## Usage
//!
//! ```ignore
//! use covering_filter::metrics::{Metrics, MetricsRecorder};
//!
//! let metrics = Metrics::new();
//! metrics.record_topic_added(4);
//! metrics.record_base_published(131_072);
//! assert_eq!(metrics.snapshot().bases_published, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector for covering filter operations
///
/// Thread-safe counters for monitoring filter maintenance.
#[derive(Default)]
pub struct Metrics {
    /// Topics inserted into the counting filter
    pub topics_added: AtomicU64,
    /// Topics removed from the counting filter
    pub topics_removed: AtomicU64,
    /// Bin deltas produced by add/remove
    pub bin_deltas: AtomicU64,
    /// Base filters published
    pub bases_published: AtomicU64,
    /// Bytes of bit vector published in bases
    pub base_bytes_published: AtomicU64,
    /// Incremental updates published
    pub updates_published: AtomicU64,
    /// Filter rebuilds after crossing the FPP threshold
    pub filter_resizes: AtomicU64,
    /// Publications rejected by the publisher
    pub publish_failures: AtomicU64,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a topic insertion and the number of bins it switched on
    pub fn record_topic_added(&self, deltas: usize) {
        self.topics_added.fetch_add(1, Ordering::Relaxed);
        self.bin_deltas.fetch_add(deltas as u64, Ordering::Relaxed);
    }

    /// Record a topic removal and the number of bins it switched off
    pub fn record_topic_removed(&self, deltas: usize) {
        self.topics_removed.fetch_add(1, Ordering::Relaxed);
        self.bin_deltas.fetch_add(deltas as u64, Ordering::Relaxed);
    }

    /// Record a base publication
    ///
    /// # Arguments
    /// * `num_bits` - Size of the published bit vector
    pub fn record_base_published(&self, num_bits: u64) {
        self.bases_published.fetch_add(1, Ordering::Relaxed);
        self.base_bytes_published
            .fetch_add(num_bits.div_ceil(8), Ordering::Relaxed);
    }

    /// Record an incremental update publication
    pub fn record_update_published(&self, _count: usize) {
        self.updates_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a filter rebuild
    pub fn record_resize(&self, _num_counters: u64) {
        self.filter_resizes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed publication
    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            topics_added: self.topics_added.load(Ordering::Relaxed),
            topics_removed: self.topics_removed.load(Ordering::Relaxed),
            bin_deltas: self.bin_deltas.load(Ordering::Relaxed),
            bases_published: self.bases_published.load(Ordering::Relaxed),
            base_bytes_published: self.base_bytes_published.load(Ordering::Relaxed),
            updates_published: self.updates_published.load(Ordering::Relaxed),
            filter_resizes: self.filter_resizes.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }

    /// Average number of bin deltas per topic change
    pub fn avg_deltas_per_change(&self) -> f64 {
        let changes = self.topics_added.load(Ordering::Relaxed)
            + self.topics_removed.load(Ordering::Relaxed);
        if changes > 0 {
            self.bin_deltas.load(Ordering::Relaxed) as f64 / changes as f64
        } else {
            0.0
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        self.topics_added.store(0, Ordering::Relaxed);
        self.topics_removed.store(0, Ordering::Relaxed);
        self.bin_deltas.store(0, Ordering::Relaxed);
        self.bases_published.store(0, Ordering::Relaxed);
        self.base_bytes_published.store(0, Ordering::Relaxed);
        self.updates_published.store(0, Ordering::Relaxed);
        self.filter_resizes.store(0, Ordering::Relaxed);
        self.publish_failures.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub topics_added: u64,
    pub topics_removed: u64,
    pub bin_deltas: u64,
    pub bases_published: u64,
    pub base_bytes_published: u64,
    pub updates_published: u64,
    pub filter_resizes: u64,
    pub publish_failures: u64,
}

/// Trait for custom metrics recording implementations
///
/// Implement this trait to forward filter maintenance events to an
/// external metrics system.
pub trait MetricsRecorder: Send + Sync {
    fn record_topic_added(&self, deltas: usize);
    fn record_topic_removed(&self, deltas: usize);
    fn record_base_published(&self, num_bits: u64);
    fn record_update_published(&self, count: usize);
    fn record_resize(&self, num_counters: u64);
    fn record_publish_failure(&self);
}

/// No-op metrics recorder for when metrics are disabled
#[derive(Default)]
pub struct NoOpMetrics;

impl MetricsRecorder for NoOpMetrics {
    fn record_topic_added(&self, _: usize) {}
    fn record_topic_removed(&self, _: usize) {}
    fn record_base_published(&self, _: u64) {}
    fn record_update_published(&self, _: usize) {}
    fn record_resize(&self, _: u64) {}
    fn record_publish_failure(&self) {}
}

impl MetricsRecorder for Metrics {
    fn record_topic_added(&self, deltas: usize) {
        Metrics::record_topic_added(self, deltas);
    }

    fn record_topic_removed(&self, deltas: usize) {
        Metrics::record_topic_removed(self, deltas);
    }

    fn record_base_published(&self, num_bits: u64) {
        Metrics::record_base_published(self, num_bits);
    }

    fn record_update_published(&self, count: usize) {
        Metrics::record_update_published(self, count);
    }

    fn record_resize(&self, num_counters: u64) {
        Metrics::record_resize(self, num_counters);
    }

    fn record_publish_failure(&self) {
        Metrics::record_publish_failure(self);
    }
}
