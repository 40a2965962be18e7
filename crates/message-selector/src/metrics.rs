//! Metrics hooks for selector compilation and evaluation

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector for selector operations
#[derive(Default)]
pub struct Metrics {
    /// Selectors compiled (cache misses that succeeded)
    pub compilations: AtomicU64,
    /// Bytes of rule records produced by compilations
    pub rule_bytes: AtomicU64,
    /// Selectors rejected by the compiler
    pub compile_failures: AtomicU64,
    /// Compiles answered from the rule cache
    pub cache_hits: AtomicU64,
    /// Rule evaluations
    pub evaluations: AtomicU64,
    /// Evaluations that selected the message
    pub matches: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful compilation of a rule of `rule_len` bytes
    pub fn record_compiled(&self, rule_len: usize) {
        self.compilations.fetch_add(1, Ordering::Relaxed);
        self.rule_bytes.fetch_add(rule_len as u64, Ordering::Relaxed);
    }

    /// Record a rejected selector
    pub fn record_compile_failure(&self, _code: u32) {
        self.compile_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one evaluation and whether it matched
    pub fn record_evaluation(&self, matched: bool) {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        if matched {
            self.matches.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            compilations: self.compilations.load(Ordering::Relaxed),
            rule_bytes: self.rule_bytes.load(Ordering::Relaxed),
            compile_failures: self.compile_failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            evaluations: self.evaluations.load(Ordering::Relaxed),
            matches: self.matches.load(Ordering::Relaxed),
        }
    }

    /// Fraction of compile requests served from the cache
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let total = hits
            + self.compilations.load(Ordering::Relaxed)
            + self.compile_failures.load(Ordering::Relaxed);
        if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        self.compilations.store(0, Ordering::Relaxed);
        self.rule_bytes.store(0, Ordering::Relaxed);
        self.compile_failures.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.evaluations.store(0, Ordering::Relaxed);
        self.matches.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub compilations: u64,
    pub rule_bytes: u64,
    pub compile_failures: u64,
    pub cache_hits: u64,
    pub evaluations: u64,
    pub matches: u64,
}

/// Trait for custom metrics recording implementations
pub trait MetricsRecorder: Send + Sync {
    fn record_compiled(&self, rule_len: usize);
    fn record_compile_failure(&self, code: u32);
    fn record_cache_hit(&self);
    fn record_evaluation(&self, matched: bool);
}

/// No-op metrics recorder for when metrics are disabled
#[derive(Default)]
pub struct NoOpMetrics;

impl MetricsRecorder for NoOpMetrics {
    fn record_compiled(&self, _: usize) {}
    fn record_compile_failure(&self, _: u32) {}
    fn record_cache_hit(&self) {}
    fn record_evaluation(&self, _: bool) {}
}

impl MetricsRecorder for Metrics {
    fn record_compiled(&self, rule_len: usize) {
        Metrics::record_compiled(self, rule_len);
    }

    fn record_compile_failure(&self, code: u32) {
        Metrics::record_compile_failure(self, code);
    }

    fn record_cache_hit(&self) {
        Metrics::record_cache_hit(self);
    }

    fn record_evaluation(&self, matched: bool) {
        Metrics::record_evaluation(self, matched);
    }
}
