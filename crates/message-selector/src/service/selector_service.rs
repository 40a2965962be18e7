//! Selector Service
//!
//! Compiles each distinct selector once. Rules are immutable, so the cache
//! hands out `Arc<CompiledRule>` and any number of subscriptions and
//! delivery threads can evaluate the same rule concurrently.

use std::borrow::Borrow;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::domain::{compile, evaluate, CompiledRule, SelectorConfig, SelectorOptions, Selection};
use crate::error::SelectorError;
use crate::metrics::{MetricsRecorder, NoOpMetrics};
use crate::ports::{PropertySource, SelectorApi};

type CacheKey = (String, SelectorOptions);

/// Lookup view of a cache key, so hits are found from the borrowed selector
/// text. Owned and borrowed keys hash the same: `String` hashes as `str`.
trait RuleKey {
    fn key(&self) -> (&str, SelectorOptions);
}

impl RuleKey for CacheKey {
    fn key(&self) -> (&str, SelectorOptions) {
        (&self.0, self.1)
    }
}

impl RuleKey for (&str, SelectorOptions) {
    fn key(&self) -> (&str, SelectorOptions) {
        (self.0, self.1)
    }
}

impl<'a> Borrow<dyn RuleKey + 'a> for CacheKey {
    fn borrow(&self) -> &(dyn RuleKey + 'a) {
        self
    }
}

impl Hash for dyn RuleKey + '_ {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialEq for dyn RuleKey + '_ {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for dyn RuleKey + '_ {}

/// Selector service implementation
///
/// Implements the `SelectorApi` port with an LRU cache of compiled rules.
pub struct SelectorService {
    config: SelectorConfig,
    cache: Mutex<LruCache<CacheKey, Arc<CompiledRule>>>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl SelectorService {
    pub fn new(config: SelectorConfig) -> Result<Self, SelectorError> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.cache_capacity).ok_or_else(|| {
            SelectorError::InvalidConfig("cache_capacity cannot be 0".to_string())
        })?;

        info!(
            cache_capacity = config.cache_capacity,
            internal = config.internal,
            "[SelectorService] Created selector service"
        );

        Ok(Self {
            config,
            cache: Mutex::new(LruCache::new(capacity)),
            metrics: Arc::new(NoOpMetrics),
        })
    }

    /// Record events into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Number of rules currently cached
    pub fn cached_rules(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn clear_cache(&self) {
        let mut cache = self.cache.lock();
        debug!(dropped = cache.len(), "[SelectorService] Cleared rule cache");
        cache.clear();
    }

    /// Evaluate `rule` and report the three-valued result
    pub fn evaluate(&self, rule: &CompiledRule, source: &dyn PropertySource) -> Selection {
        let selection = evaluate(rule, source);
        self.metrics.record_evaluation(selection.is_match());
        selection
    }

    /// Compile (or fetch) `selector` and evaluate it against `source`
    pub fn select(
        &self,
        selector: &str,
        source: &dyn PropertySource,
    ) -> Result<Selection, SelectorError> {
        let rule = self.compile(selector)?;
        Ok(self.evaluate(&rule, source))
    }
}

impl SelectorApi for SelectorService {
    fn compile(&self, selector: &str) -> Result<Arc<CompiledRule>, SelectorError> {
        self.compile_with(selector, self.config.default_options())
    }

    fn compile_with(
        &self,
        selector: &str,
        options: SelectorOptions,
    ) -> Result<Arc<CompiledRule>, SelectorError> {
        let lookup: &dyn RuleKey = &(selector, options);
        if let Some(rule) = self.cache.lock().get(lookup) {
            self.metrics.record_cache_hit();
            return Ok(Arc::clone(rule));
        }

        // Compile outside the lock; a racing compile of the same text just
        // replaces an identical rule.
        let rule = match compile(selector, options) {
            Ok(rule) => Arc::new(rule),
            Err(e) => {
                debug!(
                    selector,
                    code = e.code(),
                    error = %e,
                    "[SelectorService] Selector rejected"
                );
                self.metrics.record_compile_failure(e.code());
                return Err(e);
            }
        };
        self.metrics.record_compiled(rule.len());

        let key = (selector.to_string(), options);
        if let Some((evicted, _)) = self.cache.lock().push(key, Arc::clone(&rule)) {
            if evicted.0 != selector || evicted.1 != options {
                debug!(
                    evicted = %evicted.0,
                    "[SelectorService] Evicted compiled rule"
                );
            }
        }
        Ok(rule)
    }

    fn matches(&self, rule: &CompiledRule, source: &dyn PropertySource) -> bool {
        self.evaluate(rule, source).is_match()
    }
}
