//! Covering Filter Service
//!
//! Keeps a counting Bloom filter of the locally subscribed wildcard topics
//! and decides, on every publish tick, whether peers get a full base filter
//! or just the bin deltas accumulated since the last publication.
//!
//! Publish policy, first match wins:
//! 1. base required (nothing published yet, withdrawn, or resized since the
//!    last successful base): base
//! 2. estimated FPP above target: grow to twice the counters, re-add, base
//! 3. more pending deltas than `num_bits / 32`: base
//! 4. publisher already holds more than `max_attributes` updates: base
//! 5. pending deltas: update

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{
    AsmFilter, AsmParams, BloomFilter, CountingBloomFilter, CoveringFilterConfig,
};
use crate::error::FilterError;
use crate::metrics::{MetricsRecorder, NoOpMetrics};
use crate::ports::{CoveringFilterApi, FilterBase, FilterPublisher, PublishOutcome};

/// Covering filter service implementation
///
/// Implements the `CoveringFilterApi` port using an injected publisher.
pub struct CoveringFilterService<P: FilterPublisher> {
    /// Where bases and updates go (driven port)
    publisher: Arc<P>,
    metrics: Arc<dyn MetricsRecorder>,
    config: CoveringFilterConfig,
    cbf: CountingBloomFilter,
    /// Projection of `cbf` as last published
    bf: BloomFilter,
    /// Subscription count per topic
    topics: HashMap<String, usize>,
    /// Deltas not yet published
    pending: Vec<i32>,
    /// Peers need a full base before any further update: nothing published
    /// yet, withdrawn, resized, or the local projection drifted
    base_required: bool,
}

impl<P: FilterPublisher> CoveringFilterService<P> {
    /// Create a new service with a filter sized from `config`
    pub fn new(publisher: Arc<P>, config: CoveringFilterConfig) -> Result<Self, FilterError> {
        config.validate()?;
        let cbf = CountingBloomFilter::with_capacity(
            config.projected_num_elements,
            config.desired_fpp,
            config.hash_family,
            config.counter_width()?,
        )?;
        let bf = BloomFilter::new(*cbf.params());

        info!(
            num_counters = cbf.num_counters(),
            num_hashes = cbf.num_hashes(),
            hash_family = %cbf.hash_family(),
            counter_size = cbf.counter_size(),
            "[CoveringFilterService] Created covering filter"
        );

        Ok(Self {
            publisher,
            metrics: Arc::new(NoOpMetrics),
            config,
            cbf,
            bf,
            topics: HashMap::new(),
            pending: Vec::new(),
            base_required: true,
        })
    }

    /// Record events into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &CoveringFilterConfig {
        &self.config
    }

    /// Number of distinct subscribed topics
    pub fn num_topics(&self) -> usize {
        self.topics.len()
    }

    /// Deltas waiting for the next publish
    pub fn pending_updates(&self) -> usize {
        self.pending.len()
    }

    pub fn counting_filter(&self) -> &CountingBloomFilter {
        &self.cbf
    }

    /// The filter as last published
    pub fn published_filter(&self) -> &BloomFilter {
        &self.bf
    }

    /// Publish a withdrawal so peers drop this server's filter. The next
    /// `publish` sends a fresh base.
    pub fn withdraw(&mut self) -> Result<u64, FilterError> {
        let sqn = self
            .publisher
            .publish_base(&FilterBase::removed())
            .inspect_err(|_| self.metrics.record_publish_failure())?;
        self.base_required = true;
        info!(sqn, "[CoveringFilterService] Withdrew covering filter");
        Ok(sqn)
    }

    fn publish_base(&mut self) -> Result<PublishOutcome, FilterError> {
        self.cbf.update_bloom_filter(&mut self.bf)?;
        let base = FilterBase {
            hash_family: Some(self.bf.hash_family()),
            num_hashes: self.bf.num_hashes(),
            num_bits: self.bf.num_bits(),
            buffer: self.bf.buffer(),
        };

        let sqn = match self.publisher.publish_base(&base) {
            Ok(sqn) => sqn,
            Err(e) => {
                warn!(error = %e, "[CoveringFilterService] Base publish failed");
                self.metrics.record_publish_failure();
                return Err(e);
            }
        };

        self.metrics.record_base_published(base.num_bits);
        info!(
            sqn,
            num_bits = base.num_bits,
            superseded_deltas = self.pending.len(),
            "[CoveringFilterService] Published base filter"
        );
        self.base_required = false;
        self.pending.clear();
        Ok(PublishOutcome::Base { sqn })
    }

    fn publish_update(&mut self) -> Result<PublishOutcome, FilterError> {
        if self.pending.is_empty() {
            return Ok(PublishOutcome::Nothing);
        }

        let sqn = match self.publisher.publish_update(&self.pending) {
            Ok(sqn) => sqn,
            Err(e) => {
                warn!(error = %e, "[CoveringFilterService] Update publish failed");
                self.metrics.record_publish_failure();
                return Err(e);
            }
        };

        let count = self.pending.len();
        if let Err(e) = self.bf.apply_updates(&self.pending) {
            // The projection drifted; the next tick republishes from the counters
            warn!(error = %e, "[CoveringFilterService] Local projection out of step");
            self.base_required = true;
        }
        self.metrics.record_update_published(count);
        debug!(sqn, count, "[CoveringFilterService] Published filter update");
        self.pending.clear();
        Ok(PublishOutcome::Update { sqn, count })
    }

    /// Rebuild the counting filter with twice the counters.
    fn grow(&mut self) -> Result<(), FilterError> {
        let old = *self.cbf.params();
        let num_bits = old.num_bits.checked_mul(2).ok_or_else(|| {
            FilterError::InvalidParameters("counter count overflow".to_string())
        })?;
        let params = AsmParams::new(num_bits, old.num_hashes, old.hash_family)?;

        let mut cbf = CountingBloomFilter::new(params, self.cbf.counter_width())?;
        for topic in self.topics.keys() {
            cbf.add(topic.as_bytes())?;
        }

        info!(
            from = old.num_bits,
            to = num_bits,
            topics = self.topics.len(),
            fpp = self.cbf.estimate_fpp(),
            "[CoveringFilterService] Resized covering filter"
        );
        self.metrics.record_resize(num_bits);
        self.cbf = cbf;
        // Pending deltas index the old geometry; only a base is valid now,
        // and it stays required until one is actually published
        self.pending.clear();
        self.base_required = true;
        Ok(())
    }
}

impl<P: FilterPublisher> CoveringFilterApi for CoveringFilterService<P> {
    fn subscribe(&mut self, topic: &str) -> Result<(), FilterError> {
        if let Some(count) = self.topics.get_mut(topic) {
            *count += 1;
            debug!(topic, count = *count, "[CoveringFilterService] Topic already covered");
            return Ok(());
        }

        let deltas = self.cbf.add(topic.as_bytes())?;
        self.metrics.record_topic_added(deltas.len());
        debug!(topic, deltas = deltas.len(), "[CoveringFilterService] Topic added");
        self.pending.extend(deltas);
        self.topics.insert(topic.to_string(), 1);
        Ok(())
    }

    fn unsubscribe(&mut self, topic: &str) -> Result<(), FilterError> {
        let count = self
            .topics
            .get_mut(topic)
            .ok_or_else(|| FilterError::TopicNotFound(topic.to_string()))?;
        *count -= 1;
        if *count > 0 {
            return Ok(());
        }

        self.topics.remove(topic);
        let deltas = self.cbf.remove(topic.as_bytes());
        self.metrics.record_topic_removed(deltas.len());
        debug!(topic, deltas = deltas.len(), "[CoveringFilterService] Topic removed");
        self.pending.extend(deltas);
        Ok(())
    }

    fn covers(&self, topic: &str) -> bool {
        self.cbf.contains(topic.as_bytes())
    }

    fn publish(&mut self) -> Result<PublishOutcome, FilterError> {
        if self.base_required {
            return self.publish_base();
        }

        let fpp = self.cbf.estimate_fpp();
        if fpp > self.config.desired_fpp {
            self.grow()?;
            return self.publish_base();
        }

        if self.pending.len() as u64 > self.cbf.num_counters() / 32 {
            return self.publish_base();
        }

        if self.publisher.num_updates() > self.config.max_attributes {
            return self.publish_base();
        }

        self.publish_update()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryFilterPublisher;
    use crate::domain::CoveringFilterConfigBuilder;
    use crate::metrics::Metrics;
    use crate::service::RemoteFilterView;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn service(
        projected: u64,
    ) -> (
        CoveringFilterService<InMemoryFilterPublisher>,
        Arc<InMemoryFilterPublisher>,
    ) {
        init_tracing();
        let publisher = Arc::new(InMemoryFilterPublisher::new());
        let config = CoveringFilterConfigBuilder::new()
            .projected_num_elements(projected)
            .build()
            .expect("valid config");
        let service = CoveringFilterService::new(publisher.clone(), config).expect("service");
        (service, publisher)
    }

    #[test]
    fn test_first_publish_is_base() {
        let (mut service, publisher) = service(1000);
        service.subscribe("a/+/c").expect("subscribe");

        assert_eq!(service.publish(), Ok(PublishOutcome::Base { sqn: 1 }));
        assert_eq!(service.pending_updates(), 0);
        assert!(service.published_filter().contains(b"a/+/c"));
        assert_eq!(publisher.take_published().len(), 1);
    }

    #[test]
    fn test_then_updates() {
        let (mut service, _publisher) = service(1000);
        service.publish().expect("base");

        service.subscribe("x/#").expect("subscribe");
        let pending = service.pending_updates();
        assert!(pending > 0);

        assert_eq!(
            service.publish(),
            Ok(PublishOutcome::Update { sqn: 2, count: pending })
        );
        assert!(service.published_filter().contains(b"x/#"), "Local projection follows updates");
        assert_eq!(service.publish(), Ok(PublishOutcome::Nothing));
    }

    #[test]
    fn test_subscriptions_are_ref_counted() {
        let (mut service, _publisher) = service(1000);
        service.subscribe("a/#").expect("subscribe");
        service.subscribe("a/#").expect("subscribe twice");
        assert_eq!(service.num_topics(), 1);
        assert_eq!(service.counting_filter().num_elements(), 1);

        service.unsubscribe("a/#").expect("first unsubscribe");
        assert!(service.covers("a/#"), "Still one subscriber");

        service.unsubscribe("a/#").expect("last unsubscribe");
        assert!(!service.covers("a/#"));
        assert_eq!(
            service.unsubscribe("a/#"),
            Err(FilterError::TopicNotFound("a/#".to_string()))
        );
    }

    #[test]
    fn test_many_pending_deltas_trigger_base() {
        let (mut service, _publisher) = service(10);
        service.publish().expect("base");

        let threshold = service.counting_filter().num_counters() / 32;
        let mut i = 0;
        while service.pending_updates() as u64 <= threshold {
            service.subscribe(&format!("t/{}", i)).expect("subscribe");
            i += 1;
        }

        assert!(matches!(service.publish(), Ok(PublishOutcome::Base { .. })));
    }

    #[test]
    fn test_too_many_updates_trigger_base() {
        let publisher = Arc::new(InMemoryFilterPublisher::new());
        let config = CoveringFilterConfigBuilder::new()
            .projected_num_elements(100_000)
            .max_attributes(2)
            .build()
            .expect("valid config");
        let mut service = CoveringFilterService::new(publisher, config).expect("service");
        service.publish().expect("base");

        let mut outcomes = Vec::new();
        for i in 0..4 {
            service.subscribe(&format!("u/{}", i)).expect("subscribe");
            outcomes.push(service.publish().expect("publish"));
        }

        assert!(matches!(outcomes[0], PublishOutcome::Update { .. }));
        assert!(matches!(outcomes[1], PublishOutcome::Update { .. }));
        assert!(matches!(outcomes[2], PublishOutcome::Update { .. }));
        assert!(
            matches!(outcomes[3], PublishOutcome::Base { .. }),
            "Fourth publish exceeds max_attributes=2"
        );
    }

    #[test]
    fn test_overloaded_filter_grows() {
        let metrics = Arc::new(Metrics::new());
        let config = CoveringFilterConfigBuilder::new()
            .projected_num_elements(2)
            .counter_size(8)
            .build()
            .expect("valid config");
        let publisher = Arc::new(InMemoryFilterPublisher::new());
        let mut service = CoveringFilterService::new(publisher, config)
            .expect("service")
            .with_metrics(metrics.clone());
        service.publish().expect("base");
        let before = service.counting_filter().num_counters();

        for i in 0..20 {
            service.subscribe(&format!("grow/{}", i)).expect("subscribe");
        }
        assert!(matches!(service.publish(), Ok(PublishOutcome::Base { .. })));

        assert_eq!(service.counting_filter().num_counters(), before * 2);
        assert_eq!(service.published_filter().num_bits(), before * 2);
        for i in 0..20 {
            assert!(service.covers(&format!("grow/{}", i)), "Topics survive the resize");
        }
        assert_eq!(metrics.snapshot().filter_resizes, 1);
    }

    #[test]
    fn test_publish_failure_keeps_pending() {
        let (mut service, publisher) = service(1000);
        service.publish().expect("base");
        service.subscribe("k/#").expect("subscribe");
        let pending = service.pending_updates();

        publisher.fail_next();
        assert!(matches!(service.publish(), Err(FilterError::PublishFailed(_))));
        assert_eq!(service.pending_updates(), pending, "Nothing lost on failure");

        assert!(matches!(service.publish(), Ok(PublishOutcome::Update { .. })));
    }

    #[test]
    fn test_failed_base_after_grow_is_retried_as_base() {
        let config = CoveringFilterConfigBuilder::new()
            .projected_num_elements(100)
            .counter_size(8)
            .build()
            .expect("valid config");
        let publisher = Arc::new(InMemoryFilterPublisher::new());
        let mut service = CoveringFilterService::new(publisher.clone(), config).expect("service");
        let mut peer = RemoteFilterView::new();

        service.publish().expect("base");
        for attribute in publisher.take_published() {
            peer.apply(&attribute).expect("peer applies base");
        }
        let before = service.counting_filter().num_counters();

        for i in 0..200 {
            service.subscribe(&format!("load/{}", i)).expect("subscribe");
        }
        publisher.fail_next();
        assert!(matches!(service.publish(), Err(FilterError::PublishFailed(_))));
        assert_eq!(service.counting_filter().num_counters(), before * 2, "Grown before the failure");
        assert_eq!(service.pending_updates(), 0, "Old-geometry deltas are dropped");

        for i in 0..3 {
            service.subscribe(&format!("late/{}", i)).expect("subscribe");
        }
        assert!(
            matches!(service.publish(), Ok(PublishOutcome::Base { .. })),
            "A resized filter must reach peers as a base"
        );
        for attribute in publisher.take_published() {
            peer.apply(&attribute).expect("peer applies base");
        }

        assert_eq!(peer.filter().map(|f| f.num_bits()), Some(before * 2));
        for topic in (0..200)
            .map(|i| format!("load/{}", i))
            .chain((0..3).map(|i| format!("late/{}", i)))
        {
            assert!(peer.covers(&topic), "Peer lost {} after the retry", topic);
        }

        service.subscribe("after/base").expect("subscribe");
        assert!(
            matches!(service.publish(), Ok(PublishOutcome::Update { .. })),
            "Updates resume once the base is out"
        );
    }

    #[test]
    fn test_withdraw_forces_new_base() {
        let (mut service, _publisher) = service(1000);
        service.publish().expect("base");

        assert_eq!(service.withdraw(), Ok(2));
        assert_eq!(service.publish(), Ok(PublishOutcome::Base { sqn: 3 }));
    }
}
