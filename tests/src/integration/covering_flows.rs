//! # Covering Filter Flows
//!
//! A server maintains a counting filter over its subscribed topics and
//! publishes it; a peer decodes every publication into a `RemoteFilterView`
//! and routes only the topics that view covers.
//!
//! ## Flow Tested:
//!
//! 1. **Subscribe → publish base → peer applies**: peer covers every topic
//! 2. **Subscribe/unsubscribe → publish update → peer applies**: deltas only
//! 3. **Growth**: an undersized filter doubles and republishes a base
//! 4. **Withdrawal**: the peer drops the filter and then accepts a new base

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use covering_filter::{
        AsmFilter, AsmParams, CounterWidth, CountingBloomFilter, CoveringFilterApi,
        CoveringFilterConfigBuilder, CoveringFilterService, FilterError, HashFamily,
        InMemoryFilterPublisher, Metrics, PublishOutcome, PublishedAttribute, RemoteFilterView,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Server-side service wired to an in-memory publisher
    fn server(
        projected: u64,
        family: HashFamily,
    ) -> (
        CoveringFilterService<InMemoryFilterPublisher>,
        Arc<InMemoryFilterPublisher>,
        Arc<Metrics>,
    ) {
        init_tracing();
        let publisher = Arc::new(InMemoryFilterPublisher::new());
        let metrics = Arc::new(Metrics::new());
        let config = CoveringFilterConfigBuilder::new()
            .projected_num_elements(projected)
            .desired_fpp(0.01)
            .hash_family(family)
            .build()
            .expect("valid config");
        let service = CoveringFilterService::new(publisher.clone(), config)
            .expect("service")
            .with_metrics(metrics.clone());
        (service, publisher, metrics)
    }

    /// Feed everything published so far into the peer's view
    fn deliver(publisher: &InMemoryFilterPublisher, view: &mut RemoteFilterView) -> usize {
        let published = publisher.take_published();
        for attribute in &published {
            view.apply(attribute).expect("peer accepts publication");
        }
        published.len()
    }

    fn topics(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}/{i}")).collect()
    }

    // =============================================================================
    // COUNTING FILTER SCENARIO
    // =============================================================================

    /// Three topics in a 1024-counter filter; removing one clears its bins
    #[test]
    fn test_counting_filter_scenario() {
        let params = AsmParams::new(1024, 4, HashFamily::Murmur3_128Ch).expect("valid geometry");
        let mut cbf = CountingBloomFilter::new(params, CounterWidth::Four).expect("filter");

        for topic in ["a/b", "a/c", "x/y"] {
            cbf.add(topic.as_bytes()).expect("room in counters");
        }
        assert_eq!(cbf.num_elements(), 3);
        assert!(cbf.contains(b"a/b"));
        assert!(!cbf.contains(b"q/z"), "Unlikely false positive at this load");

        let bf = cbf.produce_bloom_filter();
        assert!(bf.contains(b"a/b"), "Projection keeps every member");
        assert_eq!(bf.num_bits(), 1024);

        let cleared = cbf.remove(b"a/b");
        assert!(!cleared.is_empty(), "Some bin of a/b was not shared");
        assert!(cleared.iter().all(|d| *d < 0), "Removals are negative deltas");
        assert!(!cbf.contains(b"a/b"));
        assert!(cbf.contains(b"a/c") && cbf.contains(b"x/y"));
    }

    /// Sizing for three topics at 1% gives a filter that keeps its promise
    #[test]
    fn test_sized_filter_keeps_fpp() {
        let (bits, hashes) =
            CountingBloomFilter::compute_optimal_parameters(3, 0.01).expect("valid sizing");
        assert!(bits >= 29, "At least n * ln(1/p) / ln(2)^2 counters");
        assert!(hashes >= 1);

        let mut cbf = CountingBloomFilter::with_capacity(
            3,
            0.01,
            HashFamily::Murmur3_128Ch,
            CounterWidth::Four,
        )
        .expect("filter");
        assert_eq!(cbf.num_counters(), bits);
        assert_eq!(cbf.num_hashes(), hashes);

        for topic in ["a/b", "a/c", "x/y"] {
            cbf.add(topic.as_bytes()).expect("room in counters");
        }
        assert!(cbf.estimate_fpp() <= 0.05, "Load matches the projection");
    }

    // =============================================================================
    // SERVER → PEER PUBLICATION
    // =============================================================================

    /// Every hash family survives the trip through the wire codec
    #[test]
    fn test_base_publication_reaches_peer() {
        for family in HashFamily::ALL {
            let (mut service, publisher, metrics) = server(1_000, family);
            let mut view = RemoteFilterView::new();
            let subscribed = topics("orders", 100);
            for topic in &subscribed {
                service.subscribe(topic).expect("subscribe");
            }

            let outcome = service.publish().expect("publish");
            assert_eq!(outcome, PublishOutcome::Base { sqn: 1 });
            assert_eq!(deliver(&publisher, &mut view), 1);

            assert_eq!(view.last_sqn(), Some(1));
            for topic in &subscribed {
                assert!(view.covers(topic), "{family:?}: peer must cover {topic}");
            }
            let remote = view.filter().expect("peer holds a filter");
            assert_eq!(remote.hash_family(), family);
            assert_eq!(remote.buffer(), service.published_filter().buffer());
            assert_eq!(metrics.snapshot().bases_published, 1);
        }
    }

    /// Small changes after a base travel as updates
    #[test]
    fn test_updates_follow_base() {
        let (mut service, publisher, metrics) = server(1_000, HashFamily::Murmur3_128Ch);
        let mut view = RemoteFilterView::new();

        service.subscribe("orders/eu").expect("subscribe");
        service.subscribe("orders/us").expect("subscribe");
        service.publish().expect("publish");
        deliver(&publisher, &mut view);

        service.subscribe("orders/asia").expect("subscribe");
        service.unsubscribe("orders/us").expect("unsubscribe");
        let outcome = service.publish().expect("publish");
        assert!(
            matches!(outcome, PublishOutcome::Update { sqn: 2, count } if count > 0),
            "Expected an update, got {outcome:?}"
        );
        assert_eq!(deliver(&publisher, &mut view), 1);

        assert!(view.covers("orders/eu"));
        assert!(view.covers("orders/asia"));
        assert!(!view.covers("orders/us"), "Withdrawn topic should be gone");
        assert_eq!(view.filter().map(|f| f.buffer()), Some(service.published_filter().buffer()));

        assert_eq!(service.publish().expect("publish"), PublishOutcome::Nothing);
        assert_eq!(metrics.snapshot().updates_published, 1);
    }

    /// Repeated subscriptions share one filter entry
    #[test]
    fn test_refcounted_topics() {
        let (mut service, publisher, _metrics) = server(1_000, HashFamily::City64Ch);
        service.subscribe("a/b").expect("subscribe");
        service.subscribe("a/b").expect("subscribe");
        assert_eq!(service.num_topics(), 1);

        service.unsubscribe("a/b").expect("unsubscribe");
        assert!(service.covers("a/b"), "One subscriber is left");
        service.unsubscribe("a/b").expect("unsubscribe");
        assert!(!service.covers("a/b"));

        assert!(matches!(
            service.unsubscribe("a/b"),
            Err(FilterError::TopicNotFound(_))
        ));
    }

    /// An undersized filter grows and republishes without losing a topic
    #[test]
    fn test_growth_republishes_base() {
        init_tracing();
        let publisher = Arc::new(InMemoryFilterPublisher::new());
        let metrics = Arc::new(Metrics::new());
        let config = CoveringFilterConfigBuilder::new()
            .projected_num_elements(10)
            .counter_size(8)
            .hash_family(HashFamily::Murmur3_128Lc)
            .build()
            .expect("valid config");
        let mut service = CoveringFilterService::new(publisher.clone(), config)
            .expect("service")
            .with_metrics(metrics.clone());
        let mut view = RemoteFilterView::new();
        service.subscribe("seed").expect("subscribe");
        service.publish().expect("publish");
        deliver(&publisher, &mut view);
        let initial = service.counting_filter().num_counters();

        let subscribed = topics("sensors", 60);
        for topic in &subscribed {
            service.subscribe(topic).expect("subscribe");
        }

        let outcome = service.publish().expect("publish");
        assert!(matches!(outcome, PublishOutcome::Base { .. }), "Growth republishes a base");
        assert!(service.counting_filter().num_counters() > initial);
        deliver(&publisher, &mut view);

        for topic in subscribed.iter().chain(std::iter::once(&"seed".to_string())) {
            assert!(view.covers(topic), "No false negatives after growth: {topic}");
        }
        assert!(metrics.snapshot().filter_resizes >= 1);
    }

    /// A failed publication keeps its deltas for the next attempt
    #[test]
    fn test_failed_update_is_retried() {
        let (mut service, publisher, metrics) = server(1_000, HashFamily::City64Lc);
        let mut view = RemoteFilterView::new();
        service.subscribe("a/b").expect("subscribe");
        service.publish().expect("publish");
        deliver(&publisher, &mut view);

        service.subscribe("c/d").expect("subscribe");
        publisher.fail_next();
        assert!(matches!(service.publish(), Err(FilterError::PublishFailed(_))));
        assert!(service.pending_updates() > 0, "Deltas survive the failure");

        service.publish().expect("retry");
        deliver(&publisher, &mut view);
        assert!(view.covers("c/d"));
        assert_eq!(metrics.snapshot().publish_failures, 1);
    }

    /// Withdrawal clears the peer; the next publish restores it
    #[test]
    fn test_withdraw_and_restore() {
        let (mut service, publisher, _metrics) = server(1_000, HashFamily::Murmur3_128Ch);
        let mut view = RemoteFilterView::new();
        service.subscribe("a/b").expect("subscribe");
        service.publish().expect("publish");
        deliver(&publisher, &mut view);
        assert!(view.covers("a/b"));

        service.withdraw().expect("withdraw");
        deliver(&publisher, &mut view);
        assert!(view.filter().is_none());
        assert!(!view.covers("a/b"));

        let outcome = service.publish().expect("publish");
        assert!(matches!(outcome, PublishOutcome::Base { .. }));
        deliver(&publisher, &mut view);
        assert!(view.covers("a/b"));
    }

    /// Dropped updates are detected as a sequence gap
    #[test]
    fn test_peer_detects_gap() {
        let (mut service, publisher, _metrics) = server(1_000, HashFamily::Murmur3_128Ch);
        let mut view = RemoteFilterView::new();
        service.subscribe("a").expect("subscribe");
        service.publish().expect("publish");
        deliver(&publisher, &mut view);

        service.subscribe("b").expect("subscribe");
        service.publish().expect("publish");
        let lost = publisher.take_published();
        service.subscribe("c").expect("subscribe");
        service.publish().expect("publish");

        let next = publisher.take_published();
        let update = next.first().expect("one update");
        assert!(matches!(update, PublishedAttribute::Update(_)));
        assert!(matches!(
            view.apply(update),
            Err(FilterError::SequenceGap { expected: 2, received: 3 })
        ));

        // Replaying in order recovers
        for attribute in lost.iter().chain(next.iter()) {
            view.apply(attribute).expect("in order");
        }
        assert!(view.covers("b") && view.covers("c"));
    }
}
