//! # Subscription Routing
//!
//! Both engines on one message path:
//!
//! 1. **Peer side**: a message is forwarded only if the server's published
//!    covering filter covers its topic.
//! 2. **Server side**: each subscription on that topic evaluates its
//!    selector against the message properties.
//!
//! The covering filter may forward a message nobody wants (false positive);
//! it must never drop one somebody wants.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use covering_filter::{
        CoveringFilterApi, CoveringFilterConfigBuilder, CoveringFilterService,
        InMemoryFilterPublisher, RemoteFilterView,
    };
    use message_selector::{
        CompiledRule, PropertyMap, SelectorApi, SelectorConfig, SelectorService,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Subscription {
        id: u32,
        topic: String,
        rule: Arc<CompiledRule>,
    }

    /// A server with subscriptions, plus one peer's view of its filter
    struct Route {
        filter: CoveringFilterService<InMemoryFilterPublisher>,
        publisher: Arc<InMemoryFilterPublisher>,
        selectors: SelectorService,
        subscriptions: Vec<Subscription>,
        peer: RemoteFilterView,
    }

    impl Route {
        fn new() -> Self {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();

            let publisher = Arc::new(InMemoryFilterPublisher::new());
            let config = CoveringFilterConfigBuilder::new()
                .projected_num_elements(1_000)
                .build()
                .expect("valid config");
            Self {
                filter: CoveringFilterService::new(publisher.clone(), config).expect("service"),
                publisher,
                selectors: SelectorService::new(SelectorConfig::default()).expect("service"),
                subscriptions: Vec::new(),
                peer: RemoteFilterView::new(),
            }
        }

        fn subscribe(&mut self, id: u32, topic: &str, selector: &str) {
            let rule = self.selectors.compile(selector).expect("valid selector");
            self.filter.subscribe(topic).expect("subscribe");
            self.subscriptions.push(Subscription {
                id,
                topic: topic.to_string(),
                rule,
            });
        }

        fn unsubscribe(&mut self, id: u32) {
            let index = self
                .subscriptions
                .iter()
                .position(|s| s.id == id)
                .expect("known subscription");
            let subscription = self.subscriptions.remove(index);
            self.filter
                .unsubscribe(&subscription.topic)
                .expect("unsubscribe");
        }

        /// Publish the filter and let the peer catch up
        fn sync(&mut self) {
            self.filter.publish().expect("publish");
            for attribute in self.publisher.take_published() {
                self.peer.apply(&attribute).expect("peer accepts publication");
            }
        }

        /// Route one message; `None` when the peer does not forward it
        fn route(&self, topic: &str, properties: &PropertyMap) -> Option<Vec<u32>> {
            if !self.peer.covers(topic) {
                return None;
            }
            let message = properties.clone().with_topic(topic);
            let mut delivered: Vec<u32> = self
                .subscriptions
                .iter()
                .filter(|s| s.topic == topic)
                .filter(|s| self.selectors.matches(&s.rule, &message))
                .map(|s| s.id)
                .collect();
            delivered.sort_unstable();
            Some(delivered)
        }
    }

    fn reading(celsius: f64, unit: &str) -> PropertyMap {
        PropertyMap::new()
            .with_property("celsius", celsius)
            .with_property("unit", unit)
    }

    // =============================================================================
    // ROUTING
    // =============================================================================

    /// Only covered topics are forwarded, then each selector decides
    #[test]
    fn test_filter_then_select() {
        let mut route = Route::new();
        route.subscribe(1, "sensors/kitchen", "celsius > 30");
        route.subscribe(2, "sensors/kitchen", "unit = 'probe' AND celsius BETWEEN 50 AND 90");
        route.subscribe(3, "sensors/garage", "celsius < 0");
        route.sync();

        assert_eq!(
            route.route("sensors/kitchen", &reading(70.0, "probe")),
            Some(vec![1, 2])
        );
        assert_eq!(
            route.route("sensors/kitchen", &reading(35.0, "wall")),
            Some(vec![1])
        );
        assert_eq!(route.route("sensors/garage", &reading(5.0, "wall")), Some(vec![]));
        assert_eq!(route.route("sensors/attic", &reading(40.0, "wall")), None);
    }

    /// Dropping the last subscriber of a topic stops forwarding it
    #[test]
    fn test_unsubscribe_stops_forwarding() {
        let mut route = Route::new();
        route.subscribe(1, "orders/eu", "amount > 100");
        route.subscribe(2, "orders/eu", "amount > 1000");
        route.subscribe(3, "orders/us", "amount > 100");
        route.sync();

        let big = PropertyMap::new().with_property("amount", 5000);
        route.unsubscribe(1);
        route.sync();
        assert_eq!(route.route("orders/eu", &big), Some(vec![2]), "Topic still has a subscriber");

        route.unsubscribe(2);
        route.sync();
        assert_eq!(route.route("orders/eu", &big), None);
        assert_eq!(route.route("orders/us", &big), Some(vec![3]));
    }

    /// No subscriber is ever starved by the covering filter
    #[test]
    fn test_no_false_negatives() {
        let mut route = Route::new();
        let topics: Vec<String> = (0..300).map(|i| format!("fleet/{}/truck/{i}", i % 7)).collect();
        for (id, topic) in topics.iter().enumerate() {
            route.subscribe(id as u32, topic, "speed IS NOT NULL");
        }
        route.sync();

        let moving = PropertyMap::new().with_property("speed", 88);
        for (id, topic) in topics.iter().enumerate() {
            assert_eq!(route.route(topic, &moving), Some(vec![id as u32]), "{topic}");
        }

        let mut forwarded = 0;
        for i in 0..1_000 {
            if route.route(&format!("boats/{i}"), &moving).is_some() {
                forwarded += 1;
            }
        }
        assert!(forwarded < 100, "False positives stay rare: {forwarded}");
    }

    /// The same rule serves every subscription that uses the same text
    #[test]
    fn test_shared_rules() {
        let mut route = Route::new();
        for id in 0..10 {
            route.subscribe(id, &format!("rooms/{id}"), "occupied = TRUE");
        }
        assert_eq!(route.selectors.cached_rules(), 1);

        let mut by_rule: HashMap<*const CompiledRule, usize> = HashMap::new();
        for s in &route.subscriptions {
            *by_rule.entry(Arc::as_ptr(&s.rule)).or_default() += 1;
        }
        assert_eq!(by_rule.len(), 1, "One compiled rule shared by all");
    }
}
