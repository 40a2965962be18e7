//! # Selector Flows
//!
//! One `SelectorService` is shared by every subscription. Selectors are
//! compiled once, handed out as `Arc<CompiledRule>`, and evaluated against
//! JSON-decoded messages from several delivery threads at once.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use message_selector::{
        compile, Metrics, PropertyMap, Selection, SelectorApi, SelectorConfig,
        SelectorConfigBuilder, SelectorError, SelectorOptions, SelectorService,
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

    fn shared_service(capacity: usize) -> (Arc<SelectorService>, Arc<Metrics>) {
        init_tracing();
        let metrics = Arc::new(Metrics::new());
        let config = SelectorConfigBuilder::new()
            .cache_capacity(capacity)
            .build()
            .expect("valid config");
        let service = SelectorService::new(config)
            .expect("service")
            .with_metrics(metrics.clone());
        (Arc::new(service), metrics)
    }

    fn order(color: &str, weight: f64, quantity: i64) -> PropertyMap {
        PropertyMap::new()
            .with_property("color", color)
            .with_property("weight", weight)
            .with_property("quantity", quantity)
            .with_topic("orders/eu/42")
    }

    // =============================================================================
    // COMPILE ONCE, MATCH MANY
    // =============================================================================

    /// Messages arriving as JSON select like hand-built ones
    #[test]
    fn test_json_messages() {
        let (service, _metrics) = shared_service(16);
        let rule = service
            .compile("color IN ('red', 'green') AND weight BETWEEN 1 AND 5")
            .expect("compiles");

        let matching = PropertyMap::from_json(r#"{"properties": {"color": "red", "weight": 2.5}}"#)
            .expect("valid message");
        let heavy = PropertyMap::from_json(r#"{"properties": {"color": "red", "weight": 7}}"#)
            .expect("valid message");
        let unknown = PropertyMap::from_json(r#"{"properties": {"color": "red"}}"#)
            .expect("valid message");

        assert!(service.matches(&rule, &matching));
        assert!(!service.matches(&rule, &heavy));
        assert_eq!(
            service.evaluate(&rule, &unknown),
            Selection::Unknown,
            "Missing weight makes the rule unknown"
        );
        assert!(!service.matches(&rule, &unknown), "Unknown does not select");
    }

    /// Many threads evaluate the same cached rules
    #[test]
    fn test_concurrent_delivery() {
        let (service, metrics) = shared_service(16);
        let selectors = [
            "color = 'red'",
            "weight > 2.0 AND quantity < 10",
            "color LIKE 'bl%' OR quantity IS NULL",
        ];

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let service = Arc::clone(&service);
                thread::spawn(move || {
                    let mut selected = 0u64;
                    for i in 0..100i64 {
                        let color = if (worker + i) % 2 == 0 { "red" } else { "blue" };
                        let message = order(color, i as f64 / 10.0, i % 20);
                        for selector in selectors {
                            if service.select(selector, &message).expect("compiles").is_match() {
                                selected += 1;
                            }
                        }
                    }
                    selected
                })
            })
            .collect();

        let selected: u64 = handles
            .into_iter()
            .map(|h| h.join().expect("worker panicked"))
            .sum();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.evaluations, 8 * 100 * 3);
        assert_eq!(snapshot.matches, selected);
        assert!(
            snapshot.compilations <= 8 * selectors.len() as u64,
            "Each thread compiles a selector at most once"
        );
        assert!(snapshot.cache_hits >= 8 * 100 * 3 - snapshot.compilations);
        assert_eq!(service.cached_rules(), selectors.len());
    }

    /// Rejected selectors report a stable code and never reach the cache
    #[test]
    fn test_rejections_carry_codes() {
        let (service, metrics) = shared_service(16);
        let cases: [(&str, u32); 6] = [
            ("color = ", 252),
            ("(a = 1", 251),
            ("a = 1)", 258),
            ("a LIKE 5", 246),
            ("a < 'x'", 259),
            ("a IN 'x'", 243),
        ];

        for (selector, code) in cases {
            let err = service.compile(selector).expect_err(selector);
            assert_eq!(err.code(), code, "{selector}: {err}");
            assert!(err.is_compile_error());
        }
        assert_eq!(service.cached_rules(), 0);
        assert_eq!(metrics.snapshot().compile_failures, cases.len() as u64);
    }

    // =============================================================================
    // RENDERING
    // =============================================================================

    /// Rendering a cached rule and compiling it again gives the same records
    #[test]
    fn test_rendered_rules_recompile() {
        let (service, _metrics) = shared_service(16);
        let selectors = [
            "NOT (color = 'red' OR color = 'blue') AND weight >= 2",
            "quantity NOT BETWEEN -3 AND 6",
            "name LIKE 'a\\_%' ESCAPE '\\'",
            "code NOT IN ('x', 'y', 'z') OR flag IS NOT NULL",
            "-weight * 2 + 1 <> quantity / 3",
        ];

        for selector in selectors {
            let rule = service.compile(selector).expect(selector);
            let rendered = rule.to_string();
            let again = compile(&rendered, SelectorOptions::NONE).expect(&rendered);
            assert_eq!(*rule, again, "{selector} rendered as {rendered}");
            assert!(rule.dump().ends_with("End 0\n"), "Dump ends with the terminal record");
        }
    }

    /// Internal syntax only compiles when asked for
    #[test]
    fn test_internal_selectors() {
        let (service, _metrics) = shared_service(16);
        let selector = "Topic1 = 'eu' & QoS = 0";
        assert!(service.compile(selector).is_err(), "Public syntax rejects '&'");

        let rule = service
            .compile_with(selector, SelectorOptions::INTERNAL)
            .expect("internal syntax");
        let message = order("red", 1.0, 1);
        assert_eq!(service.evaluate(&rule, &message), Selection::True);
    }

    /// Configuration can come from JSON
    #[test]
    fn test_config_from_json() {
        let config = SelectorConfig::from_json(r#"{"cache_capacity": 4, "internal": true}"#)
            .expect("valid config");
        let service = SelectorService::new(config).expect("service");
        assert!(service.compile("!flag").is_ok());

        assert!(matches!(
            SelectorConfig::from_json(r#"{"cache_capacity": 0}"#),
            Err(SelectorError::InvalidConfig(_))
        ));
    }
}
