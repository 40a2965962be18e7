//! # Message Selector Benchmarks
//!
//! Claims to validate:
//! - Compilation is a single pass over the selector text
//! - Evaluation is a single pass over the records, no allocation for
//!   numeric comparisons
//! - Cached compiles cost a map lookup

use std::time::Duration;

use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use message_selector::{
    compile, evaluate, PropertyMap, SelectorApi, SelectorConfig, SelectorOptions, SelectorService,
};
use rand::Rng;

const SELECTORS: [(&str, &str); 5] = [
    ("simple", "color = 'red'"),
    ("conjunction", "color = 'red' AND weight > 2.5 AND quantity <= 100"),
    ("between_in", "weight BETWEEN 1 AND 10 AND region IN ('eu', 'us', 'asia', 'latam')"),
    ("like", "sku LIKE 'AB-%-__' OR sku LIKE '%\\_x' ESCAPE '\\'"),
    (
        "nested",
        "NOT (color = 'blue' OR (weight * 2 + quantity / 3 > 50 AND region <> 'eu')) \
         AND priority IS NOT NULL",
    ),
];

fn generate_messages(count: usize) -> Vec<PropertyMap> {
    let mut rng = rand::thread_rng();
    let colors = ["red", "green", "blue"];
    let regions = ["eu", "us", "asia", "latam", "mena"];
    (0..count)
        .map(|i| {
            let mut message = PropertyMap::new()
                .with_property("color", colors[rng.gen_range(0..colors.len())])
                .with_property("weight", rng.gen_range(0.0..20.0))
                .with_property("quantity", rng.gen_range(0..500i64))
                .with_property("region", regions[rng.gen_range(0..regions.len())])
                .with_property("sku", format!("AB-{i}-xy"));
            if rng.gen_bool(0.5) {
                message.set("priority", rng.gen_range(0..10i64));
            }
            message
        })
        .collect()
}

pub fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("message-selector/compile");
    group.measurement_time(Duration::from_secs(5));

    for (name, selector) in SELECTORS {
        group.throughput(Throughput::Bytes(selector.len() as u64));
        group.bench_with_input(BenchmarkId::new("compile", name), &selector, |b, s| {
            b.iter(|| black_box(compile(black_box(s), SelectorOptions::NONE).ok()))
        });
    }

    let service = SelectorService::new(SelectorConfig::default()).expect("service");
    for (_, selector) in SELECTORS {
        service.compile(selector).expect("compiles");
    }
    group.bench_function("cached_compile", |b| {
        b.iter(|| {
            for (_, selector) in SELECTORS {
                black_box(service.compile(black_box(selector)).ok());
            }
        })
    });

    group.finish();
}

pub fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("message-selector/evaluate");
    group.measurement_time(Duration::from_secs(5));

    let messages = generate_messages(1_000);
    group.throughput(Throughput::Elements(messages.len() as u64));
    for (name, selector) in SELECTORS {
        let rule = compile(selector, SelectorOptions::NONE).expect("compiles");
        group.bench_with_input(BenchmarkId::new("evaluate_1000", name), &rule, |b, rule| {
            b.iter(|| {
                messages
                    .iter()
                    .filter(|m| evaluate(rule, *m).is_match())
                    .count()
            })
        });
    }

    group.finish();
}

pub fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("message-selector/render");
    group.measurement_time(Duration::from_secs(3));

    let (name, selector) = SELECTORS[4];
    let rule = compile(selector, SelectorOptions::NONE).expect("compiles");
    group.bench_function(BenchmarkId::new("to_infix", name), |b| {
        b.iter(|| black_box(rule.to_string()))
    });
    group.bench_function(BenchmarkId::new("dump", name), |b| {
        b.iter(|| black_box(rule.dump()))
    });

    group.finish();
}

pub fn register_benchmarks(c: &mut Criterion) {
    bench_compile(c);
    bench_evaluate(c);
    bench_render(c);
}
