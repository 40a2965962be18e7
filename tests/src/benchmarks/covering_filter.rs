//! # Covering Filter Benchmarks
//!
//! Claims to validate:
//! - `add`/`contains`: O(k) hashes plus O(k) counter lookups
//! - Projection to a plain Bloom filter: O(m)
//! - Incremental updates cost O(changed bins), not O(m)
//! - Combinatorial and linear-combination families hash at similar speed

use std::sync::Arc;
use std::time::Duration;

use covering_filter::{
    AsmFilter, AttributeCodec, CounterWidth, CountingBloomFilter, CoveringFilterApi,
    CoveringFilterConfigBuilder, CoveringFilterService, FilterBase, HashFamily,
    InMemoryFilterPublisher,
};
use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use rand::Rng;

fn generate_topics(count: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            let region: u16 = rng.gen();
            format!("tenant/{region:04x}/device/{i}")
        })
        .collect()
}

fn filled_filter(topics: &[String], family: HashFamily) -> CountingBloomFilter {
    let mut filter = CountingBloomFilter::with_capacity(
        topics.len() as u64,
        0.01,
        family,
        CounterWidth::Four,
    )
    .expect("valid sizing");
    for topic in topics {
        filter.add(topic.as_bytes()).expect("room in counters");
    }
    filter
}

pub fn bench_add_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("covering-filter/add_remove");
    group.measurement_time(Duration::from_secs(5));

    for family in HashFamily::ALL {
        let topics = generate_topics(1_000);
        group.throughput(Throughput::Elements(topics.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("add_then_remove_1000", format!("{family:?}")),
            &topics,
            |b, topics| {
                let mut filter =
                    CountingBloomFilter::with_capacity(1_000, 0.01, family, CounterWidth::Four)
                        .expect("valid sizing");
                b.iter(|| {
                    for topic in topics {
                        black_box(filter.add(black_box(topic.as_bytes())).ok());
                    }
                    for topic in topics {
                        black_box(filter.remove(black_box(topic.as_bytes())));
                    }
                });
            },
        );
    }

    group.finish();
}

pub fn bench_contains(c: &mut Criterion) {
    let mut group = c.benchmark_group("covering-filter/contains");
    group.measurement_time(Duration::from_secs(5));

    let members = generate_topics(10_000);
    let filter = filled_filter(&members, HashFamily::Murmur3_128Ch);
    let bloom = filter.produce_bloom_filter();
    let probes = generate_topics(10_000);

    group.throughput(Throughput::Elements(probes.len() as u64));
    group.bench_function("counting_filter_10000_probes", |b| {
        b.iter(|| {
            probes
                .iter()
                .filter(|t| filter.contains(black_box(t.as_bytes())))
                .count()
        })
    });
    group.bench_function("bloom_filter_10000_probes", |b| {
        b.iter(|| {
            probes
                .iter()
                .filter(|t| bloom.contains(black_box(t.as_bytes())))
                .count()
        })
    });

    group.finish();
}

pub fn bench_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("covering-filter/projection");
    group.measurement_time(Duration::from_secs(5));

    for n in [1_000usize, 64_000] {
        let topics = generate_topics(n);
        let filter = filled_filter(&topics, HashFamily::City64Ch);
        group.throughput(Throughput::Bytes(filter.size_bytes() as u64));
        group.bench_with_input(BenchmarkId::new("produce_bloom_filter", n), &filter, |b, f| {
            b.iter(|| black_box(f.produce_bloom_filter()))
        });

        let bloom = filter.produce_bloom_filter();
        let base = FilterBase {
            hash_family: Some(bloom.hash_family()),
            num_hashes: bloom.num_hashes(),
            num_bits: bloom.num_bits(),
            buffer: bloom.buffer(),
        };
        group.bench_with_input(BenchmarkId::new("encode_base", n), &base, |b, base| {
            b.iter(|| black_box(AttributeCodec::encode_base(1, base).ok()))
        });
    }

    group.finish();
}

pub fn bench_publish_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("covering-filter/publish");
    group.measurement_time(Duration::from_secs(5));

    let churn = generate_topics(16);
    group.throughput(Throughput::Elements(churn.len() as u64));
    group.bench_function("subscribe_unsubscribe_update_16", |b| {
        let publisher = Arc::new(InMemoryFilterPublisher::new());
        let config = CoveringFilterConfigBuilder::new()
            .projected_num_elements(64_000)
            .max_attributes(usize::MAX)
            .build()
            .expect("valid config");
        let mut service = CoveringFilterService::new(publisher.clone(), config).expect("service");
        for topic in generate_topics(10_000) {
            service.subscribe(&topic).expect("subscribe");
        }
        service.publish().expect("base");

        b.iter(|| {
            for topic in &churn {
                service.subscribe(topic).expect("subscribe");
            }
            black_box(service.publish().ok());
            for topic in &churn {
                service.unsubscribe(topic).expect("unsubscribe");
            }
            black_box(service.publish().ok());
            publisher.take_published();
        });
    });

    group.finish();
}

pub fn register_benchmarks(c: &mut Criterion) {
    bench_add_remove(c);
    bench_contains(c);
    bench_projection(c);
    bench_publish_cycle(c);
}
