//! # Filter Engine Benchmarks
//!
//! ## Usage
//!
//! Run all benchmarks:
//! ```bash
//! cargo bench --package filter-engine-tests --bench filter_benchmarks
//! ```
//!
//! Run one engine:
//! ```bash
//! cargo bench --package filter-engine-tests --bench filter_benchmarks -- covering-filter
//! cargo bench --package filter-engine-tests --bench filter_benchmarks -- message-selector/evaluate
//! ```

use criterion::{criterion_group, criterion_main, Criterion};
use filter_engine_tests::benchmarks;

fn bench_covering_filter(c: &mut Criterion) {
    benchmarks::covering_filter::register_benchmarks(c);
}

fn bench_message_selector(c: &mut Criterion) {
    benchmarks::message_selector::register_benchmarks(c);
}

criterion_group!(benches, bench_covering_filter, bench_message_selector);
criterion_main!(benches);
