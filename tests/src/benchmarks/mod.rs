//! # Filter Engine Benchmarks
//!
//! Criterion benchmarks per engine. Group names are
//! `covering-filter/...` and `message-selector/...` so either engine can be
//! run alone.

pub mod covering_filter;
pub mod message_selector;
