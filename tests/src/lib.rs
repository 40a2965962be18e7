//! # Filter Engine Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── benchmarks/       # Criterion benchmarks per engine
//! │   ├── covering_filter.rs
//! │   └── message_selector.rs
//! │
//! └── integration/      # Cross-crate flows
//!     ├── covering_flows.rs
//!     ├── selector_flows.rs
//!     └── subscription_routing.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p filter-engine-tests
//!
//! # By category
//! cargo test -p filter-engine-tests integration::
//!
//! # Benchmarks
//! cargo bench -p filter-engine-tests
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod benchmarks;
pub mod integration;
