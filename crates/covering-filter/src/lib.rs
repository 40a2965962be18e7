//! # Covering Filter
//!
//! Summarizes the wildcard subscriptions of a server in a Bloom filter so
//! peers can route messages without replicating every subscription.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure filter logic, no I/O
//!   - `AsmParams` / `AsmFilter`: shared geometry and bin hashing
//!   - `HashFamily`: the four wire-visible hash families
//!   - `BloomFilter`: bit vector, bit-exact wire layout
//!   - `CountingBloomFilter`: 4/8-bit counters, add/remove with deltas
//!   - `CoveringFilterConfig`: configuration with validation
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `CoveringFilterApi`: Driving port (subscribe/unsubscribe/publish)
//!   - `FilterPublisher`: Driven port (where bases and updates go)
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `CoveringFilterService`: implements `CoveringFilterApi`
//!   - `RemoteFilterView`: applies a peer's publications
//!
//! - **Adapters Layer** (`adapters/`)
//!   - `AttributeCodec`: big-endian base/update attributes
//!   - `InMemoryFilterPublisher`: records publications
//!
//! ## Invariants
//!
//! - No false negatives: an added element is contained until removed.
//! - A counting filter projects to a Bloom filter with bit `i` set iff
//!   counter `i > 0`; published deltas replay that projection exactly.
//!
//! ## Usage Example
//!
//! ```ignore
//! use covering_filter::{
//!     CoveringFilterApi, CoveringFilterConfig, CoveringFilterService, InMemoryFilterPublisher,
//! };
//! use std::sync::Arc;
//!
//! let publisher = Arc::new(InMemoryFilterPublisher::new());
//! let mut service = CoveringFilterService::new(publisher, CoveringFilterConfig::default())?;
//! service.subscribe("sensors/+/temp")?;
//! service.publish()?;
//! assert!(service.covers("sensors/+/temp"));
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports for convenience
pub use adapters::{AttributeCodec, InMemoryFilterPublisher, PublishedAttribute};
pub use domain::{
    AsmFilter, AsmParams, BloomFilter, CounterWidth, CountingBloomFilter, CoveringFilterConfig,
    CoveringFilterConfigBuilder, HashFamily,
};
pub use error::FilterError;
pub use metrics::{Metrics, MetricsRecorder, MetricsSnapshot, NoOpMetrics};
pub use ports::{CoveringFilterApi, FilterBase, FilterPublisher, PublishOutcome};
pub use service::{CoveringFilterService, RemoteFilterView};
