//! Domain Layer - Pure filter logic
//!
//! This layer contains:
//! - Shared filter geometry and the bin hashing families
//! - Bloom filter and counting Bloom filter
//! - Parameter sizing
//! - Configuration
//!
//! RULES:
//! - No I/O operations
//! - No logging on the hot path

pub mod asm_filter;
pub mod bloom_filter;
pub mod city_hash;
pub mod config;
pub mod counting_bloom;
pub mod hash_functions;
pub mod parameters;

pub use asm_filter::{bit_offset_of, byte_index_of, AsmFilter, AsmParams};
pub use bloom_filter::BloomFilter;
pub use city_hash::city_hash64;
pub use config::{CoveringFilterConfig, CoveringFilterConfigBuilder};
pub use counting_bloom::{CounterWidth, CountingBloomFilter};
pub use hash_functions::{BinHasher, HashFamily};
pub use parameters::{compute_optimal_parameters, estimate_fpp};
