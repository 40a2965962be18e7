//! Adapters Layer (Driven Adapters)
//!
//! - `AttributeCodec` - big-endian wire form of published bases and updates
//! - `InMemoryFilterPublisher` - records encoded publications

pub mod attribute_codec;
pub mod memory_publisher;

pub use attribute_codec::{AttributeCodec, BaseAttribute, UpdateAttribute};
pub use memory_publisher::{InMemoryFilterPublisher, PublishedAttribute};
