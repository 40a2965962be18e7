//! Adapters Layer (Driven Adapters)
//!
//! - `PropertyMap` - map-backed message properties

pub mod property_map;

pub use property_map::PropertyMap;
