//! Service Layer
//!
//! - `SelectorService` - compile-once rule cache and evaluation

pub mod selector_service;

pub use selector_service::SelectorService;
