//! Ports Layer
//!
//! Defines the interfaces (traits) for:
//! - Driving Ports (inbound) - API for subscription and delivery code
//! - Driven Ports (outbound) - where message properties come from

pub mod inbound;
pub mod outbound;

pub use inbound::SelectorApi;
pub use outbound::PropertySource;
