//! Ports Layer
//!
//! Defines the interfaces (traits) for:
//! - Driving Ports (inbound) - API for the subscription manager
//! - Driven Ports (outbound) - where published filters go

pub mod inbound;
pub mod outbound;

pub use inbound::{CoveringFilterApi, PublishOutcome};
pub use outbound::{FilterBase, FilterPublisher};
