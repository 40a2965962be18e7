//! Inbound Ports (Driving Ports)
//!
//! The API the subscription manager uses to keep the local covering filter
//! in step with its wildcard subscriptions.

use crate::error::FilterError;

/// What a call to [`CoveringFilterApi::publish`] sent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A full base filter was published
    Base { sqn: u64 },
    /// `count` bin deltas were published on top of the last base
    Update { sqn: u64, count: usize },
    /// Nothing changed since the last publication
    Nothing,
}

/// Primary covering filter API (Driving Port)
///
/// Callers serialize access; the service holds no internal lock.
pub trait CoveringFilterApi {
    /// Add one subscription on `topic`
    fn subscribe(&mut self, topic: &str) -> Result<(), FilterError>;

    /// Drop one subscription on `topic`
    fn unsubscribe(&mut self, topic: &str) -> Result<(), FilterError>;

    /// Whether the local filter covers `topic`
    fn covers(&self, topic: &str) -> bool;

    /// Publish a base or an incremental update, whichever is due
    fn publish(&mut self) -> Result<PublishOutcome, FilterError>;
}
