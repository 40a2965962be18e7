//! Inbound Ports (Driving Ports)
//!
//! Subscriptions compile their selector once and share the rule; delivery
//! evaluates it per message.

use std::sync::Arc;

use super::outbound::PropertySource;
use crate::domain::{CompiledRule, SelectorOptions};
use crate::error::SelectorError;

/// Primary selector API (Driving Port)
pub trait SelectorApi: Send + Sync {
    /// Compile `selector` with the configured default options
    fn compile(&self, selector: &str) -> Result<Arc<CompiledRule>, SelectorError>;

    /// Compile `selector` with explicit options
    fn compile_with(
        &self,
        selector: &str,
        options: SelectorOptions,
    ) -> Result<Arc<CompiledRule>, SelectorError>;

    /// Whether `rule` selects the message described by `source`
    fn matches(&self, rule: &CompiledRule, source: &dyn PropertySource) -> bool;
}
