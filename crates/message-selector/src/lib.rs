//! # Message Selector
//!
//! Compiles SQL92-subset message selectors (`color = 'red' AND weight > 2`)
//! into a flat buffer of rule records and evaluates them against message
//! properties.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure selector logic, no I/O
//!   - `Scanner`: tokens of the selector language
//!   - `compile`: operator-precedence compiler with operand type checks
//!   - `CompiledRule`: immutable record buffer, `dump()` and infix `Display`
//!   - `evaluate`: three-valued evaluation over a value stack
//!   - `SelectorConfig`: configuration with validation
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `SelectorApi`: Driving port (compile/match)
//!   - `PropertySource`: Driven port (message properties, topic, ACLs)
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `SelectorService`: LRU cache of compiled rules, implements `SelectorApi`
//!
//! - **Adapters Layer** (`adapters/`)
//!   - `PropertyMap`: map-backed `PropertySource`
//!
//! ## Invariants
//!
//! - A rule ends with exactly one `End` record of kind 0.
//! - Compilation stops at the first error; every error has a stable code.
//! - Rendering a rule and compiling the text again yields the same records.
//!
//! ## Usage Example
//!
//! ```ignore
//! use message_selector::{PropertyMap, SelectorApi, SelectorConfig, SelectorService};
//!
//! let service = SelectorService::new(SelectorConfig::default())?;
//! let rule = service.compile("color = 'red' AND weight > 2")?;
//! let message = PropertyMap::new().with_property("color", "red").with_property("weight", 3);
//! assert!(service.matches(&rule, &message));
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports for convenience
pub use adapters::PropertyMap;
pub use domain::{
    compile, evaluate, CompiledRule, Opcode, RuleRecord, SelectorConfig, SelectorConfigBuilder,
    SelectorOptions, Selection, Value,
};
pub use error::SelectorError;
pub use metrics::{Metrics, MetricsRecorder, MetricsSnapshot, NoOpMetrics};
pub use ports::{PropertySource, SelectorApi};
pub use service::SelectorService;
