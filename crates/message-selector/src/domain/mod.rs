//! Domain Layer - Pure selector logic
//!
//! This layer contains:
//! - The token scanner and the rule compiler
//! - The rule record format
//! - LIKE pattern encoding and matching
//! - Evaluation, dumping and infix rendering of compiled rules
//! - Configuration
//!
//! RULES:
//! - No I/O operations
//! - No logging on the hot path

pub mod compiler;
pub mod config;
pub mod evaluate;
pub mod like;
pub mod render;
pub mod rule;
pub mod token;

pub use compiler::{compile, SelectorOptions};
pub use config::{SelectorConfig, SelectorConfigBuilder};
pub use evaluate::{evaluate, Selection, Value};
pub use like::{convert_match, like_match, match_len};
pub use render::{dump, to_infix};
pub use rule::{CompareOp, CompiledRule, IsTest, Opcode, RuleBuilder, RuleRecord};
pub use token::{Scanner, Token, TokenKind};
