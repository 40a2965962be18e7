//! Selector service configuration and validation

use serde::{Deserialize, Serialize};

use super::compiler::SelectorOptions;
use crate::error::SelectorError;

/// Selector service configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Compiled rules kept in the LRU cache
    pub cache_capacity: usize,
    /// Compile with the internal extensions by default
    pub internal: bool,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1024,
            internal: false,
        }
    }
}

impl SelectorConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), SelectorError> {
        if self.cache_capacity == 0 {
            return Err(SelectorError::InvalidConfig(
                "cache_capacity cannot be 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration. Missing fields take their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self, SelectorError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SelectorError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Options used by [`compile`](crate::ports::SelectorApi::compile)
    pub fn default_options(&self) -> SelectorOptions {
        if self.internal {
            SelectorOptions::INTERNAL
        } else {
            SelectorOptions::NONE
        }
    }
}

/// Builder for SelectorConfig with validation
#[derive(Default)]
pub struct SelectorConfigBuilder {
    cache_capacity: Option<usize>,
    internal: Option<bool>,
}

impl SelectorConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    pub fn internal(mut self, internal: bool) -> Self {
        self.internal = Some(internal);
        self
    }

    /// Build the config, validating all parameters
    pub fn build(self) -> Result<SelectorConfig, SelectorError> {
        let config = self.build_unchecked();
        config.validate()?;
        Ok(config)
    }

    /// Build without validation (for testing)
    pub fn build_unchecked(self) -> SelectorConfig {
        let defaults = SelectorConfig::default();
        SelectorConfig {
            cache_capacity: self.cache_capacity.unwrap_or(defaults.cache_capacity),
            internal: self.internal.unwrap_or(defaults.internal),
        }
    }
}
