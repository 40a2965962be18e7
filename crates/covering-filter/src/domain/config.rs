//! Covering filter configuration and validation
//!
//! # Example
//!
//! ```ignore
//! use covering_filter::domain::CoveringFilterConfigBuilder;
//!
//! let config = CoveringFilterConfigBuilder::new()
//!     .projected_num_elements(10_000)
//!     .desired_fpp(0.001)
//!     .counter_size(8)
//!     .build()
//!     .expect("Valid config");
//! ```

use serde::{Deserialize, Serialize};

use super::counting_bloom::CounterWidth;
use super::hash_functions::HashFamily;
use crate::error::FilterError;

/// Covering filter configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoveringFilterConfig {
    /// Number of distinct topics the filter is sized for
    pub projected_num_elements: u64,
    /// Target false positive probability, in (0, 1)
    pub desired_fpp: f64,
    /// Counter width in bits (4 or 8)
    pub counter_size: u8,
    /// Hash family used for bins
    pub hash_family: HashFamily,
    /// Incremental updates tolerated before a new base is published
    pub max_attributes: usize,
}

impl Default for CoveringFilterConfig {
    fn default() -> Self {
        Self {
            projected_num_elements: 64_000,
            desired_fpp: 0.01,
            counter_size: 4,
            hash_family: HashFamily::Murmur3_128Ch,
            max_attributes: 50,
        }
    }
}

impl CoveringFilterConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), FilterError> {
        if !(self.desired_fpp > 0.0 && self.desired_fpp < 1.0) {
            return Err(FilterError::InvalidFpp {
                fpp: self.desired_fpp,
            });
        }

        CounterWidth::try_from(self.counter_size)?;

        if self.max_attributes == 0 {
            return Err(FilterError::InvalidParameters(
                "max_attributes cannot be 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Parse and validate a JSON configuration. Missing fields take their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self, FilterError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| FilterError::SerializationError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Counter width; only meaningful on a validated config.
    pub fn counter_width(&self) -> Result<CounterWidth, FilterError> {
        CounterWidth::try_from(self.counter_size)
    }
}

/// Builder for CoveringFilterConfig with validation
#[derive(Default)]
pub struct CoveringFilterConfigBuilder {
    projected_num_elements: Option<u64>,
    desired_fpp: Option<f64>,
    counter_size: Option<u8>,
    hash_family: Option<HashFamily>,
    max_attributes: Option<usize>,
}

impl CoveringFilterConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn projected_num_elements(mut self, n: u64) -> Self {
        self.projected_num_elements = Some(n);
        self
    }

    /// Set target false positive probability (exclusive 0..1)
    pub fn desired_fpp(mut self, fpp: f64) -> Self {
        self.desired_fpp = Some(fpp);
        self
    }

    /// Set counter width in bits (4 or 8)
    pub fn counter_size(mut self, bits: u8) -> Self {
        self.counter_size = Some(bits);
        self
    }

    pub fn hash_family(mut self, family: HashFamily) -> Self {
        self.hash_family = Some(family);
        self
    }

    pub fn max_attributes(mut self, max: usize) -> Self {
        self.max_attributes = Some(max);
        self
    }

    /// Build the config, validating all parameters
    pub fn build(self) -> Result<CoveringFilterConfig, FilterError> {
        let config = self.build_unchecked();
        config.validate()?;
        Ok(config)
    }

    /// Build without validation (for testing)
    pub fn build_unchecked(self) -> CoveringFilterConfig {
        let defaults = CoveringFilterConfig::default();
        CoveringFilterConfig {
            projected_num_elements: self
                .projected_num_elements
                .unwrap_or(defaults.projected_num_elements),
            desired_fpp: self.desired_fpp.unwrap_or(defaults.desired_fpp),
            counter_size: self.counter_size.unwrap_or(defaults.counter_size),
            hash_family: self.hash_family.unwrap_or(defaults.hash_family),
            max_attributes: self.max_attributes.unwrap_or(defaults.max_attributes),
        }
    }
}
