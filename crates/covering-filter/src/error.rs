//! Error types for the covering filter subsystem

use thiserror::Error;

/// Errors that can occur in the covering filter subsystem
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    #[error("Unknown hash family: {0}")]
    UnknownHashFamily(u16),

    #[error("Invalid filter parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid false positive probability: {fpp} (must be in (0, 1))")]
    InvalidFpp { fpp: f64 },

    #[error("Invalid counter size: {0} (must be 4 or 8)")]
    InvalidCounterSize(u8),

    /// A counter would exceed its width. The filter was sized too small for
    /// the number of elements it holds.
    #[error("Counter overflow at bin {index}: already at maximum {max}")]
    CounterOverflow { index: u64, max: u8 },

    #[error("Bin index out of range: {index} >= {num_bits}")]
    IndexOutOfRange { index: u64, num_bits: u64 },

    #[error("Invalid filter buffer length: expected {expected} bytes, got {actual}")]
    InvalidBufferLength { expected: usize, actual: usize },

    #[error("Allocation of {bytes} bytes failed")]
    AllocationFailed { bytes: usize },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Topic not subscribed: {0}")]
    TopicNotFound(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Malformed filter attribute: {0}")]
    MalformedAttribute(String),

    #[error("Sequence gap: expected {expected}, received {received}")]
    SequenceGap { expected: u64, received: u64 },

    #[error("No base filter received yet")]
    NoBaseFilter,
}
