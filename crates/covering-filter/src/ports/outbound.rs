//! Outbound Ports (Driven Ports)
//!
//! The covering filter service hands its snapshots and deltas to a
//! publisher; transport to peers lives behind this trait.

use crate::domain::HashFamily;
use crate::error::FilterError;

/// A full filter snapshot as published to peers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterBase<'a> {
    /// `None` withdraws the filter
    pub hash_family: Option<HashFamily>,
    pub num_hashes: u8,
    pub num_bits: u64,
    /// Raw LSB-first bit vector, `ceil(num_bits/8)` bytes
    pub buffer: &'a [u8],
}

impl FilterBase<'static> {
    /// Base announcing that no filter is published any more
    pub fn removed() -> Self {
        Self {
            hash_family: None,
            num_hashes: 0,
            num_bits: 0,
            buffer: &[],
        }
    }
}

/// Filter publisher (Driven Port)
pub trait FilterPublisher: Send + Sync {
    /// Publish a base, returning its sequence number
    fn publish_base(&self, base: &FilterBase<'_>) -> Result<u64, FilterError>;

    /// Publish 1-based signed bin deltas against the last base, returning the
    /// sequence number
    fn publish_update(&self, deltas: &[i32]) -> Result<u64, FilterError>;

    /// Number of updates published since the last base
    fn num_updates(&self) -> usize;
}
