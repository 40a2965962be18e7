//! Shared filter geometry
//!
//! Both filter kinds are described by the same three parameters: the number
//! of bins `m`, the number of hash functions `k` and the hash family. The
//! [`AsmFilter`] trait exposes them and derives the bins of an element; it
//! owns no storage.

use serde::{Deserialize, Serialize};

use super::hash_functions::HashFamily;
use crate::error::FilterError;

/// Geometry of a covering filter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsmParams {
    /// Number of bins (m)
    pub num_bits: u64,
    /// Number of hash functions (k)
    pub num_hashes: u8,
    /// Hash family used to derive bins
    pub hash_family: HashFamily,
}

impl AsmParams {
    /// Create validated parameters.
    ///
    /// Fails when `num_bits` or `num_hashes` is zero.
    pub fn new(num_bits: u64, num_hashes: u8, hash_family: HashFamily) -> Result<Self, FilterError> {
        if num_bits == 0 {
            return Err(FilterError::InvalidParameters(
                "num_bits cannot be 0".to_string(),
            ));
        }
        if num_hashes == 0 {
            return Err(FilterError::InvalidParameters(
                "num_hashes cannot be 0".to_string(),
            ));
        }
        Ok(Self {
            num_bits,
            num_hashes,
            hash_family,
        })
    }

    /// Like [`AsmParams::new`], but takes the hash family as a wire id.
    pub fn from_wire(num_bits: u64, num_hashes: u8, family_id: u16) -> Result<Self, FilterError> {
        Self::new(num_bits, num_hashes, HashFamily::try_from(family_id)?)
    }

    /// Append the bins of `element` to `out`.
    pub fn bins_into(&self, element: &[u8], out: &mut Vec<u64>) {
        self.hash_family
            .hasher()
            .bins(element, self.num_hashes, self.num_bits, out);
    }
}

/// Common capability of Bloom and counting Bloom filters
pub trait AsmFilter {
    /// Geometry of this filter
    fn params(&self) -> &AsmParams;

    fn num_bits(&self) -> u64 {
        self.params().num_bits
    }

    fn num_hashes(&self) -> u8 {
        self.params().num_hashes
    }

    fn hash_family(&self) -> HashFamily {
        self.params().hash_family
    }

    /// Bins of `element` under this filter's geometry.
    ///
    /// Lets callers drive a counting filter and a Bloom filter in lock-step.
    fn bins_of(&self, element: &[u8]) -> Vec<u64> {
        let mut out = Vec::with_capacity(usize::from(self.num_hashes()));
        self.params().bins_into(element, &mut out);
        out
    }
}

/// Byte holding bit `bit`.
#[inline]
pub fn byte_index_of(bit: u64) -> usize {
    (bit >> 3) as usize
}

/// Offset of bit `bit` within its byte, LSB first.
#[inline]
pub fn bit_offset_of(bit: u64) -> u8 {
    (bit & 7) as u8
}

/// Bytes needed to hold `num_bits` bits.
#[inline]
pub fn bytes_for_bits(num_bits: u64) -> usize {
    num_bits.div_ceil(8) as usize
}
