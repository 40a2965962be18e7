//! Bloom filter over `m` bins
//!
//! The backing store is `ceil(m/8)` bytes; bit `i` lives at byte `i >> 3`,
//! offset `i & 7`, LSB first. That raw layout is what peers exchange, so
//! [`BloomFilter::buffer`] and [`BloomFilter::set_content`] are bit-exact.

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use super::asm_filter::{bytes_for_bits, AsmFilter, AsmParams};
use super::hash_functions::HashFamily;
use crate::error::FilterError;

/// Bloom filter for probabilistic membership testing
///
/// No false negatives: once `put(e)` returns, `contains(e)` is true until a
/// bin of `e` is explicitly reset or the content is replaced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BloomFilter {
    params: AsmParams,
    /// Bit array storing the filter state
    #[serde(with = "bitvec_serde")]
    bits: BitVec<u8, Lsb0>,
}

/// Serde support for BitVec
mod bitvec_serde {
    use bitvec::prelude::*;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bits: &BitVec<u8, Lsb0>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (bits.as_raw_slice(), bits.len()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BitVec<u8, Lsb0>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (bytes, len): (Vec<u8>, usize) = Deserialize::deserialize(deserializer)?;
        let mut bits = BitVec::<u8, Lsb0>::from_vec(bytes);
        bits.truncate(len);
        Ok(bits)
    }
}

/// Allocate a zeroed byte buffer, reporting failure instead of aborting.
pub(crate) fn try_zeroed(bytes: usize) -> Result<Vec<u8>, FilterError> {
    let mut raw = Vec::new();
    raw.try_reserve_exact(bytes)
        .map_err(|_| FilterError::AllocationFailed { bytes })?;
    raw.resize(bytes, 0);
    Ok(raw)
}

fn bits_from_raw(raw: Vec<u8>, num_bits: u64) -> BitVec<u8, Lsb0> {
    let mut bits = BitVec::<u8, Lsb0>::from_vec(raw);
    bits.truncate(num_bits as usize);
    bits
}

impl BloomFilter {
    /// Create an empty filter with the given geometry
    pub fn new(params: AsmParams) -> Self {
        Self {
            params,
            bits: bitvec![u8, Lsb0; 0; params.num_bits as usize],
        }
    }

    /// Create a filter from a raw peer buffer of `ceil(num_bits/8)` bytes
    pub fn from_buffer(params: AsmParams, buffer: &[u8]) -> Result<Self, FilterError> {
        check_buffer_len(params.num_bits, buffer)?;
        Ok(Self::install(params, buffer.to_vec()))
    }

    /// Wrap an already-sized raw buffer.
    pub(crate) fn install(params: AsmParams, raw: Vec<u8>) -> Self {
        debug_assert_eq!(raw.len(), bytes_for_bits(params.num_bits));
        Self {
            params,
            bits: bits_from_raw(raw, params.num_bits),
        }
    }

    /// Set all bins of `element`. Idempotent.
    pub fn put(&mut self, element: &[u8]) {
        for bin in self.bins_of(element) {
            self.bits.set(bin as usize, true);
        }
    }

    /// Test if an element might be in the filter
    ///
    /// Returns:
    /// - `true` if the element might be in the set (could be false positive)
    /// - `false` if the element is definitely NOT in the set
    pub fn contains(&self, element: &[u8]) -> bool {
        self.bins_of(element)
            .into_iter()
            .all(|bin| self.bits[bin as usize])
    }

    /// Replace geometry and contents from a raw buffer.
    ///
    /// The storage is reallocated only when `num_bits` changes; on allocation
    /// failure the filter is left as it was.
    pub fn set_content(
        &mut self,
        num_bits: u64,
        num_hashes: u8,
        hash_family: HashFamily,
        buffer: &[u8],
    ) -> Result<(), FilterError> {
        let params = AsmParams::new(num_bits, num_hashes, hash_family)?;
        check_buffer_len(num_bits, buffer)?;
        self.reshape(params)?;
        self.bits.as_raw_mut_slice().copy_from_slice(buffer);
        Ok(())
    }

    /// Adopt `params`, reallocating storage if the bin count differs.
    ///
    /// Contents are unspecified afterwards when the size is unchanged.
    pub(crate) fn reshape(&mut self, params: AsmParams) -> Result<(), FilterError> {
        if params.num_bits != self.params.num_bits {
            let raw = try_zeroed(bytes_for_bits(params.num_bits))?;
            self.bits = bits_from_raw(raw, params.num_bits);
        }
        self.params = params;
        Ok(())
    }

    pub(crate) fn raw_mut(&mut self) -> &mut [u8] {
        self.bits.as_raw_mut_slice()
    }

    /// Set bin `index`
    pub fn set_bin_at(&mut self, index: u64) -> Result<(), FilterError> {
        self.check_index(index)?;
        self.bits.set(index as usize, true);
        Ok(())
    }

    /// Clear bin `index`
    pub fn reset_bin_at(&mut self, index: u64) -> Result<(), FilterError> {
        self.check_index(index)?;
        self.bits.set(index as usize, false);
        Ok(())
    }

    /// Read bin `index`.
    ///
    /// This is the hot read path and is not bounds checked in release builds.
    ///
    /// # Panics
    /// Panics if `index >= num_bits`.
    pub fn check_bin_at(&self, index: u64) -> bool {
        debug_assert!(index < self.params.num_bits, "bin {} out of range", index);
        self.bits[index as usize]
    }

    /// Apply 1-based signed bin deltas as produced by the counting filter.
    ///
    /// A positive delta `i` sets bin `i - 1`, a negative one resets bin
    /// `|i| - 1`. All deltas are validated before any is applied.
    pub fn apply_updates(&mut self, deltas: &[i32]) -> Result<(), FilterError> {
        let num_bits = self.params.num_bits;
        for &delta in deltas {
            if delta == 0 {
                return Err(FilterError::InvalidParameters(
                    "bin delta cannot be 0".to_string(),
                ));
            }
            let index = u64::from(delta.unsigned_abs()) - 1;
            if index >= num_bits {
                return Err(FilterError::IndexOutOfRange { index, num_bits });
            }
        }

        for &delta in deltas {
            let index = (delta.unsigned_abs() - 1) as usize;
            self.bits.set(index, delta > 0);
        }
        Ok(())
    }

    /// Raw bit-exact backing store
    pub fn buffer(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }

    /// Get size in bytes
    pub fn size_bytes(&self) -> usize {
        self.bits.as_raw_slice().len()
    }

    /// Get the number of bits set in the filter
    pub fn count_ones(&self) -> usize {
        self.bits.count_ones()
    }

    /// Clear the filter (reset all bits to 0)
    pub fn clear(&mut self) {
        self.bits.as_raw_mut_slice().fill(0);
    }

    /// Serialize geometry and bits with bincode
    pub fn to_bytes(&self) -> Result<Vec<u8>, FilterError> {
        bincode::serialize(self).map_err(|e| FilterError::SerializationError(e.to_string()))
    }

    /// Deserialize a filter written by [`BloomFilter::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FilterError> {
        let filter: Self = bincode::deserialize(bytes)
            .map_err(|e| FilterError::SerializationError(e.to_string()))?;
        let params = filter.params;
        AsmParams::new(params.num_bits, params.num_hashes, params.hash_family)?;
        if filter.bits.len() as u64 != params.num_bits {
            return Err(FilterError::InvalidBufferLength {
                expected: bytes_for_bits(params.num_bits),
                actual: filter.size_bytes(),
            });
        }
        Ok(filter)
    }

    fn check_index(&self, index: u64) -> Result<(), FilterError> {
        if index >= self.params.num_bits {
            return Err(FilterError::IndexOutOfRange {
                index,
                num_bits: self.params.num_bits,
            });
        }
        Ok(())
    }
}

impl AsmFilter for BloomFilter {
    fn params(&self) -> &AsmParams {
        &self.params
    }
}

fn check_buffer_len(num_bits: u64, buffer: &[u8]) -> Result<(), FilterError> {
    let expected = bytes_for_bits(num_bits);
    if buffer.len() != expected {
        return Err(FilterError::InvalidBufferLength {
            expected,
            actual: buffer.len(),
        });
    }
    Ok(())
}
