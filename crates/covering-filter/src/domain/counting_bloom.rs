//! # Counting Bloom Filter
//!
//! Replaces each bit with a small counter so elements can be removed:
//! - Add: increment counters at hashed positions
//! - Remove: decrement counters at hashed positions
//! - Membership: true if all counters > 0
//!
//! `add` and `remove` report which bins switched between zero and non-zero
//! as 1-based signed indices (`+i` became present, `-i` became absent). Those
//! deltas are exactly the bit flips of the projected [`BloomFilter`], which
//! is what gets published incrementally.
//!
//! ## Packing
//!
//! 8-bit counters take one byte each. 4-bit counters share a byte: the even
//! counter in the high nibble, the odd one in the low nibble.

use serde::{Deserialize, Serialize};

use super::asm_filter::{bit_offset_of, byte_index_of, bytes_for_bits, AsmFilter, AsmParams};
use super::bloom_filter::BloomFilter;
use super::hash_functions::HashFamily;
use super::parameters::{compute_optimal_parameters, estimate_fpp};
use crate::error::FilterError;

/// Width of a single counter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CounterWidth {
    Four,
    Eight,
}

impl CounterWidth {
    /// Largest value a counter can hold
    pub fn max_count(self) -> u8 {
        match self {
            CounterWidth::Four => 15,
            CounterWidth::Eight => u8::MAX,
        }
    }

    /// Width in bits
    pub fn bits(self) -> u8 {
        match self {
            CounterWidth::Four => 4,
            CounterWidth::Eight => 8,
        }
    }

    fn storage_bytes(self, num_counters: u64) -> usize {
        match self {
            CounterWidth::Four => num_counters.div_ceil(2) as usize,
            CounterWidth::Eight => num_counters as usize,
        }
    }
}

impl TryFrom<u8> for CounterWidth {
    type Error = FilterError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            4 => Ok(CounterWidth::Four),
            8 => Ok(CounterWidth::Eight),
            other => Err(FilterError::InvalidCounterSize(other)),
        }
    }
}

/// Counting Bloom filter with 4-bit or 8-bit counters
#[derive(Clone, Debug, PartialEq)]
pub struct CountingBloomFilter {
    params: AsmParams,
    width: CounterWidth,
    counters: Vec<u8>,
    /// Net add/remove balance; see [`CountingBloomFilter::remove`]
    num_elements: i32,
    projected_num_elements: Option<u64>,
    desired_fpp: Option<f64>,
}

impl CountingBloomFilter {
    /// Create an empty filter with `params.num_bits` counters.
    ///
    /// Deltas are `i32`, so the counter count is limited to `i32::MAX`.
    pub fn new(params: AsmParams, width: CounterWidth) -> Result<Self, FilterError> {
        if params.num_bits > i32::MAX as u64 {
            return Err(FilterError::InvalidParameters(format!(
                "{} counters exceed the delta range",
                params.num_bits
            )));
        }
        Ok(Self {
            params,
            width,
            counters: vec![0u8; width.storage_bytes(params.num_bits)],
            num_elements: 0,
            projected_num_elements: None,
            desired_fpp: None,
        })
    }

    /// Create a filter sized for `projected_num_elements` at `desired_fpp`
    pub fn with_capacity(
        projected_num_elements: u64,
        desired_fpp: f64,
        hash_family: HashFamily,
        width: CounterWidth,
    ) -> Result<Self, FilterError> {
        let (num_bits, num_hashes) =
            compute_optimal_parameters(projected_num_elements, desired_fpp)?;
        let mut filter = Self::new(AsmParams::new(num_bits, num_hashes, hash_family)?, width)?;
        filter.projected_num_elements = Some(projected_num_elements);
        filter.desired_fpp = Some(desired_fpp);
        Ok(filter)
    }

    /// Insert an element.
    ///
    /// Returns the 1-based indices of bins that went from zero to non-zero.
    /// Fails with [`FilterError::CounterOverflow`] if any bin is saturated;
    /// the filter is unchanged in that case.
    pub fn add(&mut self, element: &[u8]) -> Result<Vec<i32>, FilterError> {
        let bins = self.bins_of(element);
        self.check_headroom(&bins)?;

        let mut deltas = Vec::new();
        for bin in bins {
            if self.increase_at(bin)? == 1 {
                deltas.push(bin as i32 + 1);
            }
        }
        self.num_elements = self.num_elements.wrapping_add(1);
        Ok(deltas)
    }

    /// Remove an element.
    ///
    /// Counters are only decremented if the element is currently contained.
    /// Returns the negated 1-based indices of bins that dropped to zero.
    ///
    /// `num_elements` is decremented even when the element was absent, so it
    /// can go negative after a bad sequence of calls.
    pub fn remove(&mut self, element: &[u8]) -> Vec<i32> {
        let bins = self.bins_of(element);
        let mut deltas = Vec::new();

        if bins.iter().all(|&bin| self.count(bin) > 0) {
            for bin in bins {
                if self.decrease_at(bin) {
                    deltas.push(-(bin as i32 + 1));
                }
            }
        }

        self.num_elements = self.num_elements.wrapping_sub(1);
        deltas
    }

    /// Check if element might be in the filter.
    pub fn contains(&self, element: &[u8]) -> bool {
        self.bins_of(element)
            .into_iter()
            .all(|bin| self.count(bin) > 0)
    }

    /// Counter at `index`
    pub fn get_count_at(&self, index: u64) -> Result<u8, FilterError> {
        self.check_index(index)?;
        Ok(self.count(index))
    }

    /// Overwrite the counter at `index`.
    ///
    /// Only the addressed counter changes; its nibble neighbour is preserved.
    pub fn set_count_at(&mut self, index: u64, value: u8) -> Result<(), FilterError> {
        self.check_index(index)?;
        let max = self.width.max_count();
        if value > max {
            return Err(FilterError::CounterOverflow { index, max });
        }
        self.store(index, value);
        Ok(())
    }

    /// Increment the counter at `index` and return its new value.
    ///
    /// # Errors
    /// [`FilterError::CounterOverflow`] if the counter is already at its
    /// maximum. This means the filter was sized too small for its load.
    pub fn increase_at(&mut self, index: u64) -> Result<u8, FilterError> {
        self.check_index(index)?;
        let current = self.count(index);
        let max = self.width.max_count();
        if current >= max {
            return Err(FilterError::CounterOverflow { index, max });
        }
        self.store(index, current + 1);
        Ok(current + 1)
    }

    /// Project into a new Bloom filter: bit `i` is set iff counter `i > 0`.
    pub fn produce_bloom_filter(&self) -> BloomFilter {
        let mut raw = vec![0u8; bytes_for_bits(self.params.num_bits)];
        self.project_into(&mut raw);
        BloomFilter::install(self.params, raw)
    }

    /// Project into an existing Bloom filter, adopting this filter's
    /// geometry. Fails with [`FilterError::AllocationFailed`] if the target
    /// must grow and cannot.
    pub fn update_bloom_filter(&self, target: &mut BloomFilter) -> Result<(), FilterError> {
        target.reshape(self.params)?;
        let raw = target.raw_mut();
        raw.fill(0);
        self.project_into(raw);
        Ok(())
    }

    /// Theoretical false positive probability at the current load
    pub fn estimate_fpp(&self) -> f64 {
        estimate_fpp(
            self.params.num_bits,
            self.params.num_hashes,
            i64::from(self.num_elements),
        )
    }

    /// Static sizing helper, see [`compute_optimal_parameters`]
    pub fn compute_optimal_parameters(
        projected_num_elements: u64,
        desired_fpp: f64,
    ) -> Result<(u64, u8), FilterError> {
        compute_optimal_parameters(projected_num_elements, desired_fpp)
    }

    pub fn num_counters(&self) -> u64 {
        self.params.num_bits
    }

    pub fn counter_width(&self) -> CounterWidth {
        self.width
    }

    /// Counter width in bits (4 or 8)
    pub fn counter_size(&self) -> u8 {
        self.width.bits()
    }

    pub fn num_elements(&self) -> i32 {
        self.num_elements
    }

    pub fn projected_num_elements(&self) -> Option<u64> {
        self.projected_num_elements
    }

    pub fn desired_fpp(&self) -> Option<f64> {
        self.desired_fpp
    }

    /// Get size in bytes
    pub fn size_bytes(&self) -> usize {
        self.counters.len()
    }

    /// Reset every counter and the element count
    pub fn clear(&mut self) {
        self.counters.fill(0);
        self.num_elements = 0;
    }

    /// Fail if adding one to every bin in `bins` would overflow a counter.
    /// Bins may repeat, so repeats are counted.
    fn check_headroom(&self, bins: &[u64]) -> Result<(), FilterError> {
        let mut sorted = bins.to_vec();
        sorted.sort_unstable();
        let max = self.width.max_count();

        for run in sorted.chunk_by(|a, b| a == b) {
            let bin = run[0];
            if usize::from(self.count(bin)) + run.len() > usize::from(max) {
                return Err(FilterError::CounterOverflow { index: bin, max });
            }
        }
        Ok(())
    }

    /// Decrement a non-zero counter; true if it dropped to zero.
    fn decrease_at(&mut self, index: u64) -> bool {
        match self.count(index) {
            0 => false,
            current => {
                self.store(index, current - 1);
                current == 1
            }
        }
    }

    fn project_into(&self, raw: &mut [u8]) {
        for index in 0..self.params.num_bits {
            if self.count(index) > 0 {
                raw[byte_index_of(index)] |= 1 << bit_offset_of(index);
            }
        }
    }

    fn count(&self, index: u64) -> u8 {
        match self.width {
            CounterWidth::Eight => self.counters[index as usize],
            CounterWidth::Four => {
                let byte = self.counters[nibble_byte_of(index)];
                if is_high_nibble(index) {
                    byte >> 4
                } else {
                    byte & 0x0F
                }
            }
        }
    }

    fn store(&mut self, index: u64, value: u8) {
        match self.width {
            CounterWidth::Eight => self.counters[index as usize] = value,
            CounterWidth::Four => {
                let byte = &mut self.counters[nibble_byte_of(index)];
                if is_high_nibble(index) {
                    *byte = (*byte & 0x0F) | (value << 4);
                } else {
                    *byte = (*byte & 0xF0) | (value & 0x0F);
                }
            }
        }
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

impl AsmFilter for CountingBloomFilter {
    fn params(&self) -> &AsmParams {
        &self.params
    }
}

/// Byte holding 4-bit counter `index`.
#[inline]
pub fn nibble_byte_of(index: u64) -> usize {
    (index >> 1) as usize
}

/// Even counters live in the high nibble.
#[inline]
pub fn is_high_nibble(index: u64) -> bool {
    index & 1 == 0
}
