//! Optimal covering filter sizing
//!
//! Formulas:
//! - m = -n*ln(p) / (ln(2)^2)  -- optimal bins, rounded up to a power of two
//! - k = round((m/n) * ln(2))  -- optimal hash functions
//! - FPP = (1 - (1 - 1/m)^(kn))^k

use std::f64::consts::LN_2;

use crate::error::FilterError;

/// Round `v` up to the next power of two (bit smearing).
///
/// `0` stays `0`; values above `2^63` wrap to `0` and must be rejected by
/// the caller.
pub fn round_up_to_power_of_two(v: u64) -> u64 {
    let mut v = v.wrapping_sub(1);
    v |= v >> 1;
    v |= v >> 2;
    v |= v >> 4;
    v |= v >> 8;
    v |= v >> 16;
    v |= v >> 32;
    v.wrapping_add(1)
}

/// Unrounded optimal bin count for `num_elements` at `fpp`
pub fn optimal_bits(num_elements: u64, fpp: f64) -> f64 {
    let n = num_elements.max(1) as f64;
    (-n * fpp.ln() / (LN_2 * LN_2)).ceil()
}

/// Size a filter for `num_elements` at false positive probability `fpp`.
///
/// Returns `(num_bits, num_hashes)`; `num_bits` is a power of two and
/// `num_hashes` is in `1..=255`. A projection of zero is treated as one.
pub fn compute_optimal_parameters(num_elements: u64, fpp: f64) -> Result<(u64, u8), FilterError> {
    if !(fpp > 0.0 && fpp < 1.0) {
        return Err(FilterError::InvalidFpp { fpp });
    }

    let n = num_elements.max(1);
    let bits = optimal_bits(n, fpp);
    if bits > (1u64 << 62) as f64 {
        return Err(FilterError::InvalidParameters(format!(
            "{} elements at fpp {} need more than 2^62 bins",
            n, fpp
        )));
    }

    let num_bits = round_up_to_power_of_two((bits as u64).max(1));
    let k = (LN_2 * num_bits as f64 / n as f64).round();
    let num_hashes = k.clamp(1.0, f64::from(u8::MAX)) as u8;

    Ok((num_bits, num_hashes))
}

/// Theoretical false positive probability of a filter with `num_bits` bins,
/// `num_hashes` hash functions and `num_elements` members
pub fn estimate_fpp(num_bits: u64, num_hashes: u8, num_elements: i64) -> f64 {
    if num_bits == 0 {
        return 1.0;
    }
    if num_elements <= 0 {
        return 0.0;
    }
    let k = f64::from(num_hashes);
    let miss = (1.0 - 1.0 / num_bits as f64).powf(k * num_elements as f64);
    (1.0 - miss).powf(k)
}
