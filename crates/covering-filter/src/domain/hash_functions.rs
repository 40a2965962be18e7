//! Hash families for covering filters
//!
//! A hash family turns an element into `k` bin indices in `[0, m)`. Every
//! server that reads a published filter must derive the same bins, so the
//! family travels with the filter as a small wire identifier.
//!
//! Two base hashes are available (MurmurHash3 x64-128 and CityHash64) and
//! two ways of expanding a base hash into `k` bins:
//!
//! - **CH** (combinatorial): `g_i = h1 + i * h2 (mod m)`
//! - **LC** (linear congruential): an LCG seeded from the base hash, one step
//!   per bin

use std::fmt;
use std::io::Cursor;

use serde::{Deserialize, Serialize};

use super::city_hash::city_hash64;
use crate::error::FilterError;

/// LCG multiplier (Knuth MMIX).
const LCG_MULTIPLIER: u64 = 6_364_136_223_846_793_005;

/// Hash family identifier, as carried on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum HashFamily {
    Murmur3_128Ch = 1,
    City64Ch = 2,
    Murmur3_128Lc = 3,
    City64Lc = 4,
}

impl HashFamily {
    /// Wire id meaning "no filter" in a published base.
    pub const NONE_ID: u16 = 0;

    /// All supported families.
    pub const ALL: [HashFamily; 4] = [
        HashFamily::Murmur3_128Ch,
        HashFamily::City64Ch,
        HashFamily::Murmur3_128Lc,
        HashFamily::City64Lc,
    ];

    /// Wire id of this family.
    pub fn id(self) -> u16 {
        self as u16
    }

    /// Bin hasher implementing this family.
    pub fn hasher(self) -> &'static dyn BinHasher {
        match self {
            HashFamily::Murmur3_128Ch => &Murmur3Combinatorial,
            HashFamily::City64Ch => &City64Combinatorial,
            HashFamily::Murmur3_128Lc => &Murmur3LinearCongruential,
            HashFamily::City64Lc => &City64LinearCongruential,
        }
    }
}

impl TryFrom<u16> for HashFamily {
    type Error = FilterError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(HashFamily::Murmur3_128Ch),
            2 => Ok(HashFamily::City64Ch),
            3 => Ok(HashFamily::Murmur3_128Lc),
            4 => Ok(HashFamily::City64Lc),
            other => Err(FilterError::UnknownHashFamily(other)),
        }
    }
}

impl fmt::Display for HashFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashFamily::Murmur3_128Ch => "MURMUR3_128_CH",
            HashFamily::City64Ch => "CITY64_CH",
            HashFamily::Murmur3_128Lc => "MURMUR3_128_LC",
            HashFamily::City64Lc => "CITY64_LC",
        };
        f.write_str(name)
    }
}

/// Computes the bins of an element.
///
/// Implementations are stateless; `bins` appends exactly `num_hashes`
/// indices, each `< num_bits`, to `out`.
pub trait BinHasher: Send + Sync + fmt::Debug {
    /// The family this hasher implements
    fn family(&self) -> HashFamily;

    /// Append the `num_hashes` bins of `element` to `out`
    fn bins(&self, element: &[u8], num_hashes: u8, num_bits: u64, out: &mut Vec<u64>);
}

/// MurmurHash3 x64-128 split into its two 64-bit halves.
fn murmur3_halves(element: &[u8]) -> (u64, u64) {
    let mut cursor = Cursor::new(element);
    let hash = murmur3::murmur3_x64_128(&mut cursor, 0).unwrap_or(0);
    (hash as u64, (hash >> 64) as u64)
}

/// CityHash64 split into its two 32-bit halves.
fn city64_halves(element: &[u8]) -> (u64, u64) {
    let hash = city_hash64(element);
    (hash & 0xFFFF_FFFF, hash >> 32)
}

fn combinatorial(h1: u64, h2: u64, num_hashes: u8, num_bits: u64, out: &mut Vec<u64>) {
    out.extend((0..u64::from(num_hashes)).map(|i| h1.wrapping_add(i.wrapping_mul(h2)) % num_bits));
}

fn linear_congruential(seed: u64, step: u64, num_hashes: u8, num_bits: u64, out: &mut Vec<u64>) {
    let increment = step | 1;
    let mut state = seed;
    out.extend((0..num_hashes).map(|_| {
        state = state.wrapping_mul(LCG_MULTIPLIER).wrapping_add(increment);
        state % num_bits
    }));
}

#[derive(Debug)]
pub struct Murmur3Combinatorial;

impl BinHasher for Murmur3Combinatorial {
    fn family(&self) -> HashFamily {
        HashFamily::Murmur3_128Ch
    }

    fn bins(&self, element: &[u8], num_hashes: u8, num_bits: u64, out: &mut Vec<u64>) {
        let (h1, h2) = murmur3_halves(element);
        combinatorial(h1, h2, num_hashes, num_bits, out);
    }
}

#[derive(Debug)]
pub struct City64Combinatorial;

impl BinHasher for City64Combinatorial {
    fn family(&self) -> HashFamily {
        HashFamily::City64Ch
    }

    fn bins(&self, element: &[u8], num_hashes: u8, num_bits: u64, out: &mut Vec<u64>) {
        let (h1, h2) = city64_halves(element);
        combinatorial(h1, h2, num_hashes, num_bits, out);
    }
}

#[derive(Debug)]
pub struct Murmur3LinearCongruential;

impl BinHasher for Murmur3LinearCongruential {
    fn family(&self) -> HashFamily {
        HashFamily::Murmur3_128Lc
    }

    fn bins(&self, element: &[u8], num_hashes: u8, num_bits: u64, out: &mut Vec<u64>) {
        let (h1, h2) = murmur3_halves(element);
        linear_congruential(h1, h2, num_hashes, num_bits, out);
    }
}

#[derive(Debug)]
pub struct City64LinearCongruential;

impl BinHasher for City64LinearCongruential {
    fn family(&self) -> HashFamily {
        HashFamily::City64Lc
    }

    fn bins(&self, element: &[u8], num_hashes: u8, num_bits: u64, out: &mut Vec<u64>) {
        let hash = city_hash64(element);
        linear_congruential(hash, hash.rotate_left(32), num_hashes, num_bits, out);
    }
}
