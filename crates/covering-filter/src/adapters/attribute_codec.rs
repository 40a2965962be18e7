//! Wire encoding of published filter attributes
//!
//! All integers are big-endian.
//!
//! Base attribute:
//!
//! ```text
//! u64 sqn | i16 hash_family | i16 num_hashes | i32 num_bits | ceil(num_bits/8) bytes
//! ```
//!
//! A `hash_family` of 0 withdraws the filter; the geometry fields are then 0
//! and no bytes follow.
//!
//! Update attribute:
//!
//! ```text
//! u64 sqn | i32 count | count x i32 delta
//! ```

use std::io::{self, Cursor, Read};

use crate::domain::asm_filter::bytes_for_bits;
use crate::domain::HashFamily;
use crate::error::FilterError;
use crate::ports::FilterBase;

const BASE_HEADER_LEN: usize = 16;
const UPDATE_HEADER_LEN: usize = 12;

/// A decoded base attribute
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseAttribute {
    pub sqn: u64,
    /// `None` when the filter was withdrawn
    pub hash_family: Option<HashFamily>,
    pub num_hashes: u8,
    pub num_bits: u64,
    pub buffer: Vec<u8>,
}

impl BaseAttribute {
    /// Borrow as a [`FilterBase`]
    pub fn as_base(&self) -> FilterBase<'_> {
        FilterBase {
            hash_family: self.hash_family,
            num_hashes: self.num_hashes,
            num_bits: self.num_bits,
            buffer: &self.buffer,
        }
    }
}

/// A decoded update attribute
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateAttribute {
    pub sqn: u64,
    pub deltas: Vec<i32>,
}

/// Big-endian cursor over an attribute value
struct AttributeReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> AttributeReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    fn read_array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.cursor.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_u64_be(&mut self) -> io::Result<u64> {
        self.read_array().map(u64::from_be_bytes)
    }

    fn read_i32_be(&mut self) -> io::Result<i32> {
        self.read_array().map(i32::from_be_bytes)
    }

    fn read_i16_be(&mut self) -> io::Result<i16> {
        self.read_array().map(i16::from_be_bytes)
    }

    fn remaining(&self) -> usize {
        let total = self.cursor.get_ref().len();
        total.saturating_sub(self.cursor.position() as usize)
    }

    fn rest(&self) -> &'a [u8] {
        let bytes: &'a [u8] = *self.cursor.get_ref();
        &bytes[self.cursor.position() as usize..]
    }
}

fn truncated(_: io::Error) -> FilterError {
    FilterError::MalformedAttribute("truncated header".to_string())
}

/// Encoder/decoder for the filter attributes exchanged between servers
#[derive(Clone, Copy, Debug, Default)]
pub struct AttributeCodec;

impl AttributeCodec {
    /// Encode a base attribute
    pub fn encode_base(sqn: u64, base: &FilterBase<'_>) -> Result<Vec<u8>, FilterError> {
        let (family, num_hashes, num_bits, buffer): (i16, i16, i32, &[u8]) = match base.hash_family {
            None => (0, 0, 0, &[]),
            Some(family) => {
                let num_bits = i32::try_from(base.num_bits).map_err(|_| {
                    FilterError::InvalidParameters(format!(
                        "{} bins do not fit the wire format",
                        base.num_bits
                    ))
                })?;
                (family.id() as i16, i16::from(base.num_hashes), num_bits, base.buffer)
            }
        };

        let mut out = Vec::with_capacity(BASE_HEADER_LEN + buffer.len());
        out.extend_from_slice(&sqn.to_be_bytes());
        out.extend_from_slice(&family.to_be_bytes());
        out.extend_from_slice(&num_hashes.to_be_bytes());
        out.extend_from_slice(&num_bits.to_be_bytes());
        out.extend_from_slice(buffer);
        Ok(out)
    }

    /// Decode and validate a base attribute
    pub fn decode_base(bytes: &[u8]) -> Result<BaseAttribute, FilterError> {
        let mut reader = AttributeReader::new(bytes);
        let sqn = reader.read_u64_be().map_err(truncated)?;
        let family = reader.read_i16_be().map_err(truncated)?;
        let num_hashes = reader.read_i16_be().map_err(truncated)?;
        let num_bits = reader.read_i32_be().map_err(truncated)?;

        if family == 0 {
            if reader.remaining() != 0 {
                return Err(FilterError::MalformedAttribute(format!(
                    "withdrawn filter carries {} trailing bytes",
                    reader.remaining()
                )));
            }
            return Ok(BaseAttribute {
                sqn,
                hash_family: None,
                num_hashes: 0,
                num_bits: 0,
                buffer: Vec::new(),
            });
        }

        let hash_family = u16::try_from(family)
            .map_err(|_| FilterError::UnknownHashFamily(family as u16))
            .and_then(HashFamily::try_from)?;
        let num_hashes = u8::try_from(num_hashes)
            .ok()
            .filter(|&k| k > 0)
            .ok_or_else(|| {
                FilterError::MalformedAttribute(format!("num_hashes {} out of range", num_hashes))
            })?;
        let num_bits = u64::try_from(num_bits)
            .ok()
            .filter(|&m| m > 0)
            .ok_or_else(|| {
                FilterError::MalformedAttribute(format!("num_bits {} out of range", num_bits))
            })?;

        let expected = bytes_for_bits(num_bits);
        if reader.remaining() != expected {
            return Err(FilterError::InvalidBufferLength {
                expected,
                actual: reader.remaining(),
            });
        }

        Ok(BaseAttribute {
            sqn,
            hash_family: Some(hash_family),
            num_hashes,
            num_bits,
            buffer: reader.rest().to_vec(),
        })
    }

    /// Encode an update attribute
    pub fn encode_update(sqn: u64, deltas: &[i32]) -> Result<Vec<u8>, FilterError> {
        let count = i32::try_from(deltas.len()).map_err(|_| {
            FilterError::InvalidParameters(format!("{} deltas in one update", deltas.len()))
        })?;

        let mut out = Vec::with_capacity(UPDATE_HEADER_LEN + 4 * deltas.len());
        out.extend_from_slice(&sqn.to_be_bytes());
        out.extend_from_slice(&count.to_be_bytes());
        for delta in deltas {
            out.extend_from_slice(&delta.to_be_bytes());
        }
        Ok(out)
    }

    /// Decode and validate an update attribute
    pub fn decode_update(bytes: &[u8]) -> Result<UpdateAttribute, FilterError> {
        let mut reader = AttributeReader::new(bytes);
        let sqn = reader.read_u64_be().map_err(truncated)?;
        let count = reader.read_i32_be().map_err(truncated)?;

        let count = usize::try_from(count).map_err(|_| {
            FilterError::MalformedAttribute(format!("negative delta count {}", count))
        })?;
        if reader.remaining() != count.saturating_mul(4) {
            return Err(FilterError::MalformedAttribute(format!(
                "{} deltas need {} bytes, got {}",
                count,
                count.saturating_mul(4),
                reader.remaining()
            )));
        }

        let deltas = (0..count)
            .map(|_| reader.read_i32_be())
            .collect::<io::Result<Vec<_>>>()
            .map_err(truncated)?;

        Ok(UpdateAttribute { sqn, deltas })
    }
}
