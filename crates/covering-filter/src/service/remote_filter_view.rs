//! Remote Filter View
//!
//! The receiving side of covering filter publication: rebuilds a peer's
//! Bloom filter from its base attribute and keeps it current by applying the
//! update attributes in sequence order.

use tracing::debug;

use crate::adapters::{AttributeCodec, BaseAttribute, PublishedAttribute, UpdateAttribute};
use crate::domain::{AsmParams, BloomFilter};
use crate::error::FilterError;

/// A peer's covering filter as seen locally
#[derive(Debug, Default)]
pub struct RemoteFilterView {
    filter: Option<BloomFilter>,
    last_sqn: Option<u64>,
}

impl RemoteFilterView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a base. Returns `false` if it is older than what was already
    /// applied.
    pub fn apply_base(&mut self, base: &BaseAttribute) -> Result<bool, FilterError> {
        if self.is_stale(base.sqn) {
            debug!(sqn = base.sqn, "[RemoteFilterView] Ignoring stale base");
            return Ok(false);
        }

        match base.hash_family {
            None => self.filter = None,
            Some(family) => match self.filter.as_mut() {
                Some(filter) => {
                    filter.set_content(base.num_bits, base.num_hashes, family, &base.buffer)?
                }
                None => {
                    let params = AsmParams::new(base.num_bits, base.num_hashes, family)?;
                    self.filter = Some(BloomFilter::from_buffer(params, &base.buffer)?);
                }
            },
        }

        self.last_sqn = Some(base.sqn);
        Ok(true)
    }

    /// Apply an update on top of the current base.
    ///
    /// Stale updates are ignored (`Ok(false)`); a missing sequence number is
    /// reported as [`FilterError::SequenceGap`] and the peer should be asked
    /// for a new base.
    pub fn apply_update(&mut self, update: &UpdateAttribute) -> Result<bool, FilterError> {
        let last = match (self.filter.as_ref(), self.last_sqn) {
            (Some(_), Some(last)) => last,
            _ => return Err(FilterError::NoBaseFilter),
        };

        if update.sqn <= last {
            debug!(sqn = update.sqn, "[RemoteFilterView] Ignoring stale update");
            return Ok(false);
        }
        if update.sqn != last + 1 {
            return Err(FilterError::SequenceGap {
                expected: last + 1,
                received: update.sqn,
            });
        }

        if let Some(filter) = self.filter.as_mut() {
            filter.apply_updates(&update.deltas)?;
        }
        self.last_sqn = Some(update.sqn);
        Ok(true)
    }

    /// Decode an encoded attribute and apply it
    pub fn apply(&mut self, attribute: &PublishedAttribute) -> Result<bool, FilterError> {
        match attribute {
            PublishedAttribute::Base(bytes) => self.apply_base(&AttributeCodec::decode_base(bytes)?),
            PublishedAttribute::Update(bytes) => {
                self.apply_update(&AttributeCodec::decode_update(bytes)?)
            }
        }
    }

    /// Whether the peer's filter covers `topic`; false with no filter
    pub fn covers(&self, topic: &str) -> bool {
        self.filter
            .as_ref()
            .is_some_and(|filter| filter.contains(topic.as_bytes()))
    }

    pub fn filter(&self) -> Option<&BloomFilter> {
        self.filter.as_ref()
    }

    pub fn last_sqn(&self) -> Option<u64> {
        self.last_sqn
    }

    fn is_stale(&self, sqn: u64) -> bool {
        self.last_sqn.is_some_and(|last| sqn <= last)
    }
}
