//! In-memory filter publisher
//!
//! Encodes every publication with [`AttributeCodec`] and keeps the bytes, so
//! tests and embedders can feed them into a [`RemoteFilterView`] on the
//! receiving side.
//!
//! [`RemoteFilterView`]: crate::service::RemoteFilterView

use parking_lot::Mutex;

use super::attribute_codec::AttributeCodec;
use crate::error::FilterError;
use crate::ports::{FilterBase, FilterPublisher};

/// One encoded publication
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublishedAttribute {
    Base(Vec<u8>),
    Update(Vec<u8>),
}

#[derive(Default)]
struct PublisherState {
    next_sqn: u64,
    updates_since_base: usize,
    published: Vec<PublishedAttribute>,
    fail_next: bool,
}

/// Publisher that records encoded attributes in memory
#[derive(Default)]
pub struct InMemoryFilterPublisher {
    state: Mutex<PublisherState>,
}

impl InMemoryFilterPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything published so far, oldest first
    pub fn take_published(&self) -> Vec<PublishedAttribute> {
        std::mem::take(&mut self.state.lock().published)
    }

    /// Make the next publication fail (for exercising error paths)
    pub fn fail_next(&self) {
        self.state.lock().fail_next = true;
    }

    fn next_sqn(state: &mut PublisherState) -> Result<u64, FilterError> {
        if std::mem::take(&mut state.fail_next) {
            return Err(FilterError::PublishFailed("injected failure".to_string()));
        }
        state.next_sqn += 1;
        Ok(state.next_sqn)
    }
}

impl FilterPublisher for InMemoryFilterPublisher {
    fn publish_base(&self, base: &FilterBase<'_>) -> Result<u64, FilterError> {
        let mut state = self.state.lock();
        let sqn = Self::next_sqn(&mut state)?;
        let bytes = AttributeCodec::encode_base(sqn, base)?;
        state.published.push(PublishedAttribute::Base(bytes));
        state.updates_since_base = 0;
        Ok(sqn)
    }

    fn publish_update(&self, deltas: &[i32]) -> Result<u64, FilterError> {
        let mut state = self.state.lock();
        let sqn = Self::next_sqn(&mut state)?;
        let bytes = AttributeCodec::encode_update(sqn, deltas)?;
        state.published.push(PublishedAttribute::Update(bytes));
        state.updates_since_base += 1;
        Ok(sqn)
    }

    fn num_updates(&self) -> usize {
        self.state.lock().updates_since_base
    }
}
