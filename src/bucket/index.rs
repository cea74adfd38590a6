//! Cached last index of a bucket.
//!
//! The counter is the only shared mutable state of a bucket runtime. Every
//! access goes through an atomic read-modify-write with `SeqCst` ordering;
//! there is no load-then-store anywhere. The cached value is either equal to
//! the highest stored index or transiently ahead of it while a claimed index
//! waits for its batch to commit.

use crate::encoding::MAX_INDEX;
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Default)]
pub struct LastIndex(AtomicU32);

impl LastIndex {
    pub fn new(initial: u16) -> Self {
        Self(AtomicU32::new(u32::from(initial)))
    }

    /// Current cached value. Never exceeds [`MAX_INDEX`].
    pub fn get(&self) -> u16 {
        self.0.load(Ordering::SeqCst) as u16
    }

    /// Claims the next index for an auto-allocated value.
    ///
    /// Fails with [`Error::BucketFull`] instead of going past [`MAX_INDEX`];
    /// a failed claim leaves the counter untouched.
    pub fn allocate(&self) -> Result<u16> {
        let max = u32::from(MAX_INDEX);
        match self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < max).then_some(current + 1)
            }) {
            Ok(previous) => Ok((previous + 1) as u16),
            Err(_) => Err(Error::BucketFull),
        }
    }

    /// Raises the cached value to `index` if it is currently lower.
    pub fn advance_to(&self, index: u16) {
        self.0.fetch_max(u32::from(index), Ordering::SeqCst);
    }

    /// Claims an explicit append index, which must be exactly `last + 1`.
    pub fn claim(&self, index: u16) -> Result<()> {
        if index == 0 {
            return Err(Error::InvalidAppend {
                index,
                last: self.get(),
            });
        }

        self.0
            .compare_exchange(
                u32::from(index - 1),
                u32::from(index),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map(|_| ())
            .map_err(|last| Error::InvalidAppend {
                index,
                last: last as u16,
            })
    }

    /// Replaces `observed` with `actual` unless the counter moved in between.
    ///
    /// Returns whether the swap happened.
    pub fn reconcile(&self, observed: u16, actual: u16) -> bool {
        self.0
            .compare_exchange(
                u32::from(observed),
                u32::from(actual),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }
}
