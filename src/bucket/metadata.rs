//! In-memory copy of a bucket's metadata record.

use crate::encoding::metadata::{decode_metadata, encode_metadata};
use crate::error::Result;
use crate::identity::BucketKey;
use std::sync::atomic::{AtomicU32, Ordering};

/// Access timestamp and key of a bucket.
///
/// The key never changes after creation. The timestamp is only touched by
/// [`BucketMetadata::touch`], and concurrent touches resolve as last writer
/// wins.
#[derive(Debug)]
pub struct BucketMetadata {
    timestamp: AtomicU32,
    key: BucketKey,
}

/// A timestamp change that still has to reach storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Touch {
    pub now: u32,
    pub previous: u32,
}

impl BucketMetadata {
    pub fn new(timestamp: u32, key: BucketKey) -> Self {
        Self {
            timestamp: AtomicU32::new(timestamp),
            key,
        }
    }

    /// Decodes a stored metadata record.
    pub fn decode(encoded: &[u8]) -> Result<Self> {
        let (timestamp, key) = decode_metadata(encoded)?;
        Ok(Self::new(timestamp, key))
    }

    /// Encodes the record as it should be stored right now.
    pub fn encode(&self) -> Vec<u8> {
        encode_metadata(self.timestamp(), &self.key)
    }

    /// Last access, in hours since the Unix epoch.
    pub fn timestamp(&self) -> u32 {
        self.timestamp.load(Ordering::SeqCst)
    }

    pub fn key(&self) -> &BucketKey {
        &self.key
    }

    /// Moves the timestamp to `now`.
    ///
    /// Returns `None` when it already was `now`, in which case nothing needs
    /// to be written.
    pub fn touch(&self, now: u32) -> Option<Touch> {
        let previous = self.timestamp.swap(now, Ordering::SeqCst);
        (previous != now).then_some(Touch { now, previous })
    }

    /// Undoes a touch whose write never reached storage.
    pub fn untouch(&self, touch: Touch) {
        let _ = self.timestamp.compare_exchange(
            touch.now,
            touch.previous,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}
