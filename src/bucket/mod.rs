//! Bucket runtime.
//!
//! A [`Bucket`] is the live handle to one bucket: an ordered append log of
//! indexed values plus a metadata record holding the last access hour and the
//! bucket key. All value records share the bucket's key prefix, so reads and
//! deletes are bounded range operations on the engine.
//!
//! Every operation ends with a timestamp refresh. The refresh only writes when
//! the hour changed, and for mutating operations it rides in the same atomic
//! batch as the values.

pub mod clock;
pub mod index;
pub mod metadata;

pub use clock::{Clock, ManualClock, SystemClock};
pub use index::LastIndex;
pub use metadata::{BucketMetadata, Touch};

use crate::encoding::key::{
    decode_value_index, encode_meta_key, encode_value_key, value_range_bounds, value_space_bounds,
};
use crate::encoding::MAX_INDEX;
use crate::engine::{Engine, WriteBatch};
use crate::error::{Error, Result};
use crate::identity::{BucketId, BucketKey, BucketPermissions};
use crate::store::StoreConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Upper bound on the capacity reserved up front for a read.
const MAX_READ_PREALLOCATION: usize = 2048;

/// One slot of a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketValue {
    /// Slot index; 0 on input asks for the next free index.
    pub index: u16,
    pub value: Vec<u8>,
}

impl BucketValue {
    pub fn new(index: u16, value: impl Into<Vec<u8>>) -> Self {
        Self {
            index,
            value: value.into(),
        }
    }

    /// A value to be stored at the next free index.
    pub fn next(value: impl Into<Vec<u8>>) -> Self {
        Self::new(0, value)
    }
}

/// Half-open index range `[start, end)`.
///
/// An `end` of [`MAX_INDEX`] covers every index from `start` on, 65535
/// included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketRange {
    pub start: u16,
    pub end: u16,
}

impl BucketRange {
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    /// Every index of a bucket.
    pub fn all() -> Self {
        Self::new(0, MAX_INDEX)
    }

    pub fn is_empty(&self) -> bool {
        self.end != MAX_INDEX && self.start >= self.end
    }

    pub fn contains(&self, index: u16) -> bool {
        self.start <= index && (index < self.end || self.end == MAX_INDEX)
    }

    /// Number of indices covered by the range.
    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else if self.end == MAX_INDEX {
            usize::from(MAX_INDEX - self.start) + 1
        } else {
            usize::from(self.end - self.start)
        }
    }
}

/// Live handle to a single bucket.
///
/// Shared between threads behind an `Arc`; all operations take `&self`.
/// Once the bucket is deleted through its store, every operation fails with
/// [`Error::BucketNotFound`].
pub struct Bucket<E: Engine> {
    id: BucketId,
    metadata: BucketMetadata,
    last_index: LastIndex,
    deleted: AtomicBool,
    engine: Arc<E>,
    config: StoreConfig,
}

impl<E: Engine> Bucket<E> {
    /// Builds the runtime for a bucket whose metadata was just loaded.
    ///
    /// The cached last index is recovered from the value table.
    pub fn load(
        id: BucketId,
        metadata: BucketMetadata,
        engine: Arc<E>,
        config: StoreConfig,
    ) -> Result<Self> {
        let last_index = fetch_last_index(engine.as_ref(), &id)?;
        debug!(bucket = ?id, last_index, "loaded bucket");
        Ok(Self::with_last_index(id, metadata, engine, config, last_index))
    }

    pub(crate) fn with_last_index(
        id: BucketId,
        metadata: BucketMetadata,
        engine: Arc<E>,
        config: StoreConfig,
        last_index: u16,
    ) -> Self {
        Self {
            id,
            metadata,
            last_index: LastIndex::new(last_index),
            deleted: AtomicBool::new(false),
            engine,
            config,
        }
    }

    pub fn id(&self) -> &BucketId {
        &self.id
    }

    pub fn key(&self) -> &BucketKey {
        self.metadata.key()
    }

    /// Lifetime class from the identifier; 0 means infinite.
    pub fn lifetime(&self) -> u8 {
        self.id.lifetime()
    }

    /// Last access, in hours since the Unix epoch.
    pub fn last_access(&self) -> u32 {
        self.metadata.timestamp()
    }

    /// Highest index allocated or written so far.
    pub fn last_index(&self) -> u16 {
        self.last_index.get()
    }

    /// Whether the bucket was deleted while this handle was alive.
    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::SeqCst);
    }

    /// Permissions for a caller, authorized iff it presents the bucket key.
    pub fn permissions(&self, presented_key: Option<&BucketKey>) -> BucketPermissions {
        let authorized = presented_key.map_or(false, |key| self.key().matches(key));
        self.id.permissions(authorized)
    }

    /// Reads the values stored in `range`, in index order.
    ///
    /// If only the timestamp refresh fails, the values are returned inside
    /// [`Error::TimestampRefresh`].
    pub fn get_values(&self, range: BucketRange) -> Result<Vec<BucketValue>> {
        self.ensure_live()?;
        let mut values = Vec::with_capacity(range.len().min(MAX_READ_PREALLOCATION));

        if !range.is_empty() {
            let (lower, upper) = value_range_bounds(&self.id, range.start, range.end);
            self.engine.scan(&lower, &upper, &mut |key, value| {
                values.push(BucketValue {
                    index: decode_value_index(key)?,
                    value: value.to_vec(),
                });
                Ok(())
            })?;
        }

        let mut batch = WriteBatch::new(self.config.sync_writes);
        let touch = self.stage_refresh(&mut batch);
        if let Err(err) = self.commit(batch, touch) {
            return Err(Error::TimestampRefresh {
                values,
                reason: Box::new(err),
            });
        }

        Ok(values)
    }

    /// Writes values by index.
    ///
    /// Index 0 stores at the next free index; an empty value deletes the slot.
    /// Nothing is written if any allocation fails, but indices claimed for
    /// earlier values of the same call stay claimed.
    pub fn put_values(&self, values: Vec<BucketValue>) -> Result<()> {
        self.ensure_live()?;
        let mut batch = WriteBatch::new(self.config.sync_writes);
        for value in values {
            let index = if value.index == 0 {
                self.allocate()?
            } else {
                self.last_index.advance_to(value.index);
                value.index
            };

            let key = encode_value_key(&self.id, index);
            if value.value.is_empty() {
                batch.delete(key);
            } else {
                batch.set(key, value.value);
            }
        }

        let touch = self.stage_refresh(&mut batch);
        self.commit(batch, touch)
    }

    /// Appends values to the end of the bucket.
    ///
    /// A non-zero index must be exactly one past the last index, otherwise the
    /// call fails with [`Error::InvalidAppend`]. Empty values are stored, not
    /// treated as deletes.
    pub fn append_values(&self, values: Vec<BucketValue>) -> Result<()> {
        self.ensure_live()?;
        let mut batch = WriteBatch::new(self.config.sync_writes);
        for value in values {
            let index = if value.index == 0 {
                self.allocate()?
            } else {
                if let Err(err) = self.last_index.claim(value.index) {
                    debug!(bucket = ?self.id, index = value.index, "rejected append: {}", err);
                    return Err(err);
                }
                value.index
            };

            batch.set(encode_value_key(&self.id, index), value.value);
        }

        let touch = self.stage_refresh(&mut batch);
        self.commit(batch, touch)
    }

    /// Deletes every value in `range`.
    ///
    /// When the cached last index falls inside the range it is recovered from
    /// storage afterwards, unless a concurrent writer moved it first.
    pub fn delete_values(&self, range: BucketRange) -> Result<()> {
        self.ensure_live()?;
        let mut batch = WriteBatch::new(self.config.sync_writes);
        if !range.is_empty() {
            let (lower, upper) = value_range_bounds(&self.id, range.start, range.end);
            batch.delete_range(lower, upper);
        }

        let touch = self.stage_refresh(&mut batch);
        self.commit(batch, touch)?;

        let observed = self.last_index.get();
        if observed != 0 && range.contains(observed) {
            let actual = fetch_last_index(self.engine.as_ref(), &self.id)?;
            if self.last_index.reconcile(observed, actual) {
                debug!(bucket = ?self.id, from = observed, to = actual, "reconciled last index");
            }
        }

        Ok(())
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_deleted() {
            return Err(Error::BucketNotFound);
        }
        Ok(())
    }

    fn allocate(&self) -> Result<u16> {
        self.last_index.allocate().map_err(|err| {
            warn!(bucket = ?self.id, "bucket is full");
            err
        })
    }

    /// Stages a metadata write if the access hour changed.
    fn stage_refresh(&self, batch: &mut WriteBatch) -> Option<Touch> {
        let touch = self.metadata.touch(self.config.clock.now_hours())?;
        batch.set(encode_meta_key(&self.id), self.metadata.encode());
        Some(touch)
    }

    fn commit(&self, batch: WriteBatch, touch: Option<Touch>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let result = self.engine.apply(batch);
        if let (Err(_), Some(touch)) = (&result, touch) {
            self.metadata.untouch(touch);
        }
        result
    }
}

/// Recovers the highest stored index of a bucket, 0 if it holds no values.
pub(crate) fn fetch_last_index<E: Engine + ?Sized>(engine: &E, id: &BucketId) -> Result<u16> {
    let (lower, upper) = value_space_bounds(id);
    match engine.last_key(&lower, &upper)? {
        Some(key) => decode_value_index(&key),
        None => Ok(0),
    }
}
