//! Ordered key-value engine adapter.
//!
//! Buckets only need three things from the store underneath them: bounded
//! ordered iteration, atomic multi-key batches (including range deletes) and
//! point reads for metadata. [`Engine`] captures exactly that, and
//! [`RedbEngine`] provides it on top of a single redb table.

pub mod redb_engine;

pub use redb_engine::RedbEngine;

use crate::Result;

/// Trait for the ordered engine that backs buckets.
///
/// Keys compare byte-wise. Lower bounds are inclusive, upper bounds exclusive.
pub trait Engine: Send + Sync {
    /// Visits every entry in `[lower, upper)` in ascending key order.
    ///
    /// The slices handed to `visit` are only valid for the duration of the
    /// call; callers copy what they keep. An error from `visit` stops the scan
    /// and is returned as is.
    fn scan(
        &self,
        lower: &[u8],
        upper: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>,
    ) -> Result<()>;

    /// Returns the greatest key in `[lower, upper)`, if any.
    fn last_key(&self, lower: &[u8], upper: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Reads a single key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Applies every operation in `batch` as one indivisible unit.
    fn apply(&self, batch: WriteBatch) -> Result<()>;
}

/// A single staged mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Set(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
    /// Deletes every key in `[lower, upper)`.
    DeleteRange(Vec<u8>, Vec<u8>),
}

/// Ordered mutation buffer applied atomically by [`Engine::apply`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
    sync: bool,
}

impl WriteBatch {
    /// Creates an empty batch. `sync` requests a durable (fsynced) commit.
    pub fn new(sync: bool) -> Self {
        Self {
            ops: Vec::new(),
            sync,
        }
    }

    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Set(key, value));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(BatchOp::Delete(key));
    }

    pub fn delete_range(&mut self, lower: Vec<u8>, upper: Vec<u8>) {
        self.ops.push(BatchOp::DeleteRange(lower, upper));
    }

    /// Whether the batch must be durable once applied.
    pub fn sync(&self) -> bool {
        self.sync
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}
