//! Crate-scoped error handling for redb-buckets.
//!
//! Every public operation returns [`Result`]. Capacity and protocol errors are
//! produced by the bucket layer itself; everything the storage engine reports
//! is carried through as [`Error::Storage`] with a short context prefix.

use crate::bucket::BucketValue;
use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type exposed to users of the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The 16-bit index space of the bucket is exhausted.
    ///
    /// Never retried internally; callers recover by moving to a new bucket.
    #[error("bucket is full")]
    BucketFull,

    /// An append asserted an explicit index that is not `last + 1`.
    #[error("invalid append at index {index}: last index is {last}")]
    InvalidAppend { index: u16, last: u16 },

    /// No metadata record exists for the requested bucket.
    #[error("bucket not found")]
    BucketNotFound,

    /// A metadata record already exists for the bucket being created.
    #[error("bucket already exists")]
    BucketExists,

    /// A stored metadata record could not be decoded.
    #[error("invalid bucket metadata: {0}")]
    InvalidMetadata(String),

    /// Invalid store configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An engine key did not have the expected bucket layout.
    #[error("invalid key encoding: {0}")]
    InvalidKey(String),

    /// The read succeeded but persisting the access timestamp failed.
    ///
    /// The values read are handed back so callers may ignore the refresh.
    #[error("timestamp refresh failed: {reason}")]
    TimestampRefresh {
        values: Vec<BucketValue>,
        reason: Box<Error>,
    },

    /// Pass-through failure from the storage engine.
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Builds a storage error from any engine error with a context prefix.
    pub(crate) fn storage(context: &str, err: impl std::fmt::Display) -> Self {
        Error::Storage(format!("{}: {}", context, err))
    }
}
