//! Configuration for bucket stores.

use crate::bucket::{Clock, SystemClock};
use crate::error::{Error, Result};
use std::sync::Arc;

/// Configuration for a [`BucketStore`](crate::store::BucketStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Name of the redb table holding all bucket records.
    pub table_name: String,

    /// Whether every batch is committed durably.
    ///
    /// Off by default: bucket writes skip the fsync and become durable with
    /// the next durable commit of the database.
    pub sync_writes: bool,

    /// Time source for access timestamps.
    pub clock: Arc<dyn Clock>,
}

impl StoreConfig {
    /// Creates a validated configuration using the system clock.
    ///
    /// # Arguments
    /// * `table_name` - Table for bucket records (must not be empty)
    /// * `sync_writes` - Whether to fsync every batch
    pub fn new(table_name: impl Into<String>, sync_writes: bool) -> Result<Self> {
        let table_name = table_name.into();
        if table_name.is_empty() {
            return Err(Error::InvalidConfig(
                "table name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            table_name,
            sync_writes,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_name: "buckets".to_string(),
            sync_writes: false,
            clock: Arc::new(SystemClock),
        }
    }
}
