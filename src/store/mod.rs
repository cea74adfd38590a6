//! Bucket store.
//!
//! The store owns the shared engine handle and a registry of live bucket
//! runtimes. Handing out one runtime per bucket is what makes the cached last
//! index meaningful: every caller of a bucket goes through the same counter.

pub mod config;

pub use config::StoreConfig;

use crate::bucket::{Bucket, BucketMetadata};
use crate::encoding::key::{decode_meta_key, encode_meta_key, meta_space_bounds, value_space_bounds};
use crate::encoding::metadata::decode_metadata;
use crate::engine::{Engine, RedbEngine, WriteBatch};
use crate::error::{Error, Result};
use crate::identity::{BucketId, BucketKey};
use redb::Database;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Entry point for creating, opening and deleting buckets.
pub struct BucketStore<E: Engine = RedbEngine> {
    engine: Arc<E>,
    config: StoreConfig,
    registry: Mutex<Registry<E>>,
}

struct Registry<E: Engine> {
    buckets: HashMap<BucketId, Arc<Bucket<E>>>,
    /// Bumped by every delete; a load that raced one is thrown away.
    deletes: u64,
}

impl BucketStore<RedbEngine> {
    /// Opens a store on a redb database, creating the bucket table if needed.
    pub fn open(db: Database, config: StoreConfig) -> Result<Self> {
        let engine = RedbEngine::new(db, config.table_name.clone())?;
        Ok(Self::with_engine(Arc::new(engine), config))
    }
}

impl<E: Engine> BucketStore<E> {
    /// Creates a store on an existing engine handle.
    pub fn with_engine(engine: Arc<E>, config: StoreConfig) -> Self {
        Self {
            engine,
            config,
            registry: Mutex::new(Registry {
                buckets: HashMap::new(),
                deletes: 0,
            }),
        }
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Creates an empty bucket.
    ///
    /// Fails with [`Error::BucketExists`] if the identifier is already taken.
    /// The registry stays locked from the existence check to the insert so two
    /// creators of one identifier cannot both succeed.
    pub fn create_bucket(&self, id: BucketId, key: BucketKey) -> Result<Arc<Bucket<E>>> {
        let mut registry = self.registry();
        let meta_key = encode_meta_key(&id);
        if registry.buckets.contains_key(&id) || self.engine.get(&meta_key)?.is_some() {
            return Err(Error::BucketExists);
        }

        let metadata = BucketMetadata::new(self.config.clock.now_hours(), key);
        let mut batch = WriteBatch::new(self.config.sync_writes);
        batch.set(meta_key, metadata.encode());
        self.engine.apply(batch)?;

        let bucket = Arc::new(Bucket::with_last_index(
            id,
            metadata,
            Arc::clone(&self.engine),
            self.config.clone(),
            0,
        ));
        registry.buckets.insert(id, Arc::clone(&bucket));
        debug!(bucket = ?id, lifetime = id.lifetime(), "created bucket");

        Ok(bucket)
    }

    /// Returns the runtime of an existing bucket, loading it on first use.
    ///
    /// Loading reads the engine without holding the registry lock. When two
    /// callers load the same bucket, the first to register wins and both get
    /// its runtime.
    pub fn bucket(&self, id: &BucketId) -> Result<Arc<Bucket<E>>> {
        loop {
            let deletes = {
                let registry = self.registry();
                if let Some(bucket) = registry.buckets.get(id) {
                    return Ok(Arc::clone(bucket));
                }
                registry.deletes
            };

            let bucket = self.load(id)?;

            let mut registry = self.registry();
            if registry.deletes != deletes {
                debug!(bucket = ?id, "delete raced bucket load, retrying");
                continue;
            }
            let bucket = registry.buckets.entry(*id).or_insert(bucket);
            return Ok(Arc::clone(bucket));
        }
    }

    /// Deletes a bucket with all of its values in one batch.
    ///
    /// A runtime handed out earlier is retired first: every later operation
    /// on it fails with [`Error::BucketNotFound`], even if the identifier is
    /// created again.
    pub fn delete_bucket(&self, id: &BucketId) -> Result<()> {
        let mut registry = self.registry();
        let meta_key = encode_meta_key(id);
        if !registry.buckets.contains_key(id) && self.engine.get(&meta_key)?.is_none() {
            return Err(Error::BucketNotFound);
        }

        registry.deletes += 1;
        if let Some(bucket) = registry.buckets.remove(id) {
            bucket.mark_deleted();
        }

        let (lower, upper) = value_space_bounds(id);
        let mut batch = WriteBatch::new(self.config.sync_writes);
        batch.delete_range(lower, upper);
        batch.delete(meta_key);
        self.engine.apply(batch)?;

        debug!(bucket = ?id, "deleted bucket");
        Ok(())
    }

    /// Lists every stored bucket with its persisted last access hour.
    ///
    /// Together with [`BucketId::lifetime`] this is what an expiry sweep needs.
    pub fn buckets(&self) -> Result<Vec<(BucketId, u32)>> {
        let (lower, upper) = meta_space_bounds();
        let mut listed = Vec::new();
        self.engine.scan(&lower, &upper, &mut |key, value| {
            let id = decode_meta_key(key)?;
            let (timestamp, _) = decode_metadata(value)?;
            listed.push((id, timestamp));
            Ok(())
        })?;
        Ok(listed)
    }

    fn load(&self, id: &BucketId) -> Result<Arc<Bucket<E>>> {
        let encoded = self
            .engine
            .get(&encode_meta_key(id))?
            .ok_or(Error::BucketNotFound)?;
        let metadata = BucketMetadata::decode(&encoded)?;
        let bucket = Bucket::load(*id, metadata, Arc::clone(&self.engine), self.config.clone())?;
        Ok(Arc::new(bucket))
    }

    fn registry(&self) -> MutexGuard<'_, Registry<E>> {
        self.registry.lock().unwrap_or_else(|err| err.into_inner())
    }
}
