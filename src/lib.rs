pub mod bucket;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod identity;
pub mod store;

// Re-export common types for convenience
pub use bucket::{Bucket, BucketRange, BucketValue, Clock, ManualClock, SystemClock};
pub use encoding::MAX_INDEX;
pub use engine::{Engine, RedbEngine, WriteBatch};
pub use error::{Error, Result};
pub use identity::{BucketId, BucketKey, BucketPermissions};
pub use store::{BucketStore, StoreConfig};
