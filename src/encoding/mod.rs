//! Key and record encoding for bucket storage.
//!
//! This module handles the binary format for engine keys and the metadata
//! record, providing a stable on-disk layout for buckets.

pub mod key;
pub mod metadata;

pub use key::{MAX_INDEX, META_TAG, VALUE_TAG};
pub use metadata::METADATA_LENGTH;
