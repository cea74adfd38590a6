//! Key encoding and decoding for bucket storage.
//!
//! All bucket records live in one ordered keyspace. Two record families are
//! separated by a leading tag byte:
//!
//! Meta key:  [META_TAG][bucket_id]
//! Value key: [VALUE_TAG][bucket_id][index (u16, big-endian)]
//!
//! The index is fixed-width big-endian so value keys of one bucket sort by
//! numeric index, which turns engine range scans and range deletes into
//! integer-range operations.

use crate::error::{Error, Result};
use crate::identity::{BucketId, BUCKET_ID_LENGTH};

/// Tag byte for bucket metadata records.
pub const META_TAG: u8 = 0x01;

/// Tag byte for bucket value records.
pub const VALUE_TAG: u8 = 0x02;

/// Highest index a bucket can hold.
///
/// As a range end it stands for "every index", 65535 included.
pub const MAX_INDEX: u16 = u16::MAX;

/// Length of an encoded meta key.
pub const META_KEY_LENGTH: usize = 1 + BUCKET_ID_LENGTH;

/// Length of an encoded value key.
pub const VALUE_KEY_LENGTH: usize = 1 + BUCKET_ID_LENGTH + 2;

/// Encodes the metadata key of a bucket: [META_TAG][bucket_id]
pub fn encode_meta_key(id: &BucketId) -> Vec<u8> {
    let mut buf = Vec::with_capacity(META_KEY_LENGTH);
    buf.push(META_TAG);
    buf.extend_from_slice(id.as_bytes());
    buf
}

/// Encodes a value key: [VALUE_TAG][bucket_id][index]
pub fn encode_value_key(id: &BucketId, index: u16) -> Vec<u8> {
    let mut buf = Vec::with_capacity(VALUE_KEY_LENGTH + 1);
    buf.push(VALUE_TAG);
    buf.extend_from_slice(id.as_bytes());
    buf.extend_from_slice(&index.to_be_bytes());
    buf
}

/// Exclusive upper bound just past the last possible value key of a bucket.
///
/// The value key of index 65535 with a trailing zero byte sorts after every
/// value key of the bucket and before anything belonging to the next one.
fn value_space_end(id: &BucketId) -> Vec<u8> {
    let mut buf = encode_value_key(id, MAX_INDEX);
    buf.push(0);
    buf
}

/// Builds `[lower, upper)` engine bounds for the index range `[start, end)`.
///
/// An `end` of [`MAX_INDEX`] covers every index from `start` on.
pub fn value_range_bounds(id: &BucketId, start: u16, end: u16) -> (Vec<u8>, Vec<u8>) {
    let lower = encode_value_key(id, start);
    let upper = if end == MAX_INDEX {
        value_space_end(id)
    } else {
        encode_value_key(id, end)
    };
    (lower, upper)
}

/// Builds engine bounds covering every value key of a bucket.
pub fn value_space_bounds(id: &BucketId) -> (Vec<u8>, Vec<u8>) {
    value_range_bounds(id, 0, MAX_INDEX)
}

/// Builds engine bounds covering every metadata record.
pub fn meta_space_bounds() -> (Vec<u8>, Vec<u8>) {
    (vec![META_TAG], vec![META_TAG + 1])
}

/// Extracts the index from an encoded value key.
pub fn decode_value_index(encoded_key: &[u8]) -> Result<u16> {
    if encoded_key.len() != VALUE_KEY_LENGTH || encoded_key[0] != VALUE_TAG {
        return Err(Error::InvalidKey(format!(
            "expected {}-byte value key, got {} bytes",
            VALUE_KEY_LENGTH,
            encoded_key.len()
        )));
    }

    let index_bytes = &encoded_key[1 + BUCKET_ID_LENGTH..];
    Ok(u16::from_be_bytes([index_bytes[0], index_bytes[1]]))
}

/// Extracts the bucket identifier from an encoded meta key.
pub fn decode_meta_key(encoded_key: &[u8]) -> Result<BucketId> {
    if encoded_key.len() != META_KEY_LENGTH || encoded_key[0] != META_TAG {
        return Err(Error::InvalidKey(format!(
            "expected {}-byte meta key, got {} bytes",
            META_KEY_LENGTH,
            encoded_key.len()
        )));
    }

    BucketId::from_slice(&encoded_key[1..])
        .ok_or_else(|| Error::InvalidKey("meta key identifier length".to_string()))
}
