//! Metadata record encoding: [timestamp (u32, big-endian)][bucket_key]

use crate::error::{Error, Result};
use crate::identity::{BucketKey, BUCKET_KEY_LENGTH};

/// Length of an encoded metadata record.
pub const METADATA_LENGTH: usize = 4 + BUCKET_KEY_LENGTH;

/// Encodes a metadata record from an hour timestamp and the bucket key.
pub fn encode_metadata(timestamp: u32, key: &BucketKey) -> Vec<u8> {
    let mut buf = Vec::with_capacity(METADATA_LENGTH);
    buf.extend_from_slice(&timestamp.to_be_bytes());
    buf.extend_from_slice(key.as_bytes());
    buf
}

/// Decodes a metadata record into its timestamp and bucket key.
pub fn decode_metadata(encoded: &[u8]) -> Result<(u32, BucketKey)> {
    if encoded.len() != METADATA_LENGTH {
        return Err(Error::InvalidMetadata(format!(
            "expected {} bytes, got {}",
            METADATA_LENGTH,
            encoded.len()
        )));
    }

    let timestamp = u32::from_be_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]);
    let key = BucketKey::from_slice(&encoded[4..])
        .ok_or_else(|| Error::InvalidMetadata("bucket key length".to_string()))?;
    Ok((timestamp, key))
}
