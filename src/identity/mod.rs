//! Bucket identity codec.
//!
//! A bucket identifier is a fixed 16-byte value: 14 opaque bytes, one
//! lifetime byte and one permission byte. Permissions and lifetime are read
//! straight from the identifier, so they never need a storage lookup.

use std::fmt;

/// Length of a bucket identifier in bytes.
pub const BUCKET_ID_LENGTH: usize = 16;

/// Length of a bucket key in bytes.
pub const BUCKET_KEY_LENGTH: usize = 32;

const LIFETIME_BYTE: usize = 14;
const PERMISSION_BYTE: usize = 15;

// Public bits.
const READ: u8 = 1 << 0;
const WRITE: u8 = 1 << 1;
const APPEND: u8 = 1 << 2;
// Extra bits granted to holders of the bucket key.
const PROTECTED_READ: u8 = 1 << 3;
const PROTECTED_WRITE: u8 = 1 << 4;
const PROTECTED_APPEND: u8 = 1 << 5;

/// Unique identifier of a bucket.
///
/// Ordering and equality are byte-wise, which is also the order the
/// identifier takes as an engine key prefix.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketId([u8; BUCKET_ID_LENGTH]);

impl BucketId {
    /// Wraps raw identifier bytes.
    pub const fn new(bytes: [u8; BUCKET_ID_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Builds an identifier from opaque identity bytes, a lifetime class and
    /// a permission bitmap.
    pub fn from_parts(identity: [u8; 14], lifetime: u8, permissions: u8) -> Self {
        let mut bytes = [0u8; BUCKET_ID_LENGTH];
        bytes[..LIFETIME_BYTE].copy_from_slice(&identity);
        bytes[LIFETIME_BYTE] = lifetime;
        bytes[PERMISSION_BYTE] = permissions;
        Self(bytes)
    }

    /// Parses an identifier from a slice, returning `None` on a length mismatch.
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        let bytes: [u8; BUCKET_ID_LENGTH] = data.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; BUCKET_ID_LENGTH] {
        &self.0
    }

    /// Lifetime class of the bucket; 0 means the bucket never expires.
    pub fn lifetime(&self) -> u8 {
        self.0[LIFETIME_BYTE]
    }

    /// Permissions granted to a caller.
    ///
    /// `authorized` is true when the caller presented the bucket key; the
    /// protected bits are then OR-ed onto the public ones. Users that can
    /// write can always append.
    pub fn permissions(&self, authorized: bool) -> BucketPermissions {
        let bits = self.0[PERMISSION_BYTE];
        if authorized {
            BucketPermissions {
                read: bits & (READ | PROTECTED_READ) != 0,
                write: bits & (WRITE | PROTECTED_WRITE) != 0,
                append: bits & (WRITE | APPEND | PROTECTED_APPEND) != 0,
            }
        } else {
            BucketPermissions {
                read: bits & READ != 0,
                write: bits & WRITE != 0,
                append: bits & APPEND != 0,
            }
        }
    }
}

impl fmt::Debug for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BucketId(")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

/// Secret that grants protected access to a bucket.
///
/// Stored next to the bucket metadata and never derived from the identifier.
#[derive(Clone, PartialEq, Eq)]
pub struct BucketKey([u8; BUCKET_KEY_LENGTH]);

impl BucketKey {
    /// Wraps raw key bytes.
    pub const fn new(bytes: [u8; BUCKET_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parses a key from a slice, returning `None` on a length mismatch.
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        let bytes: [u8; BUCKET_KEY_LENGTH] = data.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; BUCKET_KEY_LENGTH] {
        &self.0
    }

    /// Compares two keys without exiting early on the first differing byte.
    pub fn matches(&self, other: &BucketKey) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl fmt::Debug for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BucketKey(..)")
    }
}

/// Capabilities a caller has on a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BucketPermissions {
    pub read: bool,
    pub write: bool,
    pub append: bool,
}
