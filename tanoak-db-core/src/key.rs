//! Record keys
//!
//! A [`Key`] is an immutable byte sequence of length >= 1. Equality is
//! byte-wise and ordering is **unsigned lexicographic**: at the first
//! differing byte the smaller byte value ranks first, and a strict prefix
//! ranks before the longer key. This is exactly the `Ord` of `[u8]`, so the
//! tree never needs a custom comparator.
//!
//! Keys are opaque to the tree; lexicoders are the only producers.

use crate::error::{Error, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::sync::Arc;

/// An immutable, non-empty byte-sequence key.
///
/// Cheap to clone (`Arc`-backed); ordering is unsigned lexicographic.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(Arc<[u8]>);

impl Key {
    /// Create a key from bytes, rejecting empty input.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(Error::invalid_argument("key must not be empty"));
        }
        Ok(Key(bytes.into()))
    }

    /// Create a key from a slice, rejecting empty input.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Self::new(bytes.to_vec())
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Key length in bytes (always >= 1).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for slice-like ergonomics.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Three-way unsigned lexicographic comparison.
    pub fn compare(&self, other: &Key) -> Ordering {
        self.0.cmp(&other.0)
    }

    /// True when `self` sorts strictly before `other`.
    pub fn before(&self, other: &Key) -> bool {
        self < other
    }

    /// Hex rendering of the key bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parse a key from its hex rendering.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| Error::invalid_argument(format!("invalid hex key '{}': {}", s, e)))?;
        Self::new(bytes)
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Key({})", self.to_hex())
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// Keys serialize as hex strings so node JSON stays canonical and readable.
impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Key::from_hex(&s).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(bytes: &[u8]) -> Key {
        Key::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_rejects_empty() {
        assert!(Key::new(Vec::new()).is_err());
        assert!(Key::from_slice(&[]).is_err());
    }

    #[test]
    fn test_unsigned_lex_order() {
        // Prefix ranks first
        assert_eq!(key(&[1, 2, 3]).compare(&key(&[1, 2, 3, 4])), Ordering::Less);
        // First differing byte decides
        assert_eq!(key(&[1, 3, 2]).compare(&key(&[1, 2, 3])), Ordering::Greater);
        // High bytes compare unsigned
        assert_eq!(key(&[0x80]).compare(&key(&[0x7f])), Ordering::Greater);
        assert_eq!(key(&[0xff]).compare(&key(&[0x00, 0xff])), Ordering::Greater);
    }

    #[test]
    fn test_before_is_strict() {
        let k = key(&[5, 5]);
        assert!(!k.before(&k));
        assert!(key(&[5]).before(&k));
    }

    #[test]
    fn test_hex_round_trip() {
        let k = key(&[0x00, 0x01, 0xfe, 0xff]);
        assert_eq!(Key::from_hex(&k.to_hex()).unwrap(), k);
    }

    #[test]
    fn test_serde_round_trip() {
        let k = key(&[1, 2, 3]);
        let json = serde_json::to_string(&k).unwrap();
        assert_eq!(json, "\"010203\"");
        let back: Key = serde_json::from_str(&json).unwrap();
        assert_eq!(back, k);
    }
}
