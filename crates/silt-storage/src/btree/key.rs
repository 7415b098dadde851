//! Fixed-width index keys and comparators.

use std::cmp::Ordering;

/// Width of an index key in bytes.
pub const KEY_SIZE: usize = 8;

/// A fixed-width index key.
///
/// The tree never interprets key bytes itself; all ordering goes through
/// the comparator injected at tree construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexKey(pub [u8; KEY_SIZE]);

impl IndexKey {
    /// The all-zero key, used to fill placeholder slots.
    pub const ZERO: IndexKey = IndexKey([0u8; KEY_SIZE]);

    /// Creates a key from a signed 64-bit integer.
    pub fn from_i64(value: i64) -> Self {
        Self(value.to_be_bytes())
    }

    /// Interprets the key as a signed 64-bit integer.
    pub fn to_i64(&self) -> i64 {
        i64::from_be_bytes(self.0)
    }

    /// Returns the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Copies a key out of a byte slice.
    pub fn from_bytes(buf: &[u8]) -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&buf[..KEY_SIZE]);
        Self(bytes)
    }
}

/// Key ordering injected into the B+ tree by its caller.
pub trait KeyComparator: Send + Sync {
    /// Compares two keys.
    fn compare(&self, a: &IndexKey, b: &IndexKey) -> Ordering;
}

/// Compares keys as signed 64-bit integers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Int64Comparator;

impl KeyComparator for Int64Comparator {
    fn compare(&self, a: &IndexKey, b: &IndexKey) -> Ordering {
        a.to_i64().cmp(&b.to_i64())
    }
}

/// Compares keys lexicographically by their raw bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl KeyComparator for BytewiseComparator {
    fn compare(&self, a: &IndexKey, b: &IndexKey) -> Ordering {
        a.0.cmp(&b.0)
    }
}
