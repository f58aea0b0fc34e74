//! Core type definitions for Vapor.

use std::fmt;

/// Sequence number of a committed batch.
///
/// Every non-empty batch gets the next sequence number; 0 means nothing has
/// been committed yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// Creates a new sequence number.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw sequence value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next sequence number.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

/// One materialized key/value pair as it is logged and applied.
///
/// A `None` value is a tombstone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Key bytes.
    pub key: Vec<u8>,
    /// Value bytes, or `None` for a deletion.
    pub value: Option<Vec<u8>>,
}

impl Item {
    /// Creates an item that sets `key` to `value`.
    #[must_use]
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// Creates a tombstone for `key`.
    #[must_use]
    pub fn tombstone(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    /// Returns `true` if this item deletes its key.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}
