//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred on the physical medium.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Authenticated decryption failed (wrong key, tampering, or a page
    /// that was never written).
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// A key of the wrong length was supplied.
    #[error("invalid key size: expected {expected} bytes, got {actual}")]
    InvalidKeySize {
        /// Required key length in bytes.
        expected: usize,
        /// Supplied key length in bytes.
        actual: usize,
    },

    /// A page buffer of the wrong length was handed to the page codec.
    #[error("invalid page size: expected {expected} bytes, got {actual}")]
    InvalidPageSize {
        /// Required length in bytes.
        expected: usize,
        /// Supplied length in bytes.
        actual: usize,
    },
}

impl StorageError {
    /// Creates a decryption error.
    pub fn decryption(message: impl Into<String>) -> Self {
        Self::Decryption(message.into())
    }

    /// Creates an encryption error.
    pub fn encryption(message: impl Into<String>) -> Self {
        Self::Encryption(message.into())
    }

    /// Returns `true` if this error is an authentication failure.
    #[must_use]
    pub fn is_decryption(&self) -> bool {
        matches!(self, Self::Decryption(_))
    }
}
