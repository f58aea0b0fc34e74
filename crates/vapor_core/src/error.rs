//! Error types for Vapor core.

use std::io;
use thiserror::Error;
use vapor_storage::StorageError;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Vapor core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration is missing a required field or holds an invalid value.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Storage backend error other than decryption.
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// A page or log record failed authentication.
    ///
    /// Raised for a wrong key as well as for tampered or corrupted bytes.
    #[error("decryption failed: {message}")]
    DecryptionFailed {
        /// Description of the failure.
        message: String,
    },

    /// The merge operator refused to combine the operands for a key.
    #[error("merge failed for key {key:?}")]
    MergeFailed {
        /// The key whose merge failed.
        key: Vec<u8>,
    },

    /// A log record or decoded batch is structurally invalid.
    #[error("malformed record: {message}")]
    MalformedRecord {
        /// Description of the problem.
        message: String,
    },

    /// Checksum mismatch detected.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    /// Another handle holds the store directory lock.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// The store has been closed.
    #[error("store is closed")]
    StoreClosed,

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Decryption(message) => Self::DecryptionFailed { message },
            StorageError::Io(err) => Self::Io(err),
            other => Self::Storage(other),
        }
    }
}

impl CoreError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a decryption failed error.
    pub fn decryption_failed(message: impl Into<String>) -> Self {
        Self::DecryptionFailed {
            message: message.into(),
        }
    }

    /// Creates a merge failed error.
    pub fn merge_failed(key: &[u8]) -> Self {
        Self::MergeFailed { key: key.to_vec() }
    }

    /// Creates a malformed record error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns `true` if this error means the key is wrong or data was tampered with.
    #[must_use]
    pub fn is_decryption_failed(&self) -> bool {
        matches!(self, Self::DecryptionFailed { .. })
    }
}
