//! Single-page encryption.
//!
//! A physical page is exactly [`PAGE_SIZE`] bytes:
//!
//! ```text
//! | nonce (12) | ciphertext (4068) | tag (16) |
//! ```
//!
//! The plaintext payload of every page is [`PAGE_PAYLOAD_SIZE`] bytes, no
//! matter how much of it holds meaningful data.

use crate::crypto::{Cipher, EncryptionKey, NONCE_SIZE, TAG_SIZE};
use crate::error::{StorageError, StorageResult};

/// Size of one physical (encrypted) page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Plaintext bytes carried by one page.
pub const PAGE_PAYLOAD_SIZE: usize = PAGE_SIZE - TAG_SIZE - NONCE_SIZE;

/// Seals and opens fixed-size pages.
///
/// The codec is stateless apart from the key schedule; every call to
/// [`seal`](Self::seal) draws a fresh nonce.
#[derive(Debug, Clone)]
pub struct PageCodec {
    cipher: Cipher,
}

impl PageCodec {
    /// Creates a codec for `key`.
    #[must_use]
    pub fn new(key: &EncryptionKey) -> Self {
        Self {
            cipher: Cipher::new(key),
        }
    }

    /// Encrypts one payload into a full physical page.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidPageSize`] if `payload` is not exactly
    /// [`PAGE_PAYLOAD_SIZE`] bytes.
    pub fn seal(&self, payload: &[u8]) -> StorageResult<Vec<u8>> {
        if payload.len() != PAGE_PAYLOAD_SIZE {
            return Err(StorageError::InvalidPageSize {
                expected: PAGE_PAYLOAD_SIZE,
                actual: payload.len(),
            });
        }

        let page = self.cipher.seal(payload)?;
        debug_assert_eq!(page.len(), PAGE_SIZE);
        Ok(page)
    }

    /// Decrypts one physical page back into its payload.
    ///
    /// `page_id` is only used to make the error message useful.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Decryption`] if the page does not authenticate
    /// under this key, and [`StorageError::InvalidPageSize`] if `page` is not
    /// exactly [`PAGE_SIZE`] bytes.
    pub fn open(&self, page_id: u64, page: &[u8]) -> StorageResult<Vec<u8>> {
        if page.len() != PAGE_SIZE {
            return Err(StorageError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: page.len(),
            });
        }

        self.cipher
            .open(page)
            .map_err(|_| StorageError::decryption(format!("page {page_id} failed authentication")))
    }
}
