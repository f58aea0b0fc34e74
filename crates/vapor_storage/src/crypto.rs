//! Authenticated encryption primitives (AES-256-GCM).
//!
//! Every sealed message has the layout `nonce (12) || ciphertext || tag (16)`.
//! Nonces are drawn from the thread-local CSPRNG on every call and are never
//! derived from the message or a counter.

use crate::error::{StorageError, StorageResult};
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Symmetric key for AES-256-GCM.
///
/// The key is zeroized when dropped and never shows up in `Debug` output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Generates a new random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> StorageResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(StorageError::InvalidKeySize {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }

        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self { bytes: key_bytes })
    }

    /// Derives a key from a passphrase using HKDF-SHA256.
    ///
    /// HKDF does not stretch low-entropy input; the passphrase should already
    /// carry enough entropy on its own. The salt should be random and stored
    /// next to the data it protects.
    ///
    /// # Errors
    ///
    /// Returns an error if HKDF expansion fails.
    pub fn derive_from_passphrase(passphrase: &[u8], salt: &[u8]) -> StorageResult<Self> {
        use hkdf::Hkdf;
        use sha2::Sha256;

        let hk = Hkdf::<Sha256>::new(Some(salt), passphrase);
        let mut bytes = [0u8; KEY_SIZE];
        hk.expand(b"vapor-store-key-v1", &mut bytes)
            .map_err(|_| StorageError::encryption("HKDF expand failed"))?;

        Ok(Self { bytes })
    }

    /// Returns the raw key bytes.
    ///
    /// Never log or persist the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// AES-256-GCM sealing and opening with random nonces.
#[derive(Clone)]
pub struct Cipher {
    aead: Aes256Gcm,
}

impl Cipher {
    /// Creates a cipher bound to `key`.
    #[must_use]
    pub fn new(key: &EncryptionKey) -> Self {
        let aead = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
        Self { aead }
    }

    /// Encrypts `plaintext`, returning `nonce || ciphertext || tag`.
    ///
    /// # Errors
    ///
    /// Returns an error if the AEAD implementation rejects the input.
    pub fn seal(&self, plaintext: &[u8]) -> StorageResult<Vec<u8>> {
        self.seal_with_aad(plaintext, &[])
    }

    /// Decrypts a message produced by [`seal`](Self::seal).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Decryption`] on a wrong key, tampered bytes, or
    /// a truncated message.
    pub fn open(&self, sealed: &[u8]) -> StorageResult<Vec<u8>> {
        self.open_with_aad(sealed, &[])
    }

    /// Encrypts `plaintext` and authenticates `aad` alongside it.
    ///
    /// The associated data is not stored; the same bytes must be presented
    /// to [`open_with_aad`](Self::open_with_aad).
    ///
    /// # Errors
    ///
    /// Returns an error if the AEAD implementation rejects the input.
    pub fn seal_with_aad(&self, plaintext: &[u8], aad: &[u8]) -> StorageResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .aead
            .encrypt(nonce, Payload { msg: plaintext, aad })
            .map_err(|_| StorageError::encryption("AES-GCM seal failed"))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend(ciphertext);
        Ok(sealed)
    }

    /// Decrypts a message produced by [`seal_with_aad`](Self::seal_with_aad).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Decryption`] if authentication fails.
    pub fn open_with_aad(&self, sealed: &[u8], aad: &[u8]) -> StorageResult<Vec<u8>> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(StorageError::decryption("ciphertext too short"));
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        self.aead
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| StorageError::decryption("authentication failed"))
    }
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher").field("aead", &"Aes256Gcm").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_differ() {
        let key1 = EncryptionKey::generate();
        let key2 = EncryptionKey::generate();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn key_wrong_size() {
        assert!(matches!(
            EncryptionKey::from_bytes(&[0u8; 16]),
            Err(StorageError::InvalidKeySize {
                expected: 32,
                actual: 16
            })
        ));
        assert!(EncryptionKey::from_bytes(&[0u8; 64]).is_err());
    }

    #[test]
    fn key_debug_is_redacted() {
        let key = EncryptionKey::from_bytes(&[0x41u8; KEY_SIZE]).unwrap();
        let rendered = format!("{key:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("65"));
    }

    #[test]
    fn seal_open_roundtrip() {
        let cipher = Cipher::new(&EncryptionKey::generate());

        let sealed = cipher.seal(b"Hello, Vapor!").unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + 13 + TAG_SIZE);
        assert_eq!(cipher.open(&sealed).unwrap(), b"Hello, Vapor!");
    }

    #[test]
    fn seal_uses_fresh_nonces() {
        let cipher = Cipher::new(&EncryptionKey::generate());

        let a = cipher.seal(b"same data").unwrap();
        let b = cipher.seal(b"same data").unwrap();
        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn open_with_wrong_key_fails() {
        let sealed = Cipher::new(&EncryptionKey::generate())
            .seal(b"secret")
            .unwrap();
        let result = Cipher::new(&EncryptionKey::generate()).open(&sealed);
        assert!(result.unwrap_err().is_decryption());
    }

    #[test]
    fn open_tampered_fails() {
        let cipher = Cipher::new(&EncryptionKey::generate());
        let mut sealed = cipher.seal(b"data").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(cipher.open(&sealed).unwrap_err().is_decryption());
    }

    #[test]
    fn open_too_short_fails() {
        let cipher = Cipher::new(&EncryptionKey::generate());
        assert!(cipher.open(&[0u8; 10]).unwrap_err().is_decryption());
    }

    #[test]
    fn wrong_aad_fails() {
        let cipher = Cipher::new(&EncryptionKey::generate());
        let sealed = cipher.seal_with_aad(b"secret", b"seq:1").unwrap();

        assert_eq!(cipher.open_with_aad(&sealed, b"seq:1").unwrap(), b"secret");
        assert!(cipher.open_with_aad(&sealed, b"seq:2").is_err());
    }

    #[test]
    fn passphrase_derivation_is_deterministic_per_salt() {
        let k1 = EncryptionKey::derive_from_passphrase(b"passphrase", b"salt-a").unwrap();
        let k2 = EncryptionKey::derive_from_passphrase(b"passphrase", b"salt-a").unwrap();
        let k3 = EncryptionKey::derive_from_passphrase(b"passphrase", b"salt-b").unwrap();

        assert_eq!(k1.as_bytes(), k2.as_bytes());
        assert_ne!(k1.as_bytes(), k3.as_bytes());
    }
}
