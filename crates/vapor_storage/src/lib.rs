//! # Vapor Storage
//!
//! Random-access file backends and transparent page encryption for Vapor.
//!
//! This crate is the lowest layer of Vapor. Everything here deals in plain
//! byte ranges: backends do not know about logs, batches, or the in-memory
//! index that sits on top of them.
//!
//! ## Design Principles
//!
//! - Every medium implements [`RandomAccessFile`] (`read_at`, `write_at`,
//!   `truncate`, `stat`, `sync`)
//! - Backends must be `Send + Sync` and take `&self`; locking is internal
//! - Encryption is a wrapper, so any medium can be encrypted at rest
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//! - [`FileBackend`] - For persistent storage using OS file APIs
//! - [`EncryptedPagedFile`] - AES-256-GCM page encryption over another backend
//!
//! ## Example
//!
//! ```rust
//! use vapor_storage::{EncryptedPagedFile, EncryptionKey, InMemoryBackend, RandomAccessFile};
//!
//! let key = EncryptionKey::from_bytes(&[7u8; 32]).unwrap();
//! let file = EncryptedPagedFile::new(InMemoryBackend::new(), &key);
//!
//! file.write_at(b"hello world", 10_000).unwrap();
//! let mut buf = [0u8; 11];
//! file.read_at(&mut buf, 10_000).unwrap();
//! assert_eq!(&buf, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod cache;
mod codec;
mod crypto;
mod error;
mod file;
mod memory;
mod paged;

pub use backend::{FileStat, RandomAccessFile};
pub use cache::{PageCache, PageCacheConfig};
pub use codec::{PageCodec, PAGE_PAYLOAD_SIZE, PAGE_SIZE};
pub use crypto::{Cipher, EncryptionKey, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use paged::EncryptedPagedFile;
