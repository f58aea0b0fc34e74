//! # Vapor Core
//!
//! Encrypted, snapshot-isolated key-value store for Vapor.
//!
//! This crate provides:
//! - An append-only batch log whose records are AES-256-GCM sealed
//! - A persistent treap index rebuilt by replaying the log at open
//! - Snapshot readers that never block on writers
//! - Atomic batches with set, delete and merge operations
//! - Log compaction and crash-safe tail repair
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vapor_core::prelude::*;
//! use vapor_storage::EncryptionKey;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let config = Config::builder()
//!     .key(EncryptionKey::generate())
//!     .path(dir.path())
//!     .log_medium(LogMedium::Paged)
//!     .build()
//!     .unwrap();
//! let store = Store::open(config, Arc::new(ConcatMergeOperator)).unwrap();
//!
//! let writer = store.writer().unwrap();
//! let mut batch = writer.new_batch();
//! batch.set(b"user/1", b"alice");
//! batch.set(b"user/2", b"bob");
//! writer.execute_batch(&batch).unwrap();
//!
//! let reader = store.reader().unwrap();
//! let mut iter = reader.prefix_iterator(b"user/");
//! assert_eq!(iter.value(), Some(&b"alice"[..]));
//! iter.next();
//! assert_eq!(iter.value(), Some(&b"bob"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod config;
mod dir;
mod error;
mod iterator;
mod kv;
pub mod log;
mod merge;
mod reader;
mod store;
mod treap;
mod types;
mod writer;

pub use batch::{Batch, BatchOp, BatchOptions};
pub use config::{Config, ConfigBuilder, LogMedium};
pub use dir::StoreDir;
pub use error::{CoreError, CoreResult};
pub use iterator::{prefix_successor, StoreIterator};
pub use kv::{KvIterator, KvReader, KvStore, KvWriter};
pub use merge::{ConcatMergeOperator, MergeOperator};
pub use reader::Reader;
pub use store::{Store, StoreStats};
pub use treap::{Cursor, Entry, Treap};
pub use types::{Item, SequenceNumber};
pub use writer::Writer;

/// Everything needed to open a store and read or write it.
pub mod prelude {
    pub use crate::{
        Batch, ConcatMergeOperator, Config, CoreError, CoreResult, KvIterator, KvReader,
        KvStore, KvWriter, LogMedium, MergeOperator, Store,
    };
}
