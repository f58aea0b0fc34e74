//! Random-access file trait definition.

use crate::error::StorageResult;
use std::time::SystemTime;

/// Metadata reported by [`RandomAccessFile::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Size in bytes as seen through this file.
    ///
    /// For an encrypted paged file this is the logical size, which is always
    /// a whole number of page payloads.
    pub size: u64,
    /// Last modification time, if the medium tracks one.
    pub modified: Option<SystemTime>,
}

/// A random-access byte store.
///
/// This is the contract shared by plain files, in-memory buffers, and the
/// encrypted paged file that wraps either of them. All methods take `&self`;
/// implementations synchronize internally.
///
/// # Invariants
///
/// - `write_at` followed by `read_at` over the same range returns the bytes
///   that were written
/// - `sync` makes every completed write durable
/// - Implementations must be `Send + Sync`
pub trait RandomAccessFile: Send + Sync {
    /// Reads into `buf` starting at `offset`.
    ///
    /// Returns the number of bytes read. Plain media return fewer bytes than
    /// requested at end of file; the encrypted paged file always fills `buf`,
    /// with zeros for ranges that were never written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs or, for encrypted media, if a
    /// page fails authentication.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> StorageResult<usize>;

    /// Writes all of `buf` at `offset`, extending the file if needed.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn write_at(&self, buf: &[u8], offset: u64) -> StorageResult<usize>;

    /// Truncates (or extends) the file to `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the truncation fails.
    fn truncate(&self, size: u64) -> StorageResult<()>;

    /// Returns the current size and modification time.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read.
    fn stat(&self) -> StorageResult<FileStat>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&self) -> StorageResult<()>;
}

impl<T: RandomAccessFile + ?Sized> RandomAccessFile for Box<T> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> StorageResult<usize> {
        (**self).read_at(buf, offset)
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> StorageResult<usize> {
        (**self).write_at(buf, offset)
    }

    fn truncate(&self, size: u64) -> StorageResult<()> {
        (**self).truncate(size)
    }

    fn stat(&self) -> StorageResult<FileStat> {
        (**self).stat()
    }

    fn sync(&self) -> StorageResult<()> {
        (**self).sync()
    }
}

impl<T: RandomAccessFile + ?Sized> RandomAccessFile for std::sync::Arc<T> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> StorageResult<usize> {
        (**self).read_at(buf, offset)
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> StorageResult<usize> {
        (**self).write_at(buf, offset)
    }

    fn truncate(&self, size: u64) -> StorageResult<()> {
        (**self).truncate(size)
    }

    fn stat(&self) -> StorageResult<FileStat> {
        (**self).stat()
    }

    fn sync(&self) -> StorageResult<()> {
        (**self).sync()
    }
}
