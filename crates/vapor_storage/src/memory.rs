//! In-memory storage backend for testing.

use crate::backend::{FileStat, RandomAccessFile};
use crate::error::StorageResult;
use parking_lot::RwLock;

/// An in-memory storage backend.
///
/// This backend stores all data in memory and is suitable for:
/// - Unit tests (including tampering with "physical" bytes)
/// - Ephemeral stores that don't need persistence
///
/// # Example
///
/// ```rust
/// use vapor_storage::{InMemoryBackend, RandomAccessFile};
///
/// let backend = InMemoryBackend::new();
/// backend.write_at(b"test data", 0).unwrap();
/// assert_eq!(backend.stat().unwrap().size, 9);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory backend with pre-existing data.
    ///
    /// Useful for testing recovery scenarios.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns a copy of all data in the backend.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl RandomAccessFile for InMemoryBackend {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> StorageResult<usize> {
        let data = self.data.read();
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        if start >= data.len() {
            return Ok(0);
        }

        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> StorageResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let start = usize::try_from(offset).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "offset out of range")
        })?;
        let end = start + buf.len();

        let mut data = self.data.write();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn truncate(&self, size: u64) -> StorageResult<()> {
        let size = usize::try_from(size).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "size out of range")
        })?;
        self.data.write().resize(size, 0);
        Ok(())
    }

    fn stat(&self) -> StorageResult<FileStat> {
        Ok(FileStat {
            size: self.data.read().len() as u64,
            modified: None,
        })
    }

    fn sync(&self) -> StorageResult<()> {
        // Nothing to make durable
        Ok(())
    }
}
