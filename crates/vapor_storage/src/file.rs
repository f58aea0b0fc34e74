//! File-based storage backend for persistent storage.

use crate::backend::{FileStat, RandomAccessFile};
use crate::error::StorageResult;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-based storage backend.
///
/// This backend provides persistent storage using OS file APIs.
/// Data survives process restarts.
///
/// # Durability
///
/// `sync()` calls `File::sync_all()` to ensure data and metadata are on disk.
///
/// # Thread Safety
///
/// The file handle sits behind a mutex because positional access is done
/// with `seek` followed by `read`/`write`.
///
/// # Example
///
/// ```no_run
/// use vapor_storage::{FileBackend, RandomAccessFile};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("data.bin")).unwrap();
/// backend.write_at(b"persistent data", 0).unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileBackend {
    /// Opens or creates a file backend at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Opens or creates a file backend, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or file cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RandomAccessFile for FileBackend {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> StorageResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(filled)
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> StorageResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;

        Ok(buf.len())
    }

    fn truncate(&self, size: u64) -> StorageResult<()> {
        let file = self.file.lock();
        file.set_len(size)?;
        Ok(())
    }

    fn stat(&self) -> StorageResult<FileStat> {
        let metadata = self.file.lock().metadata()?;
        Ok(FileStat {
            size: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }

    fn sync(&self) -> StorageResult<()> {
        let mut file = self.file.lock();
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }
}
