//! Store directory management.
//!
//! ```text
//! <store_path>/
//! ├─ LOCK                  # Advisory lock for single-writer
//! ├─ batches.log           # Encrypted batch log
//! └─ batches.log.compact   # Present only while a compaction is in flight
//! ```

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "batches.log";
const COMPACT_FILE: &str = "batches.log.compact";

/// Holds the exclusive lock on a store directory.
///
/// The lock is released by [`release`](Self::release) or on drop.
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    lock: Option<File>,
}

impl StoreDir {
    /// Opens or creates a store directory and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another handle holds the lock (`StoreLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::config(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::config(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock.try_lock_exclusive().is_err() {
            return Err(CoreError::StoreLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            lock: Some(lock),
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the batch log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    /// Returns the path compaction writes to before renaming.
    #[must_use]
    pub fn compact_log_path(&self) -> PathBuf {
        self.path.join(COMPACT_FILE)
    }

    /// Replaces the batch log with the compacted one.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename or directory sync fails.
    pub fn install_compacted_log(&self) -> CoreResult<()> {
        fs::rename(self.compact_log_path(), self.log_path())?;
        self.sync_directory()
    }

    /// Removes a compaction file left behind by a crash.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove_stale_compaction(&self) -> CoreResult<bool> {
        let path = self.compact_log_path();
        if path.exists() {
            fs::remove_file(&path)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Unlocks the directory. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to unlock.
    pub fn release(&mut self) -> CoreResult<()> {
        if let Some(lock) = self.lock.take() {
            lock.unlock()?;
        }
        Ok(())
    }

    /// Returns `true` while the lock is held.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> CoreResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> CoreResult<()> {
        // NTFS journals metadata; directory handles cannot be fsynced
        Ok(())
    }
}
