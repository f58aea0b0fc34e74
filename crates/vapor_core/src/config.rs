//! Store configuration.

use crate::error::{CoreError, CoreResult};
use std::path::{Path, PathBuf};
use vapor_storage::{EncryptionKey, PageCacheConfig};

/// Physical format of the batch log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogMedium {
    /// Records go straight to a plain file. Each record is still encrypted.
    #[default]
    Plain,
    /// Records go through an encrypted paged file, so the envelope is
    /// encrypted as well.
    Paged,
}

/// Configuration for opening a store.
///
/// Built through [`Config::builder`]; a `Config` always holds a key and a path.
#[derive(Debug, Clone)]
pub struct Config {
    /// Key used for every record and page the store writes.
    pub key: EncryptionKey,

    /// Store directory.
    pub path: PathBuf,

    /// Physical format of the log file.
    pub log_medium: LogMedium,

    /// Page cache policy; only used with [`LogMedium::Paged`].
    pub page_cache: PageCacheConfig,

    /// Whether to sync the log on every committed batch (safer but slower).
    pub sync_on_commit: bool,

    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Config {
    /// Starts building a configuration.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for [`Config`].
///
/// # Example
///
/// ```rust
/// use vapor_core::{Config, LogMedium};
/// use vapor_storage::EncryptionKey;
///
/// let config = Config::builder()
///     .key(EncryptionKey::generate())
///     .path("my_store")
///     .log_medium(LogMedium::Paged)
///     .sync_on_commit(false)
///     .build()
///     .unwrap();
/// assert!(!config.sync_on_commit);
/// ```
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    key: Option<CoreResult<EncryptionKey>>,
    path: Option<PathBuf>,
    log_medium: LogMedium,
    page_cache: PageCacheConfig,
    sync_on_commit: Option<bool>,
    create_if_missing: Option<bool>,
}

impl ConfigBuilder {
    /// Sets the encryption key.
    #[must_use]
    pub fn key(mut self, key: EncryptionKey) -> Self {
        self.key = Some(Ok(key));
        self
    }

    /// Sets the encryption key from raw bytes.
    ///
    /// A slice that is not 32 bytes long makes [`build`](Self::build) fail.
    #[must_use]
    pub fn key_bytes(mut self, bytes: &[u8]) -> Self {
        self.key = Some(EncryptionKey::from_bytes(bytes).map_err(|err| {
            CoreError::config(format!("key: {err}"))
        }));
        self
    }

    /// Sets the store directory.
    #[must_use]
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the log medium.
    #[must_use]
    pub const fn log_medium(mut self, medium: LogMedium) -> Self {
        self.log_medium = medium;
        self
    }

    /// Sets the page cache policy.
    #[must_use]
    pub const fn page_cache(mut self, cache: PageCacheConfig) -> Self {
        self.page_cache = cache;
        self
    }

    /// Sets whether to sync the log on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = Some(value);
        self
    }

    /// Sets whether to create the store directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = Some(value);
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] if the key or path is missing, or if
    /// the key has the wrong size.
    pub fn build(self) -> CoreResult<Config> {
        let key = self.key.ok_or_else(|| CoreError::config("key is required"))??;
        let path = self.path.ok_or_else(|| CoreError::config("path is required"))?;
        if path.as_os_str().is_empty() {
            return Err(CoreError::config("path must not be empty"));
        }

        Ok(Config {
            key,
            path,
            log_medium: self.log_medium,
            page_cache: self.page_cache,
            sync_on_commit: self.sync_on_commit.unwrap_or(true),
            create_if_missing: self.create_if_missing.unwrap_or(true),
        })
    }
}
