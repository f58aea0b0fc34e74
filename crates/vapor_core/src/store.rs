//! Store facade and recovery.

use crate::batch::{Batch, BatchOp};
use crate::config::{Config, LogMedium};
use crate::dir::StoreDir;
use crate::error::{CoreError, CoreResult};
use crate::kv::KvStore;
use crate::log::{BatchCodec, LogFile};
use crate::merge::MergeOperator;
use crate::reader::Reader;
use crate::treap::Treap;
use crate::types::{Item, SequenceNumber};
use crate::writer::Writer;
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use vapor_storage::{EncryptedPagedFile, FileBackend, RandomAccessFile};

/// Point-in-time counters reported by [`Store::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Sequence number of the last committed batch.
    pub sequence: SequenceNumber,
    /// Number of live keys.
    pub live_keys: usize,
    /// Logical size of the batch log in bytes.
    pub log_bytes: u64,
}

/// The main store handle.
///
/// `Store` is a cheap, cloneable handle; all clones share one state.
///
/// - Reads go through [`Reader`] snapshots and never wait for writers
/// - Writes go through [`Writer`]s and are committed one batch at a time
/// - Every committed batch is encrypted and appended to the log before it
///   becomes visible
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use vapor_core::{ConcatMergeOperator, Config, KvReader, KvWriter, Store};
/// use vapor_storage::EncryptionKey;
///
/// let dir = tempfile::tempdir().unwrap();
/// let config = Config::builder()
///     .key(EncryptionKey::generate())
///     .path(dir.path())
///     .build()
///     .unwrap();
///
/// let store = Store::open(config, Arc::new(ConcatMergeOperator)).unwrap();
/// let writer = store.writer().unwrap();
/// let mut batch = writer.new_batch();
/// batch.set(b"k1", b"v1");
/// writer.execute_batch(&batch).unwrap();
///
/// let reader = store.reader().unwrap();
/// assert_eq!(reader.get(b"k1").unwrap(), Some(b"v1".to_vec()));
/// store.close().unwrap();
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    config: Config,
    codec: BatchCodec,
    merge_operator: Arc<dyn MergeOperator>,
    /// Published root; only swapped while `write` is held.
    root: RwLock<Treap>,
    write: Mutex<WriteState>,
    closed: AtomicBool,
}

struct WriteState {
    /// `None` once the store is closed.
    log: Option<LogFile>,
    /// `None` for stores opened over a caller-supplied medium.
    dir: Option<StoreDir>,
    sequence: SequenceNumber,
}

impl Store {
    /// Opens or creates the store at `config.path`.
    ///
    /// Takes the directory lock, then replays the whole log to rebuild the
    /// index.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another handle holds the directory (`StoreLocked`)
    /// - Any record fails authentication (`DecryptionFailed`), for example
    ///   because the key is wrong
    /// - The log is corrupt (`MalformedRecord`, `ChecksumMismatch`)
    /// - I/O errors occur
    pub fn open(config: Config, merge_operator: Arc<dyn MergeOperator>) -> CoreResult<Self> {
        let dir = StoreDir::open(&config.path, config.create_if_missing)?;
        if dir.remove_stale_compaction()? {
            tracing::warn!(path = %dir.path().display(), "removed unfinished compaction");
        }

        let medium = open_medium(&config, &dir.log_path())?;
        Self::open_inner(config, merge_operator, medium, Some(dir))
    }

    /// Opens a store whose log lives on `medium` instead of in a directory.
    ///
    /// `config.path` is ignored and no lock is taken. The medium is still
    /// wrapped according to `config.log_medium`.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open), minus the directory errors.
    pub fn open_with_medium(
        config: Config,
        merge_operator: Arc<dyn MergeOperator>,
        medium: Box<dyn RandomAccessFile>,
    ) -> CoreResult<Self> {
        let medium = wrap_medium(&config, medium);
        Self::open_inner(config, merge_operator, medium, None)
    }

    fn open_inner(
        config: Config,
        merge_operator: Arc<dyn MergeOperator>,
        medium: Box<dyn RandomAccessFile>,
        dir: Option<StoreDir>,
    ) -> CoreResult<Self> {
        let codec = BatchCodec::new(&config.key);
        let mut root = Treap::new();
        let mut records = 0usize;

        let log = LogFile::open(medium, config.sync_on_commit, |record| {
            for item in codec.open(&record)? {
                root = apply(&root, item);
            }
            records += 1;
            Ok(())
        })?;

        let sequence = log.last_sequence().unwrap_or_default();
        tracing::info!(
            records,
            sequence = sequence.as_u64(),
            keys = root.len(),
            merge_operator = merge_operator.name(),
            "store opened"
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                config,
                codec,
                merge_operator,
                root: RwLock::new(root),
                write: Mutex::new(WriteState {
                    log: Some(log),
                    dir,
                    sequence,
                }),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Takes a snapshot of the current state.
    ///
    /// # Errors
    ///
    /// Returns `StoreClosed` after [`close`](Self::close).
    pub fn reader(&self) -> CoreResult<Reader> {
        self.ensure_open()?;
        Ok(Reader::new(self.inner.root.read().clone()))
    }

    /// Returns a writer bound to this store.
    ///
    /// # Errors
    ///
    /// Returns `StoreClosed` after [`close`](Self::close).
    pub fn writer(&self) -> CoreResult<Writer> {
        self.ensure_open()?;
        Ok(Writer::new(self.clone()))
    }

    /// Commits `batch`: merges, then sets and deletes, then one log record.
    ///
    /// Nothing is published unless the record was appended.
    pub(crate) fn execute_batch(&self, batch: &Batch) -> CoreResult<()> {
        self.ensure_open()?;
        if batch.is_empty() {
            return Ok(());
        }

        let mut guard = self.inner.write.lock();
        let state = &mut *guard;
        let log = state.log.as_mut().ok_or(CoreError::StoreClosed)?;

        let mut working = self.inner.root.read().clone();
        let mut items = Vec::with_capacity(batch.len());

        for (key, operands) in batch.merges() {
            let merged = self
                .inner
                .merge_operator
                .full_merge(key, working.get(key), operands)
                .ok_or_else(|| CoreError::merge_failed(key))?;
            working = working.insert(key.clone(), merged.clone());
            items.push(Item::put(key.clone(), merged));
        }

        for op in batch.ops() {
            match op {
                BatchOp::Set { key, value } => {
                    working = working.insert(key.clone(), value.clone());
                    items.push(Item::put(key.clone(), value.clone()));
                }
                BatchOp::Delete { key } => {
                    working = working.delete(key);
                    items.push(Item::tombstone(key.clone()));
                }
            }
        }

        let sequence = state.sequence.next();
        let record = self.inner.codec.seal(sequence, &items)?;
        log.append(&record)?;

        state.sequence = sequence;
        *self.inner.root.write() = working;

        tracing::debug!(
            sequence = sequence.as_u64(),
            items = items.len(),
            bytes = record.encoded_len(),
            "batch committed"
        );
        Ok(())
    }

    /// Rewrites the log as a single record holding every live key.
    ///
    /// On disk the new log is written beside the old one and renamed over
    /// it, so a crash leaves either the old or the new log intact.
    ///
    /// # Errors
    ///
    /// Returns `StoreClosed` after [`close`](Self::close), or any error from
    /// writing, syncing or renaming the new log.
    pub fn compact(&self) -> CoreResult<()> {
        let mut guard = self.inner.write.lock();
        let state = &mut *guard;
        let before = state
            .log
            .as_ref()
            .map(LogFile::end_offset)
            .ok_or(CoreError::StoreClosed)?;

        let root = self.inner.root.read().clone();
        let mut items = Vec::with_capacity(root.len());
        root.visit_ascend(&[], |entry| {
            items.push(Item::put(entry.key(), entry.value()));
            true
        });
        // Keeps the sequence counter across the rewrite.
        let record = if state.sequence.as_u64() == 0 {
            None
        } else {
            Some(self.inner.codec.seal(state.sequence, &items)?)
        };
        let config = &self.inner.config;

        match &state.dir {
            Some(dir) => {
                let compact_path = dir.compact_log_path();
                let mut fresh = LogFile::create(open_medium(config, &compact_path)?, false)?;
                if let Some(record) = &record {
                    fresh.append(record)?;
                }
                fresh.sync()?;
                drop(fresh);

                // Release the old handle before renaming over it.
                if let Some(old) = &state.log {
                    old.sync()?;
                }
                state.log = None;

                let installed = dir.install_compacted_log();
                let reopened = LogFile::open(
                    open_medium(config, &dir.log_path())?,
                    config.sync_on_commit,
                    |_| Ok(()),
                )?;
                state.log = Some(reopened);
                installed?;
            }
            None => {
                let old = state.log.take().ok_or(CoreError::StoreClosed)?;
                let mut fresh = LogFile::create(old.into_inner(), config.sync_on_commit)?;
                if let Some(record) = &record {
                    fresh.append(record)?;
                }
                fresh.sync()?;
                state.log = Some(fresh);
            }
        }

        let after = state.log.as_ref().map_or(0, LogFile::end_offset);
        tracing::info!(
            sequence = state.sequence.as_u64(),
            keys = items.len(),
            before,
            after,
            "log compacted"
        );
        Ok(())
    }

    /// Syncs the log and closes the store.
    ///
    /// Readers taken earlier keep working; every other operation, including
    /// a second `close`, fails with `StoreClosed`. The directory lock is
    /// released, so the store can be reopened right away.
    ///
    /// # Errors
    ///
    /// Returns `StoreClosed` if already closed, or the error of the final
    /// sync. The store is closed either way.
    pub fn close(&self) -> CoreResult<()> {
        let mut guard = self.inner.write.lock();
        let state = &mut *guard;
        let log = state.log.take().ok_or(CoreError::StoreClosed)?;
        self.inner.closed.store(true, Ordering::Release);

        let synced = log.sync();
        drop(log);
        if let Some(dir) = state.dir.as_mut() {
            dir.release()?;
        }
        synced?;

        tracing::info!(sequence = state.sequence.as_u64(), "store closed");
        Ok(())
    }

    /// Returns current counters.
    ///
    /// # Errors
    ///
    /// Returns `StoreClosed` after [`close`](Self::close).
    pub fn stats(&self) -> CoreResult<StoreStats> {
        let state = self.inner.write.lock();
        let log = state.log.as_ref().ok_or(CoreError::StoreClosed)?;
        Ok(StoreStats {
            sequence: state.sequence,
            live_keys: self.inner.root.read().len(),
            log_bytes: log.end_offset(),
        })
    }

    /// Sequence number of the last committed batch.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.inner.write.lock().sequence
    }

    /// Checks if the store is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.inner.closed.load(Ordering::Acquire)
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub(crate) fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::StoreClosed)
        }
    }
}

impl KvStore for Store {
    type Reader = Reader;
    type Writer = Writer;

    fn reader(&self) -> CoreResult<Reader> {
        Store::reader(self)
    }

    fn writer(&self) -> CoreResult<Writer> {
        Store::writer(self)
    }

    fn close(&self) -> CoreResult<()> {
        Store::close(self)
    }

    fn compact(&self) -> CoreResult<()> {
        Store::compact(self)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.inner.config.path)
            .field("log_medium", &self.inner.config.log_medium)
            .field("is_open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        if let Some(log) = &self.write.get_mut().log {
            let _ = log.sync();
        }
    }
}

fn apply(root: &Treap, item: Item) -> Treap {
    match item.value {
        Some(value) => root.insert(item.key, value),
        None => root.delete(&item.key),
    }
}

fn wrap_medium(config: &Config, physical: Box<dyn RandomAccessFile>) -> Box<dyn RandomAccessFile> {
    match config.log_medium {
        LogMedium::Plain => physical,
        LogMedium::Paged => Box::new(EncryptedPagedFile::with_cache(
            physical,
            &config.key,
            config.page_cache,
        )),
    }
}

fn open_medium(config: &Config, path: &Path) -> CoreResult<Box<dyn RandomAccessFile>> {
    let file = FileBackend::open(path)?;
    Ok(wrap_medium(config, Box::new(file)))
}
