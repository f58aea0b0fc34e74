//! Transparent page-level encryption over any [`RandomAccessFile`].
//!
//! ## Layout
//!
//! The physical file is a flat run of [`PAGE_SIZE`] pages with no header.
//! Page `n` starts at physical offset `n * PAGE_SIZE` and carries logical
//! bytes `[n * PAGE_PAYLOAD_SIZE, (n + 1) * PAGE_PAYLOAD_SIZE)`.
//!
//! ## Security Model
//!
//! - Each page is sealed independently with AES-256-GCM and a random nonce
//! - Every write re-seals every page it touches, including bytes it did not change
//! - Any authentication failure aborts the whole operation
//!
//! ## Sparse Reads
//!
//! Pages that lie beyond the physical extent read as zeros without being
//! decrypted. Writes that start beyond the extent seal the gap pages as zero
//! payloads, so every physical page is always a valid sealed page.

use crate::backend::{FileStat, RandomAccessFile};
use crate::cache::{PageCache, PageCacheConfig};
use crate::codec::{PageCodec, PAGE_PAYLOAD_SIZE, PAGE_SIZE};
use crate::crypto::EncryptionKey;
use crate::error::StorageResult;
use crate::file::FileBackend;
use parking_lot::{Mutex, RwLock};
use std::io;
use std::path::Path;

const PAYLOAD: u64 = PAGE_PAYLOAD_SIZE as u64;

/// A random-access file whose bytes are encrypted page by page.
///
/// Reads take a shared lock and writes an exclusive one, scoped to the whole
/// file. When a page cache is configured it is only updated while the
/// exclusive lock is held, together with the physical write.
///
/// # Example
///
/// ```no_run
/// use vapor_storage::{EncryptedPagedFile, EncryptionKey, RandomAccessFile};
/// use std::path::Path;
///
/// let key = EncryptionKey::generate();
/// let file = EncryptedPagedFile::open(Path::new("data.enc"), &key).unwrap();
/// file.write_at(b"secret", 0).unwrap();
/// file.close().unwrap();
/// ```
pub struct EncryptedPagedFile<F> {
    inner: F,
    codec: PageCodec,
    io_lock: RwLock<()>,
    cache: Option<Mutex<PageCache>>,
}

impl EncryptedPagedFile<FileBackend> {
    /// Opens or creates an encrypted file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path, key: &EncryptionKey) -> StorageResult<Self> {
        Ok(Self::new(FileBackend::open(path)?, key))
    }
}

impl<F: RandomAccessFile> EncryptedPagedFile<F> {
    /// Wraps `inner` without a page cache.
    #[must_use]
    pub fn new(inner: F, key: &EncryptionKey) -> Self {
        Self::with_cache(inner, key, PageCacheConfig::Disabled)
    }

    /// Wraps `inner` with the given page cache policy.
    #[must_use]
    pub fn with_cache(inner: F, key: &EncryptionKey, cache: PageCacheConfig) -> Self {
        Self {
            inner,
            codec: PageCodec::new(key),
            io_lock: RwLock::new(()),
            cache: PageCache::from_config(cache).map(Mutex::new),
        }
    }

    /// Returns the physical (ciphertext) medium.
    #[must_use]
    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Unwraps the physical medium.
    #[must_use]
    pub fn into_inner(self) -> F {
        self.inner
    }

    /// Number of decrypted pages currently cached.
    #[must_use]
    pub fn cached_pages(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| cache.lock().len())
    }

    /// Syncs and releases the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails.
    pub fn close(self) -> StorageResult<()> {
        self.sync()
    }

    fn physical_pages(&self) -> StorageResult<u64> {
        Ok(self.inner.stat()?.size / PAGE_SIZE as u64)
    }

    /// Loads `count` payloads starting at `first` with one physical read.
    ///
    /// Pages at or beyond `physical_pages` come back zero-filled.
    fn load_pages(
        &self,
        first: u64,
        count: usize,
        physical_pages: u64,
    ) -> StorageResult<Vec<Vec<u8>>> {
        let on_disk = physical_pages.saturating_sub(first).min(count as u64) as usize;
        let mut cache = self.cache.as_ref().map(|cache| cache.lock());

        let all_cached = cache.as_ref().is_some_and(|cache| {
            (0..on_disk).all(|i| cache.get(first + i as u64).is_some())
        });

        let mut raw = Vec::new();
        if on_disk > 0 && !all_cached {
            raw = vec![0u8; on_disk * PAGE_SIZE];
            let n = self.inner.read_at(&mut raw, physical_offset(first)?)?;
            if n < raw.len() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("short read of pages {first}..{}", first + on_disk as u64),
                )
                .into());
            }
        }

        let mut payloads = Vec::with_capacity(count);
        for i in 0..count {
            let page_id = first + i as u64;
            if i >= on_disk {
                payloads.push(vec![0u8; PAGE_PAYLOAD_SIZE]);
                continue;
            }
            if let Some(hit) = cache.as_ref().and_then(|cache| cache.get(page_id)) {
                payloads.push(hit.to_vec());
                continue;
            }

            let payload = self
                .codec
                .open(page_id, &raw[i * PAGE_SIZE..(i + 1) * PAGE_SIZE])?;
            if let Some(cache) = cache.as_mut() {
                cache.insert(page_id, payload.clone());
            }
            payloads.push(payload);
        }

        Ok(payloads)
    }
}

impl<F: RandomAccessFile> RandomAccessFile for EncryptedPagedFile<F> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> StorageResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let (first, last) = page_span(offset, buf.len())?;

        let _guard = self.io_lock.read();
        let physical_pages = self.physical_pages()?;
        let pages = self.load_pages(first, (last - first + 1) as usize, physical_pages)?;

        let mut copied = 0;
        let mut page_offset = (offset % PAYLOAD) as usize;
        for page in &pages {
            let take = (PAGE_PAYLOAD_SIZE - page_offset).min(buf.len() - copied);
            buf[copied..copied + take].copy_from_slice(&page[page_offset..page_offset + take]);
            copied += take;
            page_offset = 0;
        }

        Ok(copied)
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> StorageResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let (first, last) = page_span(offset, buf.len())?;

        let _guard = self.io_lock.write();
        let physical_pages = self.physical_pages()?;
        // Gap pages between the current end and `first` are sealed as zeros.
        let start = first.min(physical_pages);
        let count = (last - start + 1) as usize;
        let mut pages = self.load_pages(start, count, physical_pages)?;

        let mut written = 0;
        let mut page_offset = (offset % PAYLOAD) as usize;
        for page in &mut pages[(first - start) as usize..] {
            let take = (PAGE_PAYLOAD_SIZE - page_offset).min(buf.len() - written);
            page[page_offset..page_offset + take].copy_from_slice(&buf[written..written + take]);
            written += take;
            page_offset = 0;
        }

        let mut sealed = Vec::with_capacity(count * PAGE_SIZE);
        for page in &pages {
            sealed.extend(self.codec.seal(page)?);
        }
        tracing::trace!(start, count, "sealing pages");
        self.inner.write_at(&sealed, physical_offset(start)?)?;

        if let Some(cache) = &self.cache {
            let mut cache = cache.lock();
            for (i, page) in pages.into_iter().enumerate() {
                cache.insert(start + i as u64, page);
            }
        }

        Ok(buf.len())
    }

    fn truncate(&self, size: u64) -> StorageResult<()> {
        let _guard = self.io_lock.write();
        let pages = size.div_ceil(PAYLOAD);
        self.inner.truncate(physical_offset(pages)?)?;
        if let Some(cache) = &self.cache {
            cache.lock().truncate(pages);
        }
        Ok(())
    }

    fn stat(&self) -> StorageResult<FileStat> {
        let _guard = self.io_lock.read();
        let physical = self.inner.stat()?;
        Ok(FileStat {
            size: physical.size / PAGE_SIZE as u64 * PAYLOAD,
            modified: physical.modified,
        })
    }

    fn sync(&self) -> StorageResult<()> {
        let _guard = self.io_lock.read();
        self.inner.sync()
    }
}

impl<F> std::fmt::Debug for EncryptedPagedFile<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedPagedFile")
            .field("codec", &self.codec)
            .field("cached", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

/// First and last page touched by `len > 0` bytes at `offset`.
fn page_span(offset: u64, len: usize) -> StorageResult<(u64, u64)> {
    let end = offset
        .checked_add(len as u64)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "byte range overflows u64"))?;
    Ok((offset / PAYLOAD, (end - 1) / PAYLOAD))
}

fn physical_offset(page_id: u64) -> StorageResult<u64> {
    page_id
        .checked_mul(PAGE_SIZE as u64)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "page offset overflows u64").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn key(byte: u8) -> EncryptionKey {
        EncryptionKey::from_bytes(&[byte; 32]).unwrap()
    }

    fn paged() -> EncryptedPagedFile<InMemoryBackend> {
        EncryptedPagedFile::new(InMemoryBackend::new(), &key(0x42))
    }

    fn read_vec<F: RandomAccessFile>(file: &F, offset: u64, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        assert_eq!(file.read_at(&mut buf, offset).unwrap(), len);
        buf
    }

    #[test]
    fn roundtrip_within_one_page() {
        let file = paged();
        assert_eq!(file.write_at(b"hello", 100).unwrap(), 5);
        assert_eq!(read_vec(&file, 100, 5), b"hello");
        assert_eq!(file.inner().stat().unwrap().size, PAGE_SIZE as u64);
    }

    #[test]
    fn roundtrip_straddling_page_boundary() {
        let file = paged();
        let data: Vec<u8> = (0..100u8).collect();
        let offset = PAYLOAD - 37;

        file.write_at(&data, offset).unwrap();
        assert_eq!(read_vec(&file, offset, data.len()), data);
        assert_eq!(file.inner().stat().unwrap().size, 2 * PAGE_SIZE as u64);
    }

    #[test]
    fn roundtrip_many_pages() {
        let file = paged();
        let data: Vec<u8> = (0..PAGE_SIZE * 10 + 500).map(|i| (i % 251) as u8).collect();

        file.write_at(&data, 0).unwrap();
        assert_eq!(read_vec(&file, 0, data.len()), data);
        // Sub-range spanning several middle pages.
        assert_eq!(read_vec(&file, 5_000, 20_000), data[5_000..25_000]);
    }

    #[test]
    fn exact_page_write_touches_one_page() {
        let file = paged();
        file.write_at(&vec![9u8; PAGE_PAYLOAD_SIZE], 0).unwrap();
        assert_eq!(file.inner().stat().unwrap().size, PAGE_SIZE as u64);
    }

    #[test]
    fn partial_overwrite_preserves_neighbours() {
        let file = paged();
        file.write_at(&vec![1u8; 3 * PAGE_PAYLOAD_SIZE], 0).unwrap();
        file.write_at(&[2u8; 10], PAYLOAD + 5).unwrap();

        let all = read_vec(&file, 0, 3 * PAGE_PAYLOAD_SIZE);
        assert!(all[..PAGE_PAYLOAD_SIZE + 5].iter().all(|&b| b == 1));
        assert!(all[PAGE_PAYLOAD_SIZE + 5..PAGE_PAYLOAD_SIZE + 15]
            .iter()
            .all(|&b| b == 2));
        assert!(all[PAGE_PAYLOAD_SIZE + 15..].iter().all(|&b| b == 1));
    }

    #[test]
    fn rewrite_reseals_with_fresh_nonce() {
        let file = paged();
        file.write_at(b"abc", 0).unwrap();
        let before = file.inner().data();
        file.write_at(b"abc", 0).unwrap();
        let after = file.inner().data();

        assert_ne!(before[..crate::NONCE_SIZE], after[..crate::NONCE_SIZE]);
    }

    #[test]
    fn sparse_read_of_empty_file_is_zero() {
        let file = paged();
        assert_eq!(read_vec(&file, 123_456, 9_000), vec![0u8; 9_000]);
        assert_eq!(file.inner().stat().unwrap().size, 0);
    }

    #[test]
    fn write_past_end_seals_gap_pages() {
        let file = paged();
        file.write_at(b"tail", 3 * PAYLOAD + 10).unwrap();

        assert_eq!(file.inner().stat().unwrap().size, 4 * PAGE_SIZE as u64);
        assert_eq!(read_vec(&file, 0, 3 * PAGE_PAYLOAD_SIZE), vec![0u8; 3 * PAGE_PAYLOAD_SIZE]);
        assert_eq!(read_vec(&file, 3 * PAYLOAD + 10, 4), b"tail");
    }

    #[test]
    fn physical_bytes_hide_plaintext() {
        let file = paged();
        let secret = b"attack at dawn, attack at dawn";
        file.write_at(secret, 0).unwrap();

        let raw = file.inner().data();
        assert!(!raw.windows(secret.len()).any(|w| w == secret));
    }

    #[test]
    fn tampered_page_fails_read() {
        let file = paged();
        file.write_at(&vec![5u8; 2 * PAGE_PAYLOAD_SIZE], 0).unwrap();

        // Flip one bit inside the second physical page.
        let target = PAGE_SIZE as u64 + 700;
        let mut byte = [0u8; 1];
        file.inner().read_at(&mut byte, target).unwrap();
        byte[0] ^= 0x10;
        file.inner().write_at(&byte, target).unwrap();

        let mut buf = vec![0u8; 10];
        // First page is still fine.
        assert!(file.read_at(&mut buf, 0).is_ok());
        let err = file.read_at(&mut buf, PAYLOAD + 1).unwrap_err();
        assert!(err.is_decryption());
        // A write touching the bad page aborts too.
        assert!(file.write_at(b"x", PAYLOAD).unwrap_err().is_decryption());
    }

    #[test]
    fn wrong_key_fails_read() {
        let file = paged();
        file.write_at(b"secret", 0).unwrap();

        let reopened = EncryptedPagedFile::new(file.into_inner(), &key(0x43));
        let mut buf = [0u8; 6];
        assert!(reopened.read_at(&mut buf, 0).unwrap_err().is_decryption());
    }

    #[test]
    fn stat_reports_whole_payloads() {
        let file = paged();
        file.write_at(b"x", 0).unwrap();
        assert_eq!(file.stat().unwrap().size, PAYLOAD);

        file.write_at(b"y", PAYLOAD).unwrap();
        assert_eq!(file.stat().unwrap().size, 2 * PAYLOAD);
    }

    #[test]
    fn stat_ignores_partial_physical_page() {
        let inner = InMemoryBackend::with_data(vec![0u8; PAGE_SIZE + 100]);
        let file = EncryptedPagedFile::new(inner, &key(1));
        assert_eq!(file.stat().unwrap().size, 0);
    }

    #[test]
    fn truncate_rounds_up_to_whole_pages() {
        let file = paged();
        file.write_at(&vec![3u8; 4 * PAGE_PAYLOAD_SIZE], 0).unwrap();

        file.truncate(PAYLOAD + 1).unwrap();
        assert_eq!(file.inner().stat().unwrap().size, 2 * PAGE_SIZE as u64);
        assert_eq!(file.stat().unwrap().size, 2 * PAYLOAD);
        // Bytes past the truncation point inside the last page survive.
        assert_eq!(read_vec(&file, PAYLOAD + 1, 5), vec![3u8; 5]);
        // Dropped pages read as zeros.
        assert_eq!(read_vec(&file, 2 * PAYLOAD, 5), vec![0u8; 5]);

        file.truncate(0).unwrap();
        assert_eq!(file.inner().stat().unwrap().size, 0);
    }

    #[test]
    fn zero_length_io_is_noop() {
        let file = paged();
        assert_eq!(file.write_at(&[], 50_000).unwrap(), 0);
        assert_eq!(file.read_at(&mut [], 50_000).unwrap(), 0);
        assert_eq!(file.inner().stat().unwrap().size, 0);
    }

    #[test]
    fn overflowing_range_is_rejected() {
        let file = paged();
        let err = file.write_at(b"abc", u64::MAX - 1).unwrap_err();
        assert!(matches!(err, crate::StorageError::Io(_)));
    }

    #[test]
    fn unbounded_cache_serves_reads() {
        let file =
            EncryptedPagedFile::with_cache(InMemoryBackend::new(), &key(7), PageCacheConfig::Unbounded);
        let data = vec![4u8; 3 * PAGE_PAYLOAD_SIZE];
        file.write_at(&data, 0).unwrap();
        assert_eq!(file.cached_pages(), 3);
        assert_eq!(read_vec(&file, 0, data.len()), data);

        file.truncate(PAYLOAD).unwrap();
        assert_eq!(file.cached_pages(), 1);
    }

    #[test]
    fn capped_cache_stays_within_bound() {
        let file = EncryptedPagedFile::with_cache(
            InMemoryBackend::new(),
            &key(7),
            PageCacheConfig::Capped(2),
        );
        let data: Vec<u8> = (0..5 * PAGE_PAYLOAD_SIZE).map(|i| (i % 13) as u8).collect();
        file.write_at(&data, 0).unwrap();

        assert_eq!(file.cached_pages(), 2);
        assert_eq!(read_vec(&file, 0, data.len()), data);
        assert!(file.cached_pages() <= 2);
    }

    #[test]
    fn file_backed_roundtrip_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.enc");
        let data: Vec<u8> = (0..PAGE_SIZE * 3).map(|i| (i % 7) as u8).collect();

        let file = EncryptedPagedFile::open(&path, &key(9)).unwrap();
        file.write_at(&data, 17).unwrap();
        file.close().unwrap();

        let file = EncryptedPagedFile::open(&path, &key(9)).unwrap();
        assert_eq!(read_vec(&file, 17, data.len()), data);
        assert_eq!(std::fs::metadata(&path).unwrap().len() % PAGE_SIZE as u64, 0);
    }

    #[test]
    fn concurrent_writers_do_not_lose_updates() {
        let file = Arc::new(paged());
        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                let file = Arc::clone(&file);
                std::thread::spawn(move || {
                    file.write_at(&[i + 1; 3_000], u64::from(i) * 3_000).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let all = read_vec(&*file, 0, 12_000);
        for i in 0..4usize {
            assert!(all[i * 3_000..(i + 1) * 3_000]
                .iter()
                .all(|&b| b == i as u8 + 1));
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_write_then_read_returns_same_bytes(
            offset in 0u64..20_000,
            data in prop::collection::vec(any::<u8>(), 1..10_000),
        ) {
            let file = paged();
            file.write_at(&data, offset).unwrap();
            prop_assert_eq!(read_vec(&file, offset, data.len()), data);
        }

        #[test]
        fn prop_overlapping_writes_match_flat_model(
            writes in prop::collection::vec(
                (0usize..12_000, prop::collection::vec(any::<u8>(), 1..3_000)),
                1..8,
            ),
        ) {
            let file = paged();
            let mut model = vec![0u8; 15_000];
            for (offset, data) in &writes {
                file.write_at(data, *offset as u64).unwrap();
                model[*offset..*offset + data.len()].copy_from_slice(data);
            }
            prop_assert_eq!(read_vec(&file, 0, model.len()), model);
        }
    }
}
