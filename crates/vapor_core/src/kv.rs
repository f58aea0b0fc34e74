//! Generic key-value contracts.
//!
//! These traits are the seam an indexing engine programs against. [`Store`]
//! and its [`Reader`], [`Writer`] and [`StoreIterator`] are the encrypted
//! implementation; any other engine can slot in behind the same traits.
//!
//! [`Store`]: crate::Store
//! [`Reader`]: crate::Reader
//! [`Writer`]: crate::Writer
//! [`StoreIterator`]: crate::StoreIterator

use crate::batch::{Batch, BatchOptions};
use crate::error::CoreResult;

/// A store that hands out snapshot readers and batch writers.
pub trait KvStore {
    /// Snapshot reader type.
    type Reader: KvReader;
    /// Batch writer type.
    type Writer: KvWriter;

    /// Takes a snapshot of the current state.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    fn reader(&self) -> CoreResult<Self::Reader>;

    /// Returns a writer bound to this store.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    fn writer(&self) -> CoreResult<Self::Writer>;

    /// Flushes and closes the store.
    ///
    /// # Errors
    ///
    /// Fails if the store is already closed or the final flush fails.
    fn close(&self) -> CoreResult<()>;

    /// Reclaims space held by deleted and superseded values.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed or the rewrite fails.
    fn compact(&self) -> CoreResult<()>;
}

/// A read-only view of the store at one point in time.
pub trait KvReader {
    /// Iterator type returned by the range methods.
    type Iter: KvIterator;

    /// Looks up one key.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the encrypted store never fails here.
    fn get(&self, key: &[u8]) -> CoreResult<Option<Vec<u8>>>;

    /// Looks up several keys against the same snapshot.
    ///
    /// # Errors
    ///
    /// Propagates the first error from [`get`](Self::get).
    fn multi_get(&self, keys: &[&[u8]]) -> CoreResult<Vec<Option<Vec<u8>>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Iterates over every key starting with `prefix`, in ascending order.
    fn prefix_iterator(&self, prefix: &[u8]) -> Self::Iter;

    /// Iterates over keys in `[start, end)`; a missing bound is open.
    fn range_iterator(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> Self::Iter;

    /// Releases the snapshot.
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn close(self) -> CoreResult<()>
    where
        Self: Sized;
}

/// Applies batches atomically.
pub trait KvWriter {
    /// Creates an empty batch.
    fn new_batch(&self) -> Batch {
        Batch::new()
    }

    /// Creates an empty batch sized by `options`, plus a zeroed scratch
    /// buffer of `options.total_bytes`.
    fn new_batch_ex(&self, options: BatchOptions) -> (Vec<u8>, Batch) {
        (vec![0u8; options.total_bytes], Batch::with_options(&options))
    }

    /// Applies every op of `batch`, or none of them.
    ///
    /// # Errors
    ///
    /// Fails if a merge is refused, the store is closed, or the batch cannot
    /// be made durable.
    fn execute_batch(&self, batch: &Batch) -> CoreResult<()>;

    /// Releases the writer.
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn close(self) -> CoreResult<()>
    where
        Self: Sized;
}

/// A positioned cursor over a key range.
pub trait KvIterator {
    /// Positions at the first key `>= key` within the iterator's bounds.
    fn seek(&mut self, key: &[u8]);

    /// Moves to the next key.
    fn next(&mut self);

    /// Key and value under the cursor, or `None` once exhausted.
    fn current(&self) -> Option<(&[u8], &[u8])>;

    /// Key under the cursor.
    fn key(&self) -> Option<&[u8]> {
        self.current().map(|(key, _)| key)
    }

    /// Value under the cursor.
    fn value(&self) -> Option<&[u8]> {
        self.current().map(|(_, value)| value)
    }

    /// Returns `true` while the cursor is on a key.
    fn valid(&self) -> bool {
        self.current().is_some()
    }

    /// Releases the iterator.
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn close(self) -> CoreResult<()>
    where
        Self: Sized;
}
