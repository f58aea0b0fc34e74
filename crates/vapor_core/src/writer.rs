//! Batch writers.

use crate::batch::Batch;
use crate::error::CoreResult;
use crate::kv::KvWriter;
use crate::store::Store;

/// Applies batches to the store it was created from.
///
/// Writers are cheap handles; any number may exist, and their batches are
/// committed one at a time.
#[derive(Debug, Clone)]
pub struct Writer {
    store: Store,
}

impl Writer {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }
}

impl KvWriter for Writer {
    fn execute_batch(&self, batch: &Batch) -> CoreResult<()> {
        self.store.execute_batch(batch)
    }

    fn close(self) -> CoreResult<()> {
        self.store.ensure_open()
    }
}
