//! Write batches.

use std::collections::BTreeMap;

/// One buffered set or delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Set `key` to `value`.
    Set {
        /// Key bytes.
        key: Vec<u8>,
        /// Value bytes.
        value: Vec<u8>,
    },
    /// Remove `key`.
    Delete {
        /// Key bytes.
        key: Vec<u8>,
    },
}

impl BatchOp {
    /// The key this op touches.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Set { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// Buffered mutations applied atomically by a writer.
///
/// Sets and deletes are applied in insertion order. Merge operands are
/// grouped per key and resolved before any set or delete, in ascending key
/// order.
///
/// # Example
///
/// ```rust
/// use vapor_core::Batch;
///
/// let mut batch = Batch::new();
/// batch.set(b"k1", b"v1");
/// batch.merge(b"counter", b"+1");
/// batch.delete(b"old");
/// assert_eq!(batch.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Batch {
    ops: Vec<BatchOp>,
    merges: BTreeMap<Vec<u8>, Vec<Vec<u8>>>,
}

impl Batch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers a set.
    pub fn set(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) {
        self.ops.push(BatchOp::Set {
            key: key.as_ref().to_vec(),
            value: value.as_ref().to_vec(),
        });
    }

    /// Buffers a delete.
    pub fn delete(&mut self, key: impl AsRef<[u8]>) {
        self.ops.push(BatchOp::Delete {
            key: key.as_ref().to_vec(),
        });
    }

    /// Appends a merge operand for `key`.
    pub fn merge(&mut self, key: impl AsRef<[u8]>, operand: impl AsRef<[u8]>) {
        self.merges
            .entry(key.as_ref().to_vec())
            .or_default()
            .push(operand.as_ref().to_vec());
    }

    /// Drops every buffered op and operand.
    pub fn reset(&mut self) {
        self.ops.clear();
        self.merges.clear();
    }

    /// Number of buffered sets, deletes and merge operands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len() + self.merges.values().map(Vec::len).sum::<usize>()
    }

    /// Returns `true` if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.merges.is_empty()
    }

    /// Sets and deletes in insertion order.
    #[must_use]
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Merge operands grouped by key.
    #[must_use]
    pub fn merges(&self) -> &BTreeMap<Vec<u8>, Vec<Vec<u8>>> {
        &self.merges
    }
}

/// Size hints for [`crate::KvWriter::new_batch_ex`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Size of the scratch buffer handed back with the batch.
    pub total_bytes: usize,
    /// Expected number of sets.
    pub num_sets: usize,
    /// Expected number of deletes.
    pub num_deletes: usize,
    /// Expected number of merge operands.
    pub num_merges: usize,
}

impl Batch {
    /// Creates an empty batch with room for the ops described by `options`.
    #[must_use]
    pub fn with_options(options: &BatchOptions) -> Self {
        Self {
            ops: Vec::with_capacity(options.num_sets + options.num_deletes),
            merges: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ops_keep_insertion_order() {
        let mut batch = Batch::new();
        batch.set(b"b", b"1");
        batch.delete(b"a");
        batch.set(b"a", b"2");

        let keys: Vec<_> = batch.ops().iter().map(BatchOp::key).collect();
        assert_eq!(keys, vec![&b"b"[..], b"a", b"a"]);
    }

    #[test]
    fn merges_group_by_key() {
        let mut batch = Batch::new();
        batch.merge(b"z", b"1");
        batch.merge(b"a", b"2");
        batch.merge(b"z", b"3");

        let grouped: Vec<_> = batch.merges().iter().collect();
        assert_eq!(grouped[0].0, b"a");
        assert_eq!(grouped[1].1, &vec![b"1".to_vec(), b"3".to_vec()]);
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn reset_empties_batch() {
        let mut batch = Batch::new();
        batch.set(b"k", b"v");
        batch.merge(b"m", b"1");
        assert!(!batch.is_empty());

        batch.reset();
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }

    #[test]
    fn with_options_starts_empty() {
        let options = BatchOptions {
            total_bytes: 64,
            num_sets: 4,
            num_deletes: 2,
            num_merges: 1,
        };
        assert!(Batch::with_options(&options).is_empty());
    }
}
