//! Snapshot readers.

use crate::error::CoreResult;
use crate::iterator::StoreIterator;
use crate::kv::KvReader;
use crate::treap::Treap;

/// A stable view of the store as of [`crate::Store::reader`].
///
/// The reader owns its treap root, so it keeps working after the store is
/// written to or closed.
#[derive(Debug, Clone)]
pub struct Reader {
    root: Treap,
}

impl Reader {
    pub(crate) fn new(root: Treap) -> Self {
        Self { root }
    }

    /// Number of live keys in this snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.root.len()
    }

    /// Returns `true` if this snapshot holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

impl KvReader for Reader {
    type Iter = StoreIterator;

    fn get(&self, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        Ok(self.root.get(key).map(<[u8]>::to_vec))
    }

    fn prefix_iterator(&self, prefix: &[u8]) -> StoreIterator {
        StoreIterator::prefix(&self.root, prefix)
    }

    fn range_iterator(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> StoreIterator {
        StoreIterator::range(&self.root, start, end)
    }

    fn close(self) -> CoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::KvIterator;

    fn reader() -> Reader {
        let root = Treap::new()
            .insert(b"k1".to_vec(), b"v1".to_vec())
            .insert(b"k2".to_vec(), b"v2".to_vec());
        Reader::new(root)
    }

    #[test]
    fn get_and_multi_get() {
        let reader = reader();
        assert_eq!(reader.get(b"k1").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(reader.get(b"nope").unwrap(), None);

        let values = reader.multi_get(&[&b"k2"[..], b"k3", b"k1"]).unwrap();
        assert_eq!(values, vec![Some(b"v2".to_vec()), None, Some(b"v1".to_vec())]);
        assert_eq!(reader.len(), 2);
    }

    #[test]
    fn iterators_share_the_snapshot() {
        let reader = reader();
        let mut iter = reader.range_iterator(Some(&b"k2"[..]), None);
        assert_eq!(iter.key(), Some(&b"k2"[..]));
        iter.next();
        assert!(!iter.valid());
        iter.close().unwrap();
        reader.close().unwrap();
    }
}
