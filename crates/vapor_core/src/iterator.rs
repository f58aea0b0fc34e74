//! Bounded iteration over a reader's snapshot.

use crate::error::CoreResult;
use crate::kv::KvIterator;
use crate::treap::{Cursor, Treap};

/// Cursor over one snapshot, restricted to `[lower, upper)`.
///
/// Traversal is synchronous: the iterator owns a frozen treap root, so
/// writes committed after it was created are never observed and dropping
/// it releases everything.
#[derive(Debug, Clone)]
pub struct StoreIterator {
    cursor: Cursor,
    lower: Vec<u8>,
    upper: Option<Vec<u8>>,
    exhausted: bool,
}

impl StoreIterator {
    /// Iterates over every key starting with `prefix`.
    #[must_use]
    pub fn prefix(root: &Treap, prefix: &[u8]) -> Self {
        Self::bounded(root, prefix.to_vec(), prefix_successor(prefix))
    }

    /// Iterates over `[start, end)`; `None` leaves that side open.
    #[must_use]
    pub fn range(root: &Treap, start: Option<&[u8]>, end: Option<&[u8]>) -> Self {
        Self::bounded(
            root,
            start.unwrap_or_default().to_vec(),
            end.map(<[u8]>::to_vec),
        )
    }

    fn bounded(root: &Treap, lower: Vec<u8>, upper: Option<Vec<u8>>) -> Self {
        let mut iter = Self {
            cursor: root.cursor(),
            lower,
            upper,
            exhausted: false,
        };
        let start = iter.lower.clone();
        iter.seek(&start);
        iter
    }

    fn past_upper(&self, key: &[u8]) -> bool {
        self.upper.as_deref().is_some_and(|upper| key >= upper)
    }
}

impl KvIterator for StoreIterator {
    fn seek(&mut self, key: &[u8]) {
        if self.past_upper(key) {
            self.exhausted = true;
            return;
        }
        self.exhausted = false;
        let target = if key < self.lower.as_slice() {
            self.lower.as_slice()
        } else {
            key
        };
        self.cursor.seek(target);
    }

    fn next(&mut self) {
        if !self.exhausted {
            self.cursor.advance();
        }
    }

    fn current(&self) -> Option<(&[u8], &[u8])> {
        if self.exhausted {
            return None;
        }
        let entry = self.cursor.current()?;
        if self.past_upper(entry.key()) {
            return None;
        }
        Some((entry.key(), entry.value()))
    }

    fn close(self) -> CoreResult<()> {
        Ok(())
    }
}

/// Smallest key greater than every key starting with `prefix`.
///
/// Increments the last byte below 0xFF and drops everything after it.
/// Returns `None` when no such key exists (empty or all-0xFF prefix).
#[must_use]
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.pop() {
        if last < 0xFF {
            upper.push(last + 1);
            return Some(upper);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn treap(keys: &[&str]) -> Treap {
        keys.iter().fold(Treap::new(), |t, k| {
            t.insert(k.as_bytes().to_vec(), k.to_uppercase().into_bytes())
        })
    }

    fn drain(mut iter: StoreIterator) -> Vec<String> {
        let mut out = Vec::new();
        while let Some((key, _)) = iter.current() {
            out.push(String::from_utf8(key.to_vec()).unwrap());
            iter.next();
        }
        out
    }

    #[test]
    fn successor_of_prefix() {
        assert_eq!(prefix_successor(b"ab"), Some(b"ac".to_vec()));
        assert_eq!(prefix_successor(b"a\xFF"), Some(b"b".to_vec()));
        assert_eq!(prefix_successor(b"\xFF\xFF"), None);
        assert_eq!(prefix_successor(b""), None);
    }

    #[test]
    fn prefix_iteration_is_ordered_and_bounded() {
        let root = treap(&["a", "ab", "abc", "abd", "b"]);
        assert_eq!(drain(StoreIterator::prefix(&root, b"ab")), ["ab", "abc", "abd"]);
        assert_eq!(drain(StoreIterator::prefix(&root, b"")).len(), 5);
        assert!(drain(StoreIterator::prefix(&root, b"z")).is_empty());
    }

    #[test]
    fn all_ff_prefix_is_unbounded_above() {
        let root = Treap::new()
            .insert(vec![0xFF], b"1".to_vec())
            .insert(vec![0xFF, 0xFF, 0x01], b"2".to_vec())
            .insert(vec![0xFE], b"0".to_vec());
        let mut iter = StoreIterator::prefix(&root, &[0xFF]);
        assert_eq!(iter.key(), Some(&[0xFF][..]));
        iter.next();
        assert_eq!(iter.value(), Some(&b"2"[..]));
        iter.next();
        assert!(!iter.valid());
    }

    #[test]
    fn range_is_half_open() {
        let root = treap(&["a", "b", "c", "d"]);
        assert_eq!(drain(StoreIterator::range(&root, Some(&b"b"[..]), Some(&b"d"[..]))), ["b", "c"]);
        assert_eq!(drain(StoreIterator::range(&root, None, Some(&b"b"[..]))), ["a"]);
        assert_eq!(drain(StoreIterator::range(&root, Some(&b"c"[..]), None)), ["c", "d"]);
        assert!(drain(StoreIterator::range(&root, Some(&b"d"[..]), Some(&b"a"[..]))).is_empty());
    }

    #[test]
    fn seek_clamps_into_bounds() {
        let root = treap(&["a", "ab", "abc", "abd", "b"]);
        let mut iter = StoreIterator::prefix(&root, b"ab");

        iter.seek(b"abd");
        assert_eq!(iter.key(), Some(&b"abd"[..]));
        assert_eq!(iter.value(), Some(&b"ABD"[..]));

        // Below the lower bound snaps to the first key in range.
        iter.seek(b"a");
        assert_eq!(iter.key(), Some(&b"ab"[..]));

        // At or past the upper bound exhausts the iterator.
        iter.seek(b"ac");
        assert!(!iter.valid());
        iter.next();
        assert!(!iter.valid());

        // And a later seek back into range revives it.
        iter.seek(b"abc");
        assert_eq!(iter.key(), Some(&b"abc"[..]));
    }

    #[test]
    fn iterator_is_a_snapshot() {
        let root = treap(&["a", "b"]);
        let iter = StoreIterator::prefix(&root, b"");
        let _newer = root.insert(b"aa".to_vec(), b"x".to_vec());
        assert_eq!(drain(iter), ["a", "b"]);
    }
}
