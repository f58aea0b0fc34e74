//! Persistent ordered index.
//!
//! A treap is a binary search tree on keys that is also a max-heap on random
//! node priorities. Nodes are never mutated once linked: `upsert` and
//! `delete` copy the path from the root to the change and share every other
//! subtree with the previous version. A clone of a [`Treap`] is therefore a
//! frozen snapshot that costs one reference count.

use rand::Rng;
use std::cmp::Ordering;
use std::sync::Arc;

type Link = Option<Arc<Node>>;

/// A live key/value pair stored in the treap.
#[derive(Debug, PartialEq, Eq)]
pub struct Entry {
    key: Vec<u8>,
    value: Vec<u8>,
}

impl Entry {
    /// Key bytes.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Value bytes.
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }
}

#[derive(Debug)]
struct Node {
    entry: Arc<Entry>,
    priority: u64,
    left: Link,
    right: Link,
}

impl Node {
    fn with_children(&self, left: Link, right: Link) -> Arc<Self> {
        Arc::new(Self {
            entry: Arc::clone(&self.entry),
            priority: self.priority,
            left,
            right,
        })
    }
}

/// Immutable treap with structural sharing.
#[derive(Debug, Clone, Default)]
pub struct Treap {
    root: Link,
    len: usize,
}

impl Treap {
    /// Creates an empty treap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the treap holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Looks up the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let mut node = self.root.as_deref();
        while let Some(n) = node {
            match key.cmp(n.entry.key()) {
                Ordering::Less => node = n.left.as_deref(),
                Ordering::Greater => node = n.right.as_deref(),
                Ordering::Equal => return Some(n.entry.value()),
            }
        }
        None
    }

    /// Returns a new treap with `key` set to `value`, using a random priority.
    #[must_use]
    pub fn insert(&self, key: Vec<u8>, value: Vec<u8>) -> Self {
        self.upsert(key, value, rand::thread_rng().gen())
    }

    /// Returns a new treap with `key` set to `value`.
    ///
    /// If the key already exists its node keeps its place and priority and
    /// only the entry is swapped, so `priority` is ignored.
    #[must_use]
    pub fn upsert(&self, key: Vec<u8>, value: Vec<u8>, priority: u64) -> Self {
        let entry = Arc::new(Entry { key, value });
        let (root, replaced) = upsert(&self.root, entry, priority);
        Self {
            root: Some(root),
            len: if replaced { self.len } else { self.len + 1 },
        }
    }

    /// Returns a new treap without `key`.
    ///
    /// Deleting an absent key returns a clone that shares everything.
    #[must_use]
    pub fn delete(&self, key: &[u8]) -> Self {
        match delete(&self.root, key) {
            Some(root) => Self {
                root,
                len: self.len - 1,
            },
            None => self.clone(),
        }
    }

    /// Visits entries in ascending key order, starting at the first key
    /// `>= start`, until `visit` returns `false`.
    ///
    /// Returns `false` if the visit was stopped early.
    pub fn visit_ascend<F>(&self, start: &[u8], mut visit: F) -> bool
    where
        F: FnMut(&Entry) -> bool,
    {
        let mut cursor = self.cursor();
        cursor.seek(start);
        while let Some(entry) = cursor.current() {
            if !visit(entry) {
                return false;
            }
            cursor.advance();
        }
        true
    }

    /// Returns a cursor positioned at the smallest key.
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        let mut cursor = Cursor {
            root: self.root.clone(),
            stack: Vec::new(),
        };
        cursor.seek(&[]);
        cursor
    }
}

fn upsert(link: &Link, entry: Arc<Entry>, priority: u64) -> (Arc<Node>, bool) {
    let Some(node) = link else {
        let leaf = Node {
            entry,
            priority,
            left: None,
            right: None,
        };
        return (Arc::new(leaf), false);
    };

    match entry.key().cmp(node.entry.key()) {
        Ordering::Equal => {
            let swapped = Node {
                entry,
                priority: node.priority,
                left: node.left.clone(),
                right: node.right.clone(),
            };
            (Arc::new(swapped), true)
        }
        Ordering::Less => {
            let (left, replaced) = upsert(&node.left, entry, priority);
            let rotated = if left.priority > node.priority {
                // Right rotation: the new left child becomes the subtree root.
                let demoted = node.with_children(left.right.clone(), node.right.clone());
                left.with_children(left.left.clone(), Some(demoted))
            } else {
                node.with_children(Some(left), node.right.clone())
            };
            (rotated, replaced)
        }
        Ordering::Greater => {
            let (right, replaced) = upsert(&node.right, entry, priority);
            let rotated = if right.priority > node.priority {
                let demoted = node.with_children(node.left.clone(), right.left.clone());
                right.with_children(Some(demoted), right.right.clone())
            } else {
                node.with_children(node.left.clone(), Some(right))
            };
            (rotated, replaced)
        }
    }
}

/// Returns the new subtree, or `None` if `key` is absent.
fn delete(link: &Link, key: &[u8]) -> Option<Link> {
    let node = link.as_ref()?;
    match key.cmp(node.entry.key()) {
        Ordering::Less => {
            let left = delete(&node.left, key)?;
            Some(Some(node.with_children(left, node.right.clone())))
        }
        Ordering::Greater => {
            let right = delete(&node.right, key)?;
            Some(Some(node.with_children(node.left.clone(), right)))
        }
        Ordering::Equal => Some(join(&node.left, &node.right)),
    }
}

/// Merges two subtrees where every key in `left` sorts before `right`.
fn join(left: &Link, right: &Link) -> Link {
    match (left, right) {
        (None, _) => right.clone(),
        (_, None) => left.clone(),
        (Some(l), Some(r)) => {
            if l.priority > r.priority {
                Some(l.with_children(l.left.clone(), join(&l.right, right)))
            } else {
                Some(r.with_children(join(left, &r.left), r.right.clone()))
            }
        }
    }
}

/// In-order cursor over a frozen treap root.
///
/// The stack holds the nodes still to be visited on the path to the current
/// entry; the top of the stack is the current entry.
#[derive(Debug, Clone)]
pub struct Cursor {
    root: Link,
    stack: Vec<Arc<Node>>,
}

impl Cursor {
    /// Positions the cursor at the first key `>= key`.
    pub fn seek(&mut self, key: &[u8]) {
        self.stack.clear();
        let mut node = self.root.clone();
        while let Some(n) = node {
            if n.entry.key() >= key {
                node = n.left.clone();
                self.stack.push(n);
            } else {
                node = n.right.clone();
            }
        }
    }

    /// Moves to the next key in ascending order.
    pub fn advance(&mut self) {
        let Some(done) = self.stack.pop() else {
            return;
        };
        let mut node = done.right.clone();
        while let Some(n) = node {
            node = n.left.clone();
            self.stack.push(n);
        }
    }

    /// The entry under the cursor, or `None` once exhausted.
    #[must_use]
    pub fn current(&self) -> Option<&Entry> {
        self.stack.last().map(|node| &*node.entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn collect(treap: &Treap, start: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();
        treap.visit_ascend(start, |entry| {
            out.push((entry.key().to_vec(), entry.value().to_vec()));
            true
        });
        out
    }

    fn keys(treap: &Treap) -> Vec<Vec<u8>> {
        collect(treap, b"").into_iter().map(|(k, _)| k).collect()
    }

    fn build(pairs: &[(&str, &str)]) -> Treap {
        pairs.iter().fold(Treap::new(), |t, (k, v)| {
            t.insert(k.as_bytes().to_vec(), v.as_bytes().to_vec())
        })
    }

    #[test]
    fn empty_treap() {
        let treap = Treap::new();
        assert!(treap.is_empty());
        assert_eq!(treap.len(), 0);
        assert!(treap.get(b"a").is_none());
        assert!(treap.cursor().current().is_none());
    }

    #[test]
    fn insert_and_get() {
        let treap = build(&[("b", "2"), ("a", "1"), ("c", "3")]);
        assert_eq!(treap.get(b"a"), Some(&b"1"[..]));
        assert_eq!(treap.get(b"c"), Some(&b"3"[..]));
        assert!(treap.get(b"d").is_none());
        assert_eq!(treap.len(), 3);
    }

    #[test]
    fn upsert_replaces_without_growing() {
        let treap = build(&[("a", "1"), ("b", "2")]);
        let updated = treap.insert(b"a".to_vec(), b"9".to_vec());

        assert_eq!(updated.len(), 2);
        assert_eq!(updated.get(b"a"), Some(&b"9"[..]));
        // The older version is untouched.
        assert_eq!(treap.get(b"a"), Some(&b"1"[..]));
    }

    #[test]
    fn delete_removes_only_target() {
        let treap = build(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let smaller = treap.delete(b"b");

        assert_eq!(keys(&smaller), vec![b"a".to_vec(), b"c".to_vec()]);
        assert_eq!(smaller.len(), 2);
        assert_eq!(treap.len(), 3);
        assert!(treap.get(b"b").is_some());
    }

    #[test]
    fn delete_absent_key_is_noop() {
        let treap = build(&[("a", "1")]);
        let same = treap.delete(b"zzz");
        assert_eq!(same.len(), 1);
        assert_eq!(keys(&same), keys(&treap));
    }

    #[test]
    fn ascend_from_start_key() {
        let treap = build(&[("a", ""), ("ab", ""), ("abc", ""), ("abd", ""), ("b", "")]);
        let from_ab: Vec<_> = collect(&treap, b"ab").into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            from_ab,
            vec![b"ab".to_vec(), b"abc".to_vec(), b"abd".to_vec(), b"b".to_vec()]
        );
        // Start between keys.
        assert_eq!(collect(&treap, b"abca")[0].0, b"abd");
        assert!(collect(&treap, b"c").is_empty());
    }

    #[test]
    fn ascend_stops_early() {
        let treap = build(&[("a", ""), ("b", ""), ("c", "")]);
        let mut seen = 0;
        let finished = treap.visit_ascend(b"", |_| {
            seen += 1;
            seen < 2
        });
        assert!(!finished);
        assert_eq!(seen, 2);
    }

    #[test]
    fn cursor_seek_and_advance() {
        let treap = build(&[("k1", "v1"), ("k3", "v3"), ("k5", "v5")]);
        let mut cursor = treap.cursor();
        assert_eq!(cursor.current().unwrap().key(), b"k1");

        cursor.seek(b"k2");
        assert_eq!(cursor.current().unwrap().key(), b"k3");
        cursor.advance();
        assert_eq!(cursor.current().unwrap().value(), b"v5");
        cursor.advance();
        assert!(cursor.current().is_none());
        cursor.advance();
        assert!(cursor.current().is_none());
    }

    #[test]
    fn cursor_survives_later_writes() {
        let treap = build(&[("a", "1"), ("b", "2")]);
        let mut cursor = treap.cursor();
        let _newer = treap.delete(b"b").insert(b"c".to_vec(), b"3".to_vec());

        cursor.advance();
        assert_eq!(cursor.current().unwrap().key(), b"b");
    }

    #[test]
    fn fixed_priorities_keep_heap_order() {
        // Ascending priorities force a rotation on every insert.
        let treap = (0u8..50).fold(Treap::new(), |t, i| {
            t.upsert(vec![i], vec![i], u64::from(i))
        });
        let root = treap.root.as_ref().unwrap();
        assert_eq!(root.priority, 49);
        assert_eq!(treap.len(), 50);
        assert_eq!(keys(&treap), (0u8..50).map(|i| vec![i]).collect::<Vec<_>>());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Put(Vec<u8>, Vec<u8>),
        Delete(Vec<u8>),
    }

    fn op() -> impl Strategy<Value = Op> {
        let key = prop::collection::vec(0u8..4, 0..4);
        prop_oneof![
            (key.clone(), prop::collection::vec(any::<u8>(), 0..4)).prop_map(|(k, v)| Op::Put(k, v)),
            key.prop_map(Op::Delete),
        ]
    }

    proptest! {
        #[test]
        fn prop_matches_btreemap_model(ops in prop::collection::vec(op(), 0..200)) {
            let mut treap = Treap::new();
            let mut model = BTreeMap::new();
            for op in ops {
                match op {
                    Op::Put(k, v) => {
                        treap = treap.insert(k.clone(), v.clone());
                        model.insert(k, v);
                    }
                    Op::Delete(k) => {
                        treap = treap.delete(&k);
                        model.remove(&k);
                    }
                }
            }

            let expected: Vec<_> = model.into_iter().collect();
            prop_assert_eq!(treap.len(), expected.len());
            prop_assert_eq!(collect(&treap, b""), expected);
        }
    }
}
