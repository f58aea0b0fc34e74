//! Decrypted page cache for the encrypted paged file.

use std::collections::{HashMap, VecDeque};

/// How many decrypted pages an [`crate::EncryptedPagedFile`] keeps in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageCacheConfig {
    /// Every read decrypts from the physical medium.
    #[default]
    Disabled,
    /// Cache every page ever touched, for the lifetime of the file.
    Unbounded,
    /// Cache up to this many pages, evicting the oldest insertion first.
    Capped(usize),
}

/// Page ID → decrypted payload map with optional FIFO eviction.
#[derive(Debug, Default)]
pub struct PageCache {
    pages: HashMap<u64, Vec<u8>>,
    order: VecDeque<u64>,
    capacity: Option<usize>,
}

impl PageCache {
    /// Creates a cache that never evicts.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Creates a cache holding at most `capacity` pages.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pages: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity: Some(capacity),
        }
    }

    /// Builds the cache described by `config`, or `None` if caching is off.
    #[must_use]
    pub fn from_config(config: PageCacheConfig) -> Option<Self> {
        match config {
            PageCacheConfig::Disabled => None,
            PageCacheConfig::Unbounded => Some(Self::unbounded()),
            PageCacheConfig::Capped(capacity) => Some(Self::with_capacity(capacity)),
        }
    }

    /// Returns the cached payload for `page_id`.
    #[must_use]
    pub fn get(&self, page_id: u64) -> Option<&[u8]> {
        self.pages.get(&page_id).map(Vec::as_slice)
    }

    /// Inserts or replaces the payload for `page_id`.
    pub fn insert(&mut self, page_id: u64, payload: Vec<u8>) {
        if self.capacity == Some(0) {
            return;
        }
        if self.pages.insert(page_id, payload).is_none() {
            self.order.push_back(page_id);
        }
        if let Some(capacity) = self.capacity {
            while self.pages.len() > capacity {
                match self.order.pop_front() {
                    Some(oldest) => {
                        self.pages.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
    }

    /// Drops every page with an ID at or beyond `page_count`.
    pub fn truncate(&mut self, page_count: u64) {
        self.pages.retain(|&id, _| id < page_count);
        self.order.retain(|&id| id < page_count);
    }

    /// Number of cached pages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
