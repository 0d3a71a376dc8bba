//! In-memory store with LRU eviction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use super::{Store, StoreError, StoreFactory};

/// Default capacity: 256 MB.
pub const DEFAULT_MEMORY_STORE_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    last_accessed: Instant,
}

impl Entry {
    fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            last_accessed: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    size_bytes: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Snapshot of memory store usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStoreStats {
    pub entries: usize,
    pub size_bytes: usize,
    pub max_size_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Shared in-process store.
///
/// Clones share the same contents, so each clone acts as a connection.
/// When an insert would exceed the size limit the least recently accessed
/// entries are evicted first.
///
/// # Example
///
/// ```
/// use tilepipe::store::{MemoryStore, Store};
///
/// let store = MemoryStore::new(1024);
/// let mut conn = store.clone();
/// conn.set("k", vec![1, 2, 3]).unwrap();
/// assert_eq!(store.clone().get("k").unwrap(), Some(vec![1, 2, 3]));
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    max_size_bytes: usize,
}

impl MemoryStore {
    /// Creates a store holding at most `max_size_bytes` of values.
    pub fn new(max_size_bytes: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            max_size_bytes,
        }
    }

    /// Returns a factory whose connections all share this store.
    pub fn factory(&self) -> StoreFactory {
        let store = self.clone();
        Arc::new(move || Ok(Box::new(store.clone()) as Box<dyn Store>))
    }

    pub fn stats(&self) -> MemoryStoreStats {
        let inner = self.inner.lock();
        MemoryStoreStats {
            entries: inner.entries.len(),
            size_bytes: inner.size_bytes,
            max_size_bytes: self.max_size_bytes,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.size_bytes = 0;
    }

    /// Evicts least recently accessed entries until `required` more bytes fit.
    fn evict_for(&self, inner: &mut Inner, required: usize) {
        if inner.size_bytes + required <= self.max_size_bytes {
            return;
        }
        let target = self.max_size_bytes - required;

        let mut candidates: Vec<(String, Instant, usize)> = inner
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.last_accessed, v.data.len()))
            .collect();
        candidates.sort_by_key(|(_, accessed, _)| *accessed);

        let mut evicted = 0;
        for (key, _, size) in candidates {
            if inner.size_bytes <= target {
                break;
            }
            inner.entries.remove(&key);
            inner.size_bytes -= size;
            evicted += 1;
        }

        inner.evictions += evicted;
        debug!(
            evicted,
            size_bytes = inner.size_bytes,
            "Evicted memory store entries"
        );
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_STORE_BYTES)
    }
}

impl Store for MemoryStore {
    fn set(&mut self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        if value.len() > self.max_size_bytes {
            return Err(StoreError::ValueTooLarge {
                size: value.len(),
                max: self.max_size_bytes,
            });
        }

        let mut inner = self.inner.lock();
        if let Some(previous) = inner.entries.remove(key) {
            inner.size_bytes -= previous.data.len();
        }
        self.evict_for(&mut inner, value.len());
        inner.size_bytes += value.len();
        inner.entries.insert(key.to_string(), Entry::new(value));
        Ok(())
    }

    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut inner = self.inner.lock();
        let data = inner.entries.get_mut(key).map(|entry| {
            entry.touch();
            entry.data.clone()
        });
        match data {
            Some(_) => inner.hits += 1,
            None => inner.misses += 1,
        }
        Ok(data)
    }

    fn exists(&mut self, key: &str) -> Result<bool, StoreError> {
        Ok(self.inner.lock().entries.contains_key(key))
    }
}
