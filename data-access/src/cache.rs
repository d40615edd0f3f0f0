//! Bounded memoization caches
//!
//! Fixed-capacity maps with deterministic eviction, shared by the metadata
//! orchestrator and the tag suggestion engine.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Which entry goes when the cache is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Oldest insertion is evicted; reads do not reorder
    #[default]
    Fifo,
    /// Least recently read or written entry is evicted
    Lru,
}

/// Fixed-capacity map with FIFO or LRU eviction
pub struct BoundedCache<K, V> {
    entries: HashMap<K, V>,
    order: VecDeque<K>,
    capacity: usize,
    policy: EvictionPolicy,
}

impl<K: Eq + Hash + Clone, V: Clone> BoundedCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self::with_policy(capacity, EvictionPolicy::Fifo)
    }

    pub fn with_policy(capacity: usize, policy: EvictionPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
            policy,
        }
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        let value = self.entries.get(key).cloned()?;
        if self.policy == EvictionPolicy::Lru {
            self.promote(key);
        }
        Some(value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: K, value: V) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key.clone(), value);
            if self.policy == EvictionPolicy::Lru {
                self.promote(&key);
            }
            return;
        }

        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }

        self.entries.insert(key.clone(), value);
        self.order.push_back(key);
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn promote(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }
}

/// Thread-safe handle around a [`BoundedCache`]
///
/// Cloning shares the underlying map. The lock is held only for the map
/// operation itself, never across the computation that produces a value.
pub struct SharedCache<K, V> {
    inner: Arc<Mutex<BoundedCache<K, V>>>,
}

impl<K, V> Clone for SharedCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> SharedCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self::with_policy(capacity, EvictionPolicy::Fifo)
    }

    pub fn with_policy(capacity: usize, policy: EvictionPolicy) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BoundedCache::with_policy(capacity, policy))),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().await.get(key)
    }

    pub async fn insert(&self, key: K, value: V) {
        self.inner.lock().await.insert(key, value);
    }

    pub async fn invalidate(&self, key: &K) -> Option<V> {
        self.inner.lock().await.remove(key)
    }

    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        let cache = self.inner.lock().await;
        CacheStats {
            len: cache.len(),
            capacity: cache.capacity(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub len: usize,
    pub capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_cache_basic() {
        let mut cache: BoundedCache<String, i32> = BoundedCache::new(3);

        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        cache.insert("c".to_string(), 3);

        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.get(&"b".to_string()), Some(2));
        assert_eq!(cache.get(&"c".to_string()), Some(3));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_fifo_eviction_ignores_reads() {
        let mut cache: BoundedCache<String, i32> = BoundedCache::new(2);

        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        cache.get(&"a".to_string());
        cache.insert("c".to_string(), 3); // evicts "a" regardless of the read

        assert_eq!(cache.get(&"a".to_string()), None);
        assert_eq!(cache.get(&"b".to_string()), Some(2));
        assert_eq!(cache.get(&"c".to_string()), Some(3));
    }

    #[test]
    fn test_lru_eviction_follows_access_order() {
        let mut cache: BoundedCache<String, i32> = BoundedCache::with_policy(2, EvictionPolicy::Lru);

        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        cache.get(&"a".to_string());
        cache.insert("c".to_string(), 3); // evicts "b"

        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.get(&"b".to_string()), None);
        assert_eq!(cache.get(&"c".to_string()), Some(3));
    }

    #[test]
    fn test_overwrite_keeps_single_entry() {
        let mut cache: BoundedCache<&str, i32> = BoundedCache::new(2);
        cache.insert("a", 1);
        cache.insert("a", 2);
        cache.insert("b", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), Some(2));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut cache: BoundedCache<&str, i32> = BoundedCache::new(0);
        cache.insert("a", 1);
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_shared_cache_is_shared_between_clones() {
        let cache: SharedCache<String, String> = SharedCache::new(10);
        let other = cache.clone();

        cache.insert("https://example.com".to_string(), "Example".to_string()).await;
        assert_eq!(other.get(&"https://example.com".to_string()).await, Some("Example".to_string()));

        other.invalidate(&"https://example.com".to_string()).await;
        assert!(cache.get(&"https://example.com".to_string()).await.is_none());
        assert_eq!(cache.stats().await, CacheStats { len: 0, capacity: 10 });
    }
}
