//! LRU read cache in front of another store
//!
//! Reads are served from a bounded LRU map when possible. Writes go through
//! to the inner store first and then invalidate the cache.
//!
//! ## Coherence
//!
//! The cache carries a generation counter that every invalidation bumps. A
//! miss records the generation before it reads the inner store and only
//! caches the result if the generation is still the same afterwards. A value
//! read before a concurrent write therefore cannot land in the cache once
//! that write has returned.

use crate::error::Result;
use crate::lru::LruCache;
use crate::store::{KvStore, Snapshot};
use crate::types::{KvKey, KvValue};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default cache capacity (entries)
pub const DEFAULT_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(128) {
    Some(capacity) => capacity,
    None => panic!("cache capacity must be non-zero"),
};

/// What a write drops from the cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationPolicy {
    /// Drop every cached entry on any write
    #[default]
    ClearAll,
    /// Drop only the written key
    Key,
}

/// Cache counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
}

struct CacheState {
    lru: LruCache<String, KvValue>,
    generation: u64,
}

/// Write-through store decorator with an LRU read cache
pub struct CachingStore<S> {
    inner: S,
    state: Mutex<CacheState>,
    policy: InvalidationPolicy,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

impl<S: KvStore> CachingStore<S> {
    /// Wrap `inner` with a cache of the default capacity (128)
    pub fn new(inner: S) -> Self {
        Self::with_capacity(inner, DEFAULT_CACHE_CAPACITY)
    }

    /// Wrap `inner` with a cache holding at most `capacity` entries
    pub fn with_capacity(inner: S, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            state: Mutex::new(CacheState {
                lru: LruCache::new(capacity),
                generation: 0,
            }),
            policy: InvalidationPolicy::default(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Set the invalidation policy
    pub fn with_policy(mut self, policy: InvalidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn policy(&self) -> InvalidationPolicy {
        self.policy
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.state.lock().lru.capacity()
    }

    /// Number of entries currently cached
    pub fn cached_len(&self) -> usize {
        self.state.lock().lru.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }

    fn invalidate(&self, key: &KvKey) {
        let mut state = self.state.lock();
        state.generation = state.generation.wrapping_add(1);
        match self.policy {
            InvalidationPolicy::ClearAll => state.lru.clear(),
            InvalidationPolicy::Key => {
                state.lru.remove(key.as_str());
            }
        }
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }
}

impl<S: KvStore> KvStore for CachingStore<S> {
    fn set(&self, key: &KvKey, value: KvValue) -> Result<()> {
        let result = self.inner.set(key, value);
        self.invalidate(key);
        result
    }

    fn get(&self, key: &KvKey) -> Option<KvValue> {
        let generation = {
            let mut state = self.state.lock();
            if let Some(value) = state.lru.get(key.as_str()) {
                let value = value.clone();
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(value);
            }
            state.generation
        };
        self.misses.fetch_add(1, Ordering::Relaxed);

        let value = self.inner.get(key)?;

        let mut state = self.state.lock();
        // A write landed while we were reading; don't cache what we saw
        if state.generation == generation
            && state
                .lru
                .put(key.as_str().to_string(), value.clone())
                .is_some()
        {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }

        Some(value)
    }

    fn delete(&self, key: &KvKey) -> Result<Option<KvValue>> {
        let result = self.inner.delete(key);
        self.invalidate(key);
        result
    }

    fn all(&self) -> Snapshot {
        self.inner.all()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn flush(&self) -> Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn key(s: &str) -> KvKey {
        KvKey::new(s).unwrap()
    }

    fn capacity(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    /// Counts inner reads and can run a hook right after a read
    #[derive(Default)]
    struct ProbeStore {
        data: InMemoryStore,
        gets: AtomicUsize,
        after_get: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    }

    impl KvStore for ProbeStore {
        fn set(&self, key: &KvKey, value: KvValue) -> Result<()> {
            self.data.set(key, value)
        }

        fn get(&self, key: &KvKey) -> Option<KvValue> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            let value = self.data.get(key);
            let hook = self.after_get.lock().take();
            if let Some(hook) = hook {
                hook();
            }
            value
        }

        fn delete(&self, key: &KvKey) -> Result<Option<KvValue>> {
            self.data.delete(key)
        }

        fn all(&self) -> Snapshot {
            self.data.all()
        }
    }

    #[test]
    fn test_hit_skips_inner_store() {
        let probe = Arc::new(ProbeStore::default());
        let cache = CachingStore::new(Arc::clone(&probe));

        cache.set(&key("a"), KvValue::from("1")).unwrap();
        assert_eq!(cache.get(&key("a")), Some(KvValue::from("1")));
        assert_eq!(cache.get(&key("a")), Some(KvValue::from("1")));
        assert_eq!(cache.get(&key("a")), Some(KvValue::from("1")));

        assert_eq!(probe.gets.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_absent_values_are_not_cached() {
        let probe = Arc::new(ProbeStore::default());
        let cache = CachingStore::new(Arc::clone(&probe));

        assert_eq!(cache.get(&key("ghost")), None);
        assert_eq!(cache.get(&key("ghost")), None);
        assert_eq!(cache.cached_len(), 0);
        assert_eq!(probe.gets.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_set_then_get_is_never_stale() {
        let cache = CachingStore::new(InMemoryStore::new());

        cache.set(&key("a"), KvValue::from("1")).unwrap();
        assert_eq!(cache.get(&key("a")), Some(KvValue::from("1")));

        cache.set(&key("a"), KvValue::from("2")).unwrap();
        assert_eq!(cache.get(&key("a")), Some(KvValue::from("2")));

        cache.delete(&key("a")).unwrap();
        assert_eq!(cache.get(&key("a")), None);
    }

    #[test]
    fn test_clear_all_policy_drops_everything() {
        let cache = CachingStore::new(InMemoryStore::new());
        cache.set(&key("a"), KvValue::Int(1)).unwrap();
        cache.set(&key("b"), KvValue::Int(2)).unwrap();
        cache.get(&key("a"));
        cache.get(&key("b"));
        assert_eq!(cache.cached_len(), 2);

        cache.set(&key("c"), KvValue::Int(3)).unwrap();
        assert_eq!(cache.cached_len(), 0);
    }

    #[test]
    fn test_key_policy_keeps_other_entries() {
        let cache =
            CachingStore::new(InMemoryStore::new()).with_policy(InvalidationPolicy::Key);
        cache.set(&key("a"), KvValue::Int(1)).unwrap();
        cache.set(&key("b"), KvValue::Int(2)).unwrap();
        cache.get(&key("a"));
        cache.get(&key("b"));

        cache.set(&key("b"), KvValue::Int(20)).unwrap();
        assert_eq!(cache.cached_len(), 1);
        assert_eq!(cache.get(&key("a")), Some(KvValue::Int(1)));
        assert_eq!(cache.get(&key("b")), Some(KvValue::Int(20)));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_eviction_at_capacity() {
        let probe = Arc::new(ProbeStore::default());
        let cache = CachingStore::with_capacity(Arc::clone(&probe), capacity(2));
        for (k, v) in [("a", 1), ("b", 2), ("c", 3)] {
            cache.set(&key(k), KvValue::Int(v)).unwrap();
        }

        cache.get(&key("a"));
        cache.get(&key("b"));
        cache.get(&key("a")); // refresh a, b is now LRU
        cache.get(&key("c")); // evicts b

        assert_eq!(cache.cached_len(), 2);
        assert_eq!(cache.stats().evictions, 1);

        let before = probe.gets.load(Ordering::SeqCst);
        cache.get(&key("a"));
        assert_eq!(probe.gets.load(Ordering::SeqCst), before);
        cache.get(&key("b"));
        assert_eq!(probe.gets.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn test_read_racing_a_write_is_not_cached() {
        let probe = Arc::new(ProbeStore::default());
        let cache = Arc::new(CachingStore::new(Arc::clone(&probe)));
        probe.set(&key("k"), KvValue::from("old")).unwrap();

        // The write completes after the inner read but before the miss
        // would insert into the cache.
        let writer = Arc::clone(&cache);
        *probe.after_get.lock() = Some(Box::new(move || {
            writer.set(&key("k"), KvValue::from("new")).unwrap();
        }));

        assert_eq!(cache.get(&key("k")), Some(KvValue::from("old")));
        assert_eq!(cache.get(&key("k")), Some(KvValue::from("new")));
        assert_eq!(cache.get(&key("k")), Some(KvValue::from("new")));
    }

    #[test]
    fn test_all_bypasses_cache() {
        let probe = Arc::new(ProbeStore::default());
        let cache = CachingStore::with_capacity(Arc::clone(&probe), capacity(1));
        for i in 0..5 {
            cache.set(&key(&format!("k{}", i)), KvValue::Int(i)).unwrap();
        }

        let all = cache.all();
        assert_eq!(all.len(), 5);
        assert_eq!(cache.len(), 5);
        assert_eq!(probe.gets.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_concurrent_readers_and_writers_converge() {
        use std::thread;

        let cache = Arc::new(
            CachingStore::with_capacity(InMemoryStore::new(), capacity(8))
                .with_policy(InvalidationPolicy::Key),
        );

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..200 {
                        let k = key(&format!("k{}", i % 10));
                        if t % 2 == 0 {
                            cache.set(&k, KvValue::Int(i)).unwrap();
                        } else {
                            cache.get(&k);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // Once writers are done, every read agrees with the inner store
        for i in 0..10 {
            let k = key(&format!("k{}", i));
            assert_eq!(cache.get(&k), cache.inner().get(&k));
        }
    }
}
