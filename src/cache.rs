//! Query Cache (C3): process-local LRU+TTL caching for search and facet
//! results.
//!
//! Grounded in `original_source/src/query_cache.py`'s `LRUCache`/
//! `QueryCache`. No external `lru` crate dependency is introduced here —
//! the teacher repo already shows the house style of hand-rolling small
//! data-structure concerns (its own trigram index, roaring-bitmap
//! postings) rather than reaching for a crate for something this size, so
//! the cache is a plain generic struct over `HashMap` + an access-order
//! `Vec`, guarded by a `std::sync::Mutex` since every operation is O(n) in
//! a capacity that never exceeds a few hundred entries.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Hit/miss counters, matching `LRUCache.get_stats`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// A generic LRU cache with a per-entry TTL. Expired entries are treated as
/// misses and evicted lazily on access, matching the Python original's
/// `_is_expired` check in `get`.
pub struct LruTtlCache<K, V> {
    capacity: usize,
    ttl: Duration,
    entries: Mutex<Inner<K, V>>,
}

struct Inner<K, V> {
    map: HashMap<K, Entry<V>>,
    /// Most-recently-used key at the back, mirroring `OrderedDict.move_to_end`.
    order: Vec<K>,
    hits: u64,
    misses: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> LruTtlCache<K, V> {
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            entries: Mutex::new(Inner {
                map: HashMap::new(),
                order: Vec::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Looks up `key`, returning `None` on a miss or an expired entry.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        let expired = inner
            .map
            .get(key)
            .is_some_and(|e| e.inserted_at.elapsed() > self.ttl);
        if expired {
            inner.map.remove(key);
            inner.order.retain(|k| k != key);
        }

        match inner.map.get(key) {
            Some(entry) => {
                let value = entry.value.clone();
                inner.order.retain(|k| k != key);
                inner.order.push(key.clone());
                inner.hits += 1;
                Some(value)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Inserts or refreshes `key`, evicting the least-recently-used entry
    /// if at capacity, matching `LRUCache.set`.
    pub fn set(&self, key: K, value: V) {
        let mut inner = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        if inner.map.contains_key(&key) {
            inner.order.retain(|k| k != &key);
        } else if inner.map.len() >= self.capacity {
            if !inner.order.is_empty() {
                let lru_key = inner.order.remove(0);
                inner.map.remove(&lru_key);
            }
        }

        inner.order.push(key.clone());
        inner.map.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drops every entry, matching `LRUCache.invalidate_all`.
    pub fn invalidate_all(&self) {
        let mut inner = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        inner.map.clear();
        inner.order.clear();
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            size: inner.map.len(),
            capacity: self.capacity,
        }
    }
}

/// The two named caches the gateway maintains, with the Python original's
/// exact capacities/TTLs: search results (100 entries / 300s) and facet
/// aggregations (50 entries / 900s), plus a precomputed-facets snapshot
/// refreshed at most every 3600s.
pub struct QueryCache {
    pub search: LruTtlCache<String, Vec<u8>>,
    pub facets: LruTtlCache<String, Vec<u8>>,
    precomputed_facets: Mutex<Option<(Instant, Vec<u8>)>>,
}

impl QueryCache {
    const SEARCH_CAPACITY: usize = 100;
    const SEARCH_TTL_SECS: u64 = 300;
    const FACETS_CAPACITY: usize = 50;
    const FACETS_TTL_SECS: u64 = 900;
    const PRECOMPUTED_REFRESH_SECS: u64 = 3600;

    #[must_use]
    pub fn new() -> Self {
        Self {
            search: LruTtlCache::new(Self::SEARCH_CAPACITY, Duration::from_secs(Self::SEARCH_TTL_SECS)),
            facets: LruTtlCache::new(Self::FACETS_CAPACITY, Duration::from_secs(Self::FACETS_TTL_SECS)),
            precomputed_facets: Mutex::new(None),
        }
    }

    /// Builds a deterministic cache key from a sorted parameter list,
    /// matching `LRUCache._make_key`'s sorted-kwargs-then-hash approach
    /// (MD5 in the original; the key itself is never compared across
    /// processes here, so a plain joined string is sufficient).
    #[must_use]
    pub fn make_key(params: &[(&str, &str)]) -> String {
        let mut sorted = params.to_vec();
        sorted.sort_by_key(|(k, _)| *k);
        sorted
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Returns a cached precomputed-facets snapshot if one was taken within
    /// the refresh window, matching `QueryCache`'s `precomputed_facets`
    /// freshness check.
    pub fn precomputed_facets_if_fresh(&self) -> Option<Vec<u8>> {
        let guard = self.precomputed_facets.lock().unwrap_or_else(|e| e.into_inner());
        guard.as_ref().and_then(|(at, snapshot)| {
            if at.elapsed() < Duration::from_secs(Self::PRECOMPUTED_REFRESH_SECS) {
                Some(snapshot.clone())
            } else {
                None
            }
        })
    }

    pub fn set_precomputed_facets(&self, snapshot: Vec<u8>) {
        let mut guard = self.precomputed_facets.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some((Instant::now(), snapshot));
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_roundtrip_and_counts_hit() {
        let cache: LruTtlCache<String, i32> = LruTtlCache::new(4, Duration::from_secs(60));
        cache.set("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn miss_on_unknown_key_counts_miss() {
        let cache: LruTtlCache<String, i32> = LruTtlCache::new(4, Duration::from_secs(60));
        assert_eq!(cache.get(&"missing".to_string()), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn evicts_least_recently_used_at_capacity() {
        let cache: LruTtlCache<String, i32> = LruTtlCache::new(2, Duration::from_secs(60));
        cache.set("a".to_string(), 1);
        cache.set("b".to_string(), 2);
        cache.get(&"a".to_string()); // a is now most-recently-used
        cache.set("c".to_string(), 3); // evicts b
        assert_eq!(cache.get(&"b".to_string()), None);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.get(&"c".to_string()), Some(3));
    }

    #[test]
    fn expired_entry_is_treated_as_miss() {
        let cache: LruTtlCache<String, i32> = LruTtlCache::new(4, Duration::from_millis(1));
        cache.set("a".to_string(), 1);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&"a".to_string()), None);
    }

    #[test]
    fn invalidate_all_clears_everything() {
        let cache: LruTtlCache<String, i32> = LruTtlCache::new(4, Duration::from_secs(60));
        cache.set("a".to_string(), 1);
        cache.invalidate_all();
        assert_eq!(cache.get(&"a".to_string()), None);
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn make_key_is_order_independent() {
        let k1 = QueryCache::make_key(&[("b", "2"), ("a", "1")]);
        let k2 = QueryCache::make_key(&[("a", "1"), ("b", "2")]);
        assert_eq!(k1, k2);
    }

    #[test]
    fn precomputed_facets_absent_until_set() {
        let cache = QueryCache::new();
        assert!(cache.precomputed_facets_if_fresh().is_none());
        cache.set_precomputed_facets(vec![1, 2, 3]);
        assert_eq!(cache.precomputed_facets_if_fresh(), Some(vec![1, 2, 3]));
    }
}
