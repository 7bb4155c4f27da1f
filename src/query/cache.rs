use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};

use lru::LruCache;
use parking_lot::Mutex;

use crate::query::params::SearchParams;
use crate::search::results::SearchResults;

/// Per-collection cache of assembled search results, keyed by the full
/// parameter set. Cleared wholesale whenever a write commits, so a hit
/// can never observe a stale index.
#[derive(Debug)]
pub struct QueryCache {
    cache: Mutex<LruCache<SearchParams, SearchResults>>,
    hit_count: AtomicUsize,
    miss_count: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        QueryCache {
            cache: Mutex::new(LruCache::new(capacity)),
            hit_count: AtomicUsize::new(0),
            miss_count: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, key: &SearchParams) -> Option<SearchResults> {
        let mut cache = self.cache.lock();
        match cache.get(key) {
            Some(results) => {
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                Some(results.clone())
            }
            None => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put(&self, key: SearchParams, results: SearchResults) {
        self.cache.lock().put(key, results);
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hit_count.load(Ordering::Relaxed),
            misses: self.miss_count.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_and_invalidates() {
        let cache = QueryCache::new(4);
        let params = SearchParams::new("quick", &["title"]);

        assert!(cache.get(&params).is_none());
        cache.put(params.clone(), SearchResults::empty(1));
        assert!(cache.get(&params).is_some());

        cache.clear();
        assert!(cache.get(&params).is_none());
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 2);
    }
}
