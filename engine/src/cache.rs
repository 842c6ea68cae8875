//! Cache Manager (C14, §4.14).
//!
//! Bounded LRU with per-entry TTL. `get` refreshes recency and evicts
//! expired entries on access; `put` may evict the least-recently-used
//! entry when over capacity. The clock is injectable so tests don't need to
//! sleep — the source project's caches key off `Instant::now()` directly,
//! which this generalizes into a trait so TTL expiry is deterministically
//! testable.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Injectable time source (§4.14, §9 "Token estimator is injected" — same
/// pattern applied here for the clock).
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

struct Entry<V> {
    value: V,
    inserted_at_ms: u64,
    recency: u64,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    recency_order: BTreeMap<u64, String>,
    recency_counter: AtomicU64,
}

/// A key = content hash + operation name + parameter digest (§3 "Cache
/// entry"); callers build that composite string, the cache itself is
/// key-agnostic.
pub struct CacheManager<V> {
    inner: Mutex<Inner<V>>,
    max_entries: usize,
    ttl_ms: u64,
    clock: Box<dyn Clock>,
}

impl<V: Clone> CacheManager<V> {
    pub fn new(max_entries: usize, ttl_ms: u64) -> Self {
        Self::with_clock(max_entries, ttl_ms, Box::new(SystemClock))
    }

    pub fn with_clock(max_entries: usize, ttl_ms: u64, clock: Box<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                recency_order: BTreeMap::new(),
                recency_counter: AtomicU64::new(0),
            }),
            max_entries: max_entries.max(1),
            ttl_ms,
            clock,
        }
    }

    /// Returns the value if present and unexpired, refreshing recency.
    /// Expired entries are evicted on access (§4.14).
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock().unwrap();

        let expired = match inner.entries.get(key) {
            Some(entry) => now.saturating_sub(entry.inserted_at_ms) > self.ttl_ms,
            None => return None,
        };
        if expired {
            if let Some(entry) = inner.entries.remove(key) {
                inner.recency_order.remove(&entry.recency);
            }
            return None;
        }

        let next_recency = inner.recency_counter.fetch_add(1, Ordering::Relaxed);
        let value = {
            let entry = inner.entries.get_mut(key).unwrap();
            let old_recency = entry.recency;
            entry.recency = next_recency;
            inner.recency_order.remove(&old_recency);
            entry.value.clone()
        };
        inner.recency_order.insert(next_recency, key.to_string());
        Some(value)
    }

    /// Inserts or replaces `key`, evicting the least-recently-used entry if
    /// the cache is over capacity afterward.
    pub fn put(&self, key: &str, value: V) {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock().unwrap();

        if let Some(old) = inner.entries.get(key) {
            inner.recency_order.remove(&old.recency);
        }
        let recency = inner.recency_counter.fetch_add(1, Ordering::Relaxed);
        inner.entries.insert(
            key.to_string(),
            Entry { value, inserted_at_ms: now, recency },
        );
        inner.recency_order.insert(recency, key.to_string());

        while inner.entries.len() > self.max_entries {
            let Some((&lru_recency, _)) = inner.recency_order.iter().next() else { break };
            if let Some(lru_key) = inner.recency_order.remove(&lru_recency) {
                inner.entries.remove(&lru_key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeClock(std::sync::atomic::AtomicU64);

    impl Clock for FakeClock {
        fn now_ms(&self) -> u64 {
            self.0.load(Ordering::Relaxed)
        }
    }

    impl FakeClock {
        fn advance(&self, ms: u64) {
            self.0.fetch_add(ms, Ordering::Relaxed);
        }
    }

    #[test]
    fn get_after_ttl_is_a_miss() {
        let clock = std::sync::Arc::new(FakeClock(std::sync::atomic::AtomicU64::new(0)));
        let cache = CacheManager::with_clock(10, 100, Box::new(FakeClockRef(clock.clone())));
        cache.put("k", 1);
        assert_eq!(cache.get("k"), Some(1));
        clock.advance(200);
        assert_eq!(cache.get("k"), None);
    }

    struct FakeClockRef(std::sync::Arc<FakeClock>);
    impl Clock for FakeClockRef {
        fn now_ms(&self) -> u64 {
            self.0.now_ms()
        }
    }

    #[test]
    fn size_never_exceeds_max_entries() {
        let cache: CacheManager<usize> = CacheManager::new(3, 60_000);
        for i in 0..10 {
            cache.put(&format!("k{i}"), i);
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn put_evicts_least_recently_used() {
        let cache: CacheManager<usize> = CacheManager::new(2, 60_000);
        cache.put("a", 1);
        cache.put("b", 2);
        // Touch "a" so "b" becomes LRU.
        cache.get("a");
        cache.put("c", 3);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("c"), Some(3));
    }
}
