//! # Idempotency Cache
//!
//! Capacity-bounded map from [`Fingerprint`] to a previously produced
//! outcome. Entries expire after their TTL (checked and evicted eagerly on
//! `get`). When full, `put` evicts the least-recently-used entry, where both
//! `get` and `put` count as a use.
//!
//! All state sits behind a single `parking_lot::Mutex`; critical sections
//! never await. Time comes from `tokio::time::Instant` so paused-clock tests
//! can drive expiry.

use super::Fingerprint;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
    /// Logical last-access tick, key into `recency`
    last_used: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }
}

#[derive(Debug)]
struct CacheInner<V> {
    entries: HashMap<Fingerprint, CacheEntry<V>>,
    recency: BTreeMap<u64, Fingerprint>,
    tick: u64,
    stats: CacheStats,
}

impl<V> CacheInner<V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, fingerprint: &Fingerprint) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(fingerprint)?;
        self.recency.remove(&entry.last_used);
        Some(entry)
    }
}

/// Counters describing cache behaviour since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

#[derive(Debug)]
pub struct IdempotencyCache<V> {
    inner: Mutex<CacheInner<V>>,
    max_entries: usize,
    default_ttl: Duration,
}

impl<V: Clone> IdempotencyCache<V> {
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                recency: BTreeMap::new(),
                tick: 0,
                stats: CacheStats::default(),
            }),
            max_entries: max_entries.max(1),
            default_ttl,
        }
    }

    /// Look up a live entry, refreshing its LRU position
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        match inner.entries.get(fingerprint).map(|entry| entry.is_expired(now)) {
            None => {
                inner.stats.misses += 1;
                return None;
            }
            Some(true) => {
                inner.remove(fingerprint);
                inner.stats.expirations += 1;
                inner.stats.misses += 1;
                trace!(fingerprint = %fingerprint.short(), "Cache entry expired");
                return None;
            }
            Some(false) => {}
        }

        let tick = inner.next_tick();
        let CacheInner {
            entries, recency, ..
        } = &mut *inner;
        let entry = entries.get_mut(fingerprint)?;
        recency.remove(&entry.last_used);
        entry.last_used = tick;
        recency.insert(tick, fingerprint.clone());
        let value = entry.value.clone();

        inner.stats.hits += 1;
        Some(value)
    }

    pub fn put(&self, fingerprint: Fingerprint, value: V) {
        self.put_with_ttl(fingerprint, value, self.default_ttl);
    }

    /// Insert or replace an entry. Replacing refreshes both its LRU position
    /// and its creation time.
    pub fn put_with_ttl(&self, fingerprint: Fingerprint, value: V, ttl: Duration) {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let replaced = inner.remove(&fingerprint).is_some();
        if !replaced && inner.entries.len() >= self.max_entries {
            if let Some((_, victim)) = inner.recency.pop_first() {
                inner.entries.remove(&victim);
                inner.stats.evictions += 1;
                trace!(fingerprint = %victim.short(), "Evicted least-recently-used cache entry");
            }
        }

        let tick = inner.next_tick();
        inner.recency.insert(tick, fingerprint.clone());
        inner.entries.insert(
            fingerprint,
            CacheEntry {
                value,
                created_at: now,
                ttl,
                last_used: tick,
            },
        );
    }

    pub fn remove(&self, fingerprint: &Fingerprint) -> Option<V> {
        self.inner.lock().remove(fingerprint).map(|entry| entry.value)
    }

    /// Check presence without touching LRU order or statistics
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        let now = Instant::now();
        self.inner
            .lock()
            .entries
            .get(fingerprint)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Drop every expired entry; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let expired: Vec<Fingerprint> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(fingerprint, _)| fingerprint.clone())
            .collect();
        for fingerprint in &expired {
            inner.remove(fingerprint);
        }
        inner.stats.expirations += expired.len() as u64;
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.recency.clear();
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::AlgorithmHint;

    fn fp(name: &str) -> Fingerprint {
        Fingerprint::compute("graph", name, "goal", AlgorithmHint::Auto)
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_returns_stored_value_within_ttl() {
        let cache = IdempotencyCache::new(10, Duration::from_secs(60));
        cache.put(fp("a"), 42);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get(&fp("a")), Some(42));
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_absent_and_evicted() {
        let cache = IdempotencyCache::new(10, Duration::from_secs(60));
        cache.put(fp("a"), 1);
        cache.put_with_ttl(fp("b"), 2, Duration::from_secs(600));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get(&fp("a")), None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&fp("b")), Some(2));

        let stats = cache.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_used() {
        let cache = IdempotencyCache::new(3, Duration::from_secs(60));
        cache.put(fp("a"), 1);
        cache.put(fp("b"), 2);
        cache.put(fp("c"), 3);

        // Touch "a" so "b" becomes the eviction candidate
        assert_eq!(cache.get(&fp("a")), Some(1));
        cache.put(fp("d"), 4);

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&fp("b")));
        assert!(cache.contains(&fp("a")));
        assert!(cache.contains(&fp("c")));
        assert!(cache.contains(&fp("d")));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_put_on_existing_key_refreshes_position() {
        let cache = IdempotencyCache::new(2, Duration::from_secs(60));
        cache.put(fp("a"), 1);
        cache.put(fp("b"), 2);
        cache.put(fp("a"), 10);
        cache.put(fp("c"), 3);

        assert_eq!(cache.get(&fp("a")), Some(10));
        assert!(!cache.contains(&fp("b")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = IdempotencyCache::new(10, Duration::from_secs(1));
        cache.put(fp("a"), 1);
        cache.put(fp("b"), 2);
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.purge_expired(), 2);
        assert!(cache.is_empty());
    }
}
