//! TTL- and size-bounded concurrent cache.
//!
//! Expiry is checked lazily on read; there is no background sweeper thread.
//! An opportunistic full sweep runs at read time when the cooldown interval
//! has elapsed, so the cost of dropping dead entries stays bounded. Eviction
//! under capacity pressure removes the oldest quartile by refresh timestamp
//! in one batch rather than maintaining strict LRU order.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// One cached value plus the timestamp of its last insert/refresh.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    refreshed_at: Instant,
}

/// Concurrent key-value cache with lazy TTL expiry and batch eviction.
///
/// The underlying map supports concurrent reads and writes without external
/// locking. Eviction is best-effort with respect to concurrent inserts: the
/// cache shrinks toward its target after every overflowing `put`, which keeps
/// `len() <= capacity` between puts without requiring an atomic cap.
pub struct ExpirationAwareCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    capacity: usize,
    ttl: Duration,
    sweep_cooldown: Duration,
    /// Milliseconds since `epoch` of the last opportunistic sweep.
    last_sweep_ms: AtomicU64,
    epoch: Instant,
}

impl<K, V> ExpirationAwareCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, ttl: Duration, sweep_cooldown: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            ttl,
            sweep_cooldown,
            last_sweep_ms: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    /// Get a live value. Returns `None` when the key is absent or its entry
    /// has outlived the TTL; an expired entry found here is dropped.
    pub fn get(&self, key: &K) -> Option<V> {
        self.maybe_sweep();

        let hit = self.entries.get(key).and_then(|entry| {
            if entry.refreshed_at.elapsed() <= self.ttl {
                Some(entry.value.clone())
            } else {
                None
            }
        });

        if hit.is_none() {
            self.entries
                .remove_if(key, |_, entry| entry.refreshed_at.elapsed() > self.ttl);
        }

        hit
    }

    /// Insert or overwrite, refreshing the entry timestamp. Triggers batch
    /// eviction when the cache grows past capacity.
    pub fn put(&self, key: K, value: V) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                refreshed_at: Instant::now(),
            },
        );

        if self.entries.len() > self.capacity {
            self.evict_oldest();
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries. In-flight readers that already cloned a value keep
    /// it; there is no retroactive invalidation.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Remove the oldest quartile by refresh timestamp, or at least enough
    /// entries to get back under capacity, whichever is larger.
    fn evict_oldest(&self) {
        let mut stamped: Vec<(K, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.refreshed_at))
            .collect();

        let len = stamped.len();
        let overflow = len.saturating_sub(self.capacity);
        let batch = (len / 4).max(overflow).max(1);

        stamped.sort_by_key(|(_, stamp)| *stamp);
        for (key, _) in stamped.into_iter().take(batch) {
            self.entries.remove(&key);
        }

        tracing::debug!(target: "cache", "evicted {batch} of {len} entries");
    }

    /// Full expiry sweep, rate-limited by the cooldown interval. Losing the
    /// compare-exchange race means another reader is already sweeping.
    fn maybe_sweep(&self) {
        let cooldown_ms = self.sweep_cooldown.as_millis() as u64;
        let now_ms = self.epoch.elapsed().as_millis() as u64;
        let last = self.last_sweep_ms.load(Ordering::Relaxed);

        if now_ms.saturating_sub(last) < cooldown_ms {
            return;
        }
        if self
            .last_sweep_ms
            .compare_exchange(last, now_ms, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.refreshed_at.elapsed() <= self.ttl);
        let swept = before - self.entries.len();
        if swept > 0 {
            tracing::debug!(target: "cache", "sweep dropped {swept} expired entries");
        }
    }
}
