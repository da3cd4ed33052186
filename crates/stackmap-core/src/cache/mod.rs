//! Expiring caches shared by the source resolvers.
//!
//! Caches are explicit objects injected into the engine. Time is read through a
//! [`Clock`] so tests can control expiry without sleeping.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::context::Context;

/// Source of monotonic time for cache expiry.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock { origin: Instant::now(), elapsed: Mutex::new(Duration::ZERO) }
    }

    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *elapsed += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let elapsed = self.elapsed.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.origin + *elapsed
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Expiring map keyed by raw strings (or any hashable key).
///
/// Entries are written once per distinct key per TTL window. An expired entry is
/// dropped when its key is looked up, and every write sweeps all expired entries,
/// so the map never holds more than the keys written within one TTL window.
/// [`TtlCache::evict_expired`] sweeps on demand.
/// All operations take a single coarse lock.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    ctx: Context,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        TtlCache { ttl, clock, entries: Mutex::new(HashMap::new()), ctx: Context::empty() }
    }

    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_expired(&self, entry: &CacheEntry<V>, now: Instant) -> bool {
        now.saturating_duration_since(entry.inserted_at) >= self.ttl
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            None => {
                self.ctx.try_log(|logger| debug!(logger, "cache miss for {:?}", key));
                return None;
            }
            Some(entry) => self.is_expired(entry, now),
        };
        if expired {
            entries.remove(key);
            self.ctx.try_log(|logger| debug!(logger, "cache entry for {:?} expired", key));
            return None;
        }
        self.ctx.try_log(|logger| debug!(logger, "cache hit for {:?}", key));
        entries.get(key).map(|entry| entry.value.clone())
    }

    fn sweep(&self, entries: &mut HashMap<K, CacheEntry<V>>, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_duration_since(entry.inserted_at) < self.ttl);
        let evicted = before - entries.len();
        if evicted > 0 {
            self.ctx.try_log(|logger| debug!(logger, "evicted {} expired cache entries", evicted));
        }
        evicted
    }

    pub fn insert(&self, key: K, value: V) {
        let inserted_at = self.clock.now();
        let mut entries = self.lock();
        self.sweep(&mut entries, inserted_at);
        entries.insert(key, CacheEntry { value, inserted_at });
    }

    /// Returns the live cached value for `key`, computing and storing it on a miss.
    ///
    /// The lock is held while `compute` runs, so concurrent callers asking for
    /// the same key compute it once.
    pub fn get_or_insert_with<F>(&self, key: &K, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        let now = self.clock.now();
        let mut entries = self.lock();
        if let Some(entry) = entries.get(key) {
            if !self.is_expired(entry, now) {
                self.ctx.try_log(|logger| debug!(logger, "cache hit for {:?}", key));
                return entry.value.clone();
            }
        }
        self.ctx.try_log(|logger| debug!(logger, "cache miss for {:?}", key));
        self.sweep(&mut entries, now);
        let value = compute();
        entries.insert(key.clone(), CacheEntry { value: value.clone(), inserted_at: now });
        value
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        self.sweep(&mut entries, now)
    }

    /// Number of stored entries, expired ones included until evicted.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(ttl_secs: u64) -> (Arc<ManualClock>, TtlCache<String, usize>) {
        let clock = Arc::new(ManualClock::new());
        let cache = TtlCache::with_clock(Duration::from_secs(ttl_secs), clock.clone());
        (clock, cache)
    }

    #[test]
    fn it_returns_entries_within_the_ttl_window() {
        let (clock, cache) = cache(60);
        cache.insert("a".into(), 1);
        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get(&"a".to_string()), Some(1));
    }

    #[test]
    fn it_expires_entries_lazily_on_access() {
        let (clock, cache) = cache(60);
        cache.insert("a".into(), 1);
        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"a".to_string()), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn it_sweeps_stale_keys_on_write() {
        let (clock, cache) = cache(10);
        cache.insert("a".into(), 1);
        clock.advance(Duration::from_secs(10));
        assert_eq!(cache.get_or_insert_with(&"b".to_string(), || 2), 2);
        assert_eq!(cache.len(), 1);

        clock.advance(Duration::from_secs(10));
        cache.insert("c".into(), 3);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"c".to_string()), Some(3));
    }

    #[test]
    fn it_evicts_expired_entries_eagerly() {
        let (clock, cache) = cache(10);
        cache.insert("old".into(), 1);
        clock.advance(Duration::from_secs(5));
        cache.insert("new".into(), 2);
        clock.advance(Duration::from_secs(6));
        assert_eq!(cache.evict_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"new".to_string()), Some(2));
    }

    #[test]
    fn it_computes_once_per_window() {
        let (clock, cache) = cache(10);
        let mut calls = 0;
        let key = "k".to_string();
        for _ in 0..3 {
            cache.get_or_insert_with(&key, || {
                calls += 1;
                calls
            });
        }
        assert_eq!(calls, 1);
        clock.advance(Duration::from_secs(10));
        assert_eq!(
            cache.get_or_insert_with(&key, || {
                calls += 1;
                calls
            }),
            2
        );
    }

    #[test]
    fn it_is_shareable_across_threads() {
        let cache: Arc<TtlCache<String, usize>> = Arc::new(TtlCache::new(Duration::from_secs(60)));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.get_or_insert_with(&"shared".to_string(), || i))
            })
            .collect();
        let values: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(values.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(cache.len(), 1);
    }
}
