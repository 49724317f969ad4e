// In-process TTL cache for read-mostly snapshots

use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Key/value cache whose entries expire a fixed time after insertion.
///
/// A zero TTL disables caching entirely: lookups always miss and inserts
/// are dropped.
#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    store: DashMap<String, CacheEntry<V>>,
    /// Bumped by every invalidation; loads started before a bump are not stored.
    generation: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            store: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let expired = match self.store.get(key) {
            Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.evict_if_expired(key);
        }
        None
    }

    /// Removes `key` only if it is still expired under the shard lock, so a
    /// fresh value written since the lookup survives.
    fn evict_if_expired(&self, key: &str) -> bool {
        let evicted = self
            .store
            .remove_if(key, |_, entry| entry.is_expired())
            .is_some();
        if evicted {
            debug!(key, "cache entry expired");
        }
        evicted
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        if self.is_enabled() {
            self.store.insert(key.into(), CacheEntry::new(value, self.ttl));
        }
    }

    pub fn invalidate(&self, key: &str) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.store.remove(key);
    }

    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.store.clear();
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Returns the cached value for `key`, loading and caching it on a miss.
    ///
    /// Concurrent misses may each run `load`. A value whose load overlapped
    /// an `invalidate` or `clear` is returned to its caller but not stored.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: &str, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let generation = self.generation.load(Ordering::SeqCst);
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = load().await?;
        if !self.is_enabled() {
            return Ok(value);
        }

        // Compared under the shard lock: a concurrent clear either bumped the
        // generation first or sweeps this shard after the insert.
        let slot = self.store.entry(key.to_string());
        if self.generation.load(Ordering::SeqCst) == generation {
            slot.insert(CacheEntry::new(value.clone(), self.ttl));
        } else {
            debug!(key, "cache invalidated during load; result not stored");
        }
        Ok(value)
    }
}
