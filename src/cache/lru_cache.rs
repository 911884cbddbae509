use dashmap::DashMap;
use parking_lot::Mutex;
use std::{
    hash::Hash,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tokio::time::Instant;
use tracing::debug;

/// Cache entry con TTL
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    last_accessed: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, now: Instant) -> Self {
        Self {
            value,
            stored_at: now,
            last_accessed: now,
        }
    }

    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= ttl
    }
}

/// Bounded TTL cache with least-recently-used eviction.
///
/// Expiry is lazy: an expired entry reads as absent but keeps its slot until
/// it is overwritten, cleared, or reclaimed to make room for a new key.
#[derive(Debug)]
pub struct LRUCache<K: Eq + Hash, V> {
    data: DashMap<K, CacheEntry<V>>,
    capacity: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired_removals: AtomicU64,
    admission: Mutex<()>,
}

impl<K, V> LRUCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            data: DashMap::new(),
            capacity: capacity.max(1),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expired_removals: AtomicU64::new(0),
            admission: Mutex::new(()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();

        if let Some(mut entry) = self.data.get_mut(key) {
            if !entry.is_expired(self.ttl, now) {
                entry.last_accessed = now;
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Stores `value`, returning the previous value of the slot if any.
    ///
    /// Inserting a new key into a full cache first reclaims expired entries,
    /// then evicts the least recently used one. Inserts are serialized, so
    /// the cache never holds more than `capacity` entries.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let now = Instant::now();
        let _admission = self.admission.lock();

        if !self.data.contains_key(&key) && self.data.len() >= self.capacity {
            self.make_room(now);
        }

        self.data
            .insert(key, CacheEntry::new(value, now))
            .map(|old| old.value)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Vacía el cache y retorna el número de elementos removidos
    pub fn clear(&self) -> usize {
        let removed = self.data.len();
        self.data.clear();
        removed
    }

    /// Limpia entradas expiradas y retorna el número de elementos removidos
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let ttl = self.ttl;
        let mut removed = 0;

        self.data.retain(|_, entry| {
            let keep = !entry.is_expired(ttl, now);
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            self.expired_removals.fetch_add(removed as u64, Ordering::Relaxed);
            debug!("Limpiadas {} entradas expiradas del cache", removed);
        }

        removed
    }

    pub fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expired_removals: self.expired_removals.load(Ordering::Relaxed),
        }
    }

    fn make_room(&self, now: Instant) {
        if self.cleanup_expired() > 0 && self.data.len() < self.capacity {
            return;
        }

        let oldest = self
            .data
            .iter()
            .min_by_key(|entry| entry.value().last_accessed)
            .map(|entry| (entry.key().clone(), entry.value().last_accessed));

        if let Some((key, last_accessed)) = oldest {
            if self.data.remove(&key).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Cache lleno ({}), entrada LRU expulsada tras {:?} sin uso",
                    self.capacity,
                    now.saturating_duration_since(last_accessed)
                );
            }
        }
    }
}

/// Métricas básicas del cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired_removals: u64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}
