//! # Cache Module
//!
//! TTL-bounded memoization of upstream catalog queries.
//!
//! Catalog listings (categories, streams, series info) change rarely but are
//! requested on every menu page, so [`CatalogCache`] answers repeated queries
//! from memory and only reaches the upstream on a miss.
//!
//! ## Behavior
//!
//! - **Keys**: a [`Fingerprint`] of endpoint and sorted parameters, so
//!   `{a:1,b:2}` and `{b:2,a:1}` share an entry
//! - **Expiry**: lazy; entries older than the TTL read as absent
//! - **What is cached**: JSON bodies only. Raw text answers are returned
//!   wrapped as `{"status": "ok", "raw_data": ...}` and failures as `None`;
//!   neither is stored
//! - **Bounds**: at capacity, expired entries are reclaimed first, then the
//!   least recently used entry is evicted
//! - **Concurrency**: lookups and upstream fetches for one fingerprint are
//!   serialized, so concurrent misses on the same query cost one request
//!
//! ## Configuration
//!
//! ```env
//! CACHE_TTL=300               # Time-to-live in seconds
//! CACHE_MAX_ENTRIES=5000      # Maximum number of cached responses
//! ```

pub mod lru_cache;

use dashmap::DashMap;
use serde_json::{json, Value};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    account::AccountConfig,
    catalog::{CatalogQuery, Fingerprint, QueryParams},
    upstream::{CatalogFetcher, FetchOutcome},
};

pub use lru_cache::{CacheMetrics, LRUCache};

/// Memoizing front of a [`CatalogFetcher`].
pub struct CatalogCache {
    entries: LRUCache<Fingerprint, Value>,
    fetcher: Arc<dyn CatalogFetcher>,
    inflight: DashMap<Fingerprint, Arc<Mutex<()>>>,
    total_requests: AtomicU64,
}

impl CatalogCache {
    pub fn new(fetcher: Arc<dyn CatalogFetcher>, ttl: Duration, capacity: usize) -> Self {
        info!("🗄️ Caché de catálogo iniciado: TTL {:?}, máximo {} entradas", ttl, capacity);

        Self {
            entries: LRUCache::new(capacity, ttl),
            fetcher,
            inflight: DashMap::new(),
            total_requests: AtomicU64::new(0),
        }
    }

    /// Runs a typed catalog query for `account`.
    pub async fn query(&self, account: &AccountConfig, query: &CatalogQuery) -> Option<Value> {
        self.fetch(&account.api_url, &query.params(account)).await
    }

    /// Returns the upstream answer for `params`, from memory when fresh.
    ///
    /// `None` means the upstream failed; the failure is logged, never raised.
    pub async fn fetch(&self, endpoint: &str, params: &QueryParams) -> Option<Value> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let key = Fingerprint::new(endpoint, params);
        let gate = InflightGate::enter(&self.inflight, &key);
        let _lock = gate.lock().await;

        let payload = self.lookup_or_fetch(&key, endpoint, params).await;
        payload
    }

    async fn lookup_or_fetch(&self, key: &Fingerprint, endpoint: &str, params: &QueryParams) -> Option<Value> {
        if let Some(payload) = self.entries.get(key) {
            debug!("✅ Cache hit para {}", key);
            return Some(payload);
        }

        debug!("❌ Cache miss para {}", key);

        match self.fetcher.fetch(endpoint, params).await {
            FetchOutcome::Json(payload) => {
                self.entries.insert(key.clone(), payload.clone());
                Some(payload)
            }
            FetchOutcome::RawText(text) => Some(json!({ "status": "ok", "raw_data": text })),
            FetchOutcome::Failed(e) => {
                if e.is_transient() {
                    warn!("⚠️ Upstream no disponible para {}: {}", key, e);
                } else {
                    warn!("❌ Respuesta inválida del upstream para {}: {}", key, e);
                }
                None
            }
        }
    }

    /// Drops every cached response, returning how many were removed.
    pub fn clear(&self) -> usize {
        let removed = self.entries.clear();
        info!("🧹 Cache de catálogo vaciado: {} entradas", removed);
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn hits(&self) -> u64 {
        self.entries.metrics().hits
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.entries.metrics()
    }
}

/// Membership in the per-fingerprint gate map.
///
/// Leaving (including when the caller's future is dropped mid-fetch) removes
/// the gate unless another caller still holds it.
struct InflightGate<'a> {
    map: &'a DashMap<Fingerprint, Arc<Mutex<()>>>,
    key: &'a Fingerprint,
    gate: Arc<Mutex<()>>,
}

impl<'a> InflightGate<'a> {
    fn enter(map: &'a DashMap<Fingerprint, Arc<Mutex<()>>>, key: &'a Fingerprint) -> Self {
        let gate = map.entry(key.clone()).or_default().clone();
        Self { map, key, gate }
    }

    async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.gate.lock().await
    }
}

impl Drop for InflightGate<'_> {
    fn drop(&mut self) {
        // Ours plus the map's; anything more means another caller is waiting.
        self.map.remove_if(self.key, |_, g| Arc::strong_count(g) <= 2);
    }
}
