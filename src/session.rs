//! # Session Module
//!
//! [`SessionEngine`] is the only surface the chat dispatch layer talks to.
//! It owns the catalog cache, the rate limiter, every user's selection, the
//! playlist writer, the download manager and the retention sweeper.
//!
//! ## Typical flow
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use iptv_bot::{config::Config, session::SessionEngine, upstream::HttpFetcher,
//! #     account::AccountConfig, catalog::CatalogQuery};
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let fetcher = Arc::new(HttpFetcher::new(config.request_timeout())?);
//! let engine = SessionEngine::new(&config, fetcher)?;
//!
//! let chat = 12345;
//! let account = AccountConfig::from_playlist_url("http://host/get.php?username=u&password=p").unwrap();
//! if engine.admit(chat) {
//!     let categories = engine.query(&account, &CatalogQuery::LiveCategories).await;
//!     // ... render menus, then on export:
//!     let playlist = engine.export_playlist(chat, &account).await;
//! }
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use num_format::{Locale, ToFormattedString};
use serde::Serialize;
use serde_json::Value;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{error, info, warn};

use crate::{
    account::{AccountConfig, AccountInfo},
    cache::CatalogCache,
    catalog::{CatalogQuery, QueryParams},
    config::Config,
    download::{DownloadFormat, DownloadManager},
    error::DownloadError,
    playlist::PlaylistWriter,
    ratelimit::RateLimiter,
    retention::{RetentionSweeper, SweepReport},
    selection::{projection, ContentKind, SelectionItem, SelectionStats, SelectionStore, UserSelections},
    upstream::CatalogFetcher,
    Identity,
};

/// Series info requests issued in parallel while expanding a category.
const SERIES_FETCH_CONCURRENCY: usize = 4;

/// Process-wide counters.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_size: usize,
    pub active_identities: usize,
    pub total_selections: usize,
    pub uptime: Duration,
    pub started_at: DateTime<Utc>,
}

impl std::fmt::Display for EngineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "📊 Engine Stats:\n\
             📡 Requests: {} ({} cache hits)\n\
             💾 Cache: {} entries\n\
             👥 Active users: {}\n\
             📝 Selections: {}\n\
             ⏱️ Uptime: {} (since {})",
            self.total_requests.to_formatted_string(&Locale::en),
            self.cache_hits.to_formatted_string(&Locale::en),
            self.cache_size.to_formatted_string(&Locale::en),
            self.active_identities.to_formatted_string(&Locale::en),
            self.total_selections.to_formatted_string(&Locale::en),
            humantime::format_duration(Duration::from_secs(self.uptime.as_secs())),
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }
}

pub struct SessionEngine {
    cache: CatalogCache,
    limiter: RateLimiter,
    selections: SelectionStore,
    playlists: PlaylistWriter,
    downloads: DownloadManager,
    sweeper: RetentionSweeper,
    started_at: DateTime<Utc>,
}

impl SessionEngine {
    pub fn new(config: &Config, fetcher: Arc<dyn CatalogFetcher>) -> Result<Self> {
        let engine = Self {
            cache: CatalogCache::new(fetcher, config.cache_ttl(), config.cache_max_entries),
            limiter: RateLimiter::new(
                config.owner_id,
                config.rate_limit_window(),
                config.rate_limit_max,
                config.rate_limit_max_identities,
            ),
            selections: SelectionStore::new(),
            playlists: PlaylistWriter::new(&config.work_dir),
            downloads: DownloadManager::new(
                &config.download_dir,
                config.owner_id,
                config.max_file_size,
                config.download_timeout(),
            )?,
            sweeper: RetentionSweeper::new(
                &config.work_dir,
                &config.download_dir,
                config.playlist_max_age(),
                config.download_max_age(),
            ),
            started_at: Utc::now(),
        };

        info!("🚀 Motor de sesiones iniciado");
        Ok(engine)
    }

    // ===== Admission =====

    pub fn admit(&self, identity: Identity) -> bool {
        self.limiter.admit(identity)
    }

    pub fn is_privileged(&self, identity: Identity) -> bool {
        self.limiter.is_privileged(identity)
    }

    // ===== Catalog =====

    /// Raw upstream access through the cache.
    pub async fn fetch(&self, endpoint: &str, params: &QueryParams) -> Option<Value> {
        self.cache.fetch(endpoint, params).await
    }

    pub async fn query(&self, account: &AccountConfig, query: &CatalogQuery) -> Option<Value> {
        self.cache.query(account, query).await
    }

    /// Drops every cached catalog response.
    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }

    pub async fn server_info(&self, account: &AccountConfig) -> AccountInfo {
        match self.query(account, &CatalogQuery::AccountInfo).await {
            Some(data) => AccountInfo::from_response(account, &data),
            None => AccountInfo::unreachable(account),
        }
    }

    /// Whether the account answers `get_account_info` without an error.
    pub async fn test_connection(&self, account: &AccountConfig) -> bool {
        match self.query(account, &CatalogQuery::AccountInfo).await {
            Some(Value::Object(map)) => {
                map.contains_key("user_info") || !map.get("error").is_some_and(is_truthy)
            }
            _ => false,
        }
    }

    // ===== Selections =====

    pub fn get_selections(&self, identity: Identity) -> UserSelections {
        self.selections.get(identity)
    }

    pub fn add_selection(&self, identity: Identity, kind: ContentKind, item: SelectionItem) -> bool {
        self.selections.add(identity, kind, item)
    }

    /// Adds one channel or movie listing entry, grouped by its own category.
    pub fn add_catalog_item(&self, identity: Identity, kind: ContentKind, raw: &Value) -> bool {
        let label = projection::category_label(kind, raw);
        match projection::stream_item(kind, raw, &label) {
            Some(item) => self.selections.add(identity, kind, item),
            None => false,
        }
    }

    /// Adds every episode of one series listing entry.
    pub async fn add_series(&self, identity: Identity, account: &AccountConfig, series: &Value) -> usize {
        let label = projection::category_label(ContentKind::Series, series);
        let items = self.expand_series(account, series, &label).await;
        self.selections.add_many(identity, ContentKind::Series, items)
    }

    /// Adds a whole upstream category under a user-chosen group title.
    ///
    /// Series categories are expanded to every episode of every season.
    /// Returns the number of items actually added; an empty label adds
    /// nothing.
    pub async fn add_full_category(
        &self,
        identity: Identity,
        account: &AccountConfig,
        kind: ContentKind,
        category_id: &str,
        label: &str,
    ) -> usize {
        let label = label.trim();
        if label.is_empty() {
            warn!("Nombre de categoría vacío para {}", identity);
            return 0;
        }

        let category_id = Some(category_id.to_string());
        let query = match kind {
            ContentKind::Channel => CatalogQuery::LiveStreams { category_id },
            ContentKind::Movie => CatalogQuery::VodStreams { category_id },
            ContentKind::Series => CatalogQuery::Series { category_id },
        };

        let listing = match self.query(account, &query).await {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };

        let items: Vec<SelectionItem> = match kind {
            ContentKind::Channel | ContentKind::Movie => listing
                .iter()
                .filter_map(|raw| projection::stream_item(kind, raw, label))
                .collect(),
            ContentKind::Series => stream::iter(listing.iter())
                .map(|series| self.expand_series(account, series, label))
                .buffered(SERIES_FETCH_CONCURRENCY)
                .flat_map(stream::iter)
                .collect()
                .await,
        };

        let added = self.selections.add_many(identity, kind, items);
        info!("📥 Categoría '{}' ({}): {} elementos agregados para {}", label, kind, added, identity);
        added
    }

    async fn expand_series(&self, account: &AccountConfig, series: &Value, label: &str) -> Vec<SelectionItem> {
        let Some(series_id) = projection::series_id(series) else {
            return Vec::new();
        };

        match self.query(account, &CatalogQuery::SeriesInfo { series_id }).await {
            Some(info) => projection::episode_items(series, &info, label),
            None => Vec::new(),
        }
    }

    pub fn clear_selections(&self, identity: Identity, kind: Option<ContentKind>) {
        self.selections.clear(identity, kind)
    }

    pub fn selection_stats(&self, identity: Identity) -> SelectionStats {
        self.selections.stats(identity)
    }

    // ===== Export =====

    /// Writes `playlist_<identity>.m3u`; `None` if nothing is selected or the
    /// file could not be written.
    ///
    /// The write and its fsync run on the blocking pool.
    pub async fn export_playlist(&self, identity: Identity, account: &AccountConfig) -> Option<PathBuf> {
        let selections = self.selections.get(identity);
        let writer = self.playlists.clone();
        let account = account.clone();

        let written = tokio::task::spawn_blocking(move || writer.write(identity, &selections, &account)).await;

        match written {
            Ok(Ok(path)) => path,
            Ok(Err(e)) => {
                error!("❌ Error generando playlist para {}: {}", identity, e);
                None
            }
            Err(e) => {
                error!("❌ Tarea de exportación falló para {}: {}", identity, e);
                None
            }
        }
    }

    /// Formats offered for downloading a movie or episode, looked up through
    /// the cache. Channels have none; an unknown item gets the mp4 default.
    pub async fn download_formats(&self, account: &AccountConfig, kind: ContentKind, stream_id: &str) -> Vec<DownloadFormat> {
        let Some(query) = DownloadFormat::info_query(kind, stream_id) else {
            return Vec::new();
        };

        let info = self.query(account, &query).await;
        DownloadFormat::from_info(info.as_ref())
    }

    pub async fn download(
        &self,
        identity: Identity,
        account: &AccountConfig,
        kind: ContentKind,
        stream_id: &str,
        ext: &str,
    ) -> Result<PathBuf, DownloadError> {
        self.downloads.download(identity, account, kind, stream_id, ext).await
    }

    // ===== Maintenance =====

    pub async fn sweep(&self) -> SweepReport {
        self.sweeper.sweep().await
    }

    pub fn stats(&self) -> EngineStats {
        let now = Utc::now();

        EngineStats {
            total_requests: self.cache.total_requests(),
            cache_hits: self.cache.hits(),
            cache_size: self.cache.len(),
            active_identities: self.selections.active_identities(),
            total_selections: self.selections.total_items(),
            uptime: (now - self.started_at).to_std().unwrap_or_default(),
            started_at: self.started_at,
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
