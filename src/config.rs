use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::Identity;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Acceso
    pub owner_id: Identity,

    // Caché
    pub cache_ttl: u64, // En segundos
    pub cache_max_entries: usize,

    // Límites
    pub rate_limit_time: u64, // Ventana en segundos
    pub rate_limit_max: u32,  // Peticiones por ventana
    pub rate_limit_max_identities: usize,
    pub request_timeout: u64, // En segundos

    // Paths
    pub work_dir: PathBuf,
    pub download_dir: PathBuf,

    // Descargas
    pub max_file_size: u64, // En bytes
    pub download_timeout: u64,

    // Limpieza
    pub cleanup_interval: u64,
    pub playlist_max_age: u64,
    pub download_max_age: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            owner_id: std::env::var("OWNER_ID")?.parse()?,

            cache_ttl: std::env::var("CACHE_TTL")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
            cache_max_entries: std::env::var("CACHE_MAX_ENTRIES")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()?,

            rate_limit_time: std::env::var("RATE_LIMIT_TIME")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            rate_limit_max: std::env::var("RATE_LIMIT_MAX")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,
            rate_limit_max_identities: std::env::var("RATE_LIMIT_MAX_IDENTITIES")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()?,
            request_timeout: std::env::var("REQUEST_TIMEOUT")
                .unwrap_or_else(|_| "15".to_string())
                .parse()?,

            work_dir: std::env::var("WORK_DIR")
                .unwrap_or_else(|_| ".".to_string())
                .into(),
            download_dir: std::env::var("DOWNLOAD_DIR")
                .unwrap_or_else(|_| "downloads".to_string())
                .into(),

            max_file_size: std::env::var("MAX_FILE_SIZE")
                .unwrap_or_else(|_| "2147483648".to_string()) // 2 GiB
                .parse()?,
            download_timeout: std::env::var("DOWNLOAD_TIMEOUT")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,

            cleanup_interval: std::env::var("CLEANUP_INTERVAL")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()?,
            playlist_max_age: std::env::var("PLAYLIST_MAX_AGE")
                .unwrap_or_else(|_| "86400".to_string()) // 24 horas
                .parse()?,
            download_max_age: std::env::var("DOWNLOAD_MAX_AGE")
                .unwrap_or_else(|_| "3600".to_string()) // 1 hora
                .parse()?,
        };

        std::fs::create_dir_all(&config.work_dir)?;
        std::fs::create_dir_all(&config.download_dir)?;

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// Every window, TTL, capacity and age must be non-zero.
    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl == 0 {
            anyhow::bail!("Cache TTL must be greater than 0");
        }

        if self.cache_max_entries == 0 {
            anyhow::bail!("Cache max entries must be greater than 0");
        }

        if self.rate_limit_time == 0 {
            anyhow::bail!("Rate limit window must be greater than 0");
        }

        if self.rate_limit_max == 0 {
            anyhow::bail!("Rate limit max must be greater than 0");
        }

        if self.rate_limit_max_identities == 0 {
            anyhow::bail!("Rate limit identity capacity must be greater than 0");
        }

        if self.request_timeout == 0 || self.download_timeout == 0 {
            anyhow::bail!("Timeouts must be greater than 0");
        }

        if self.max_file_size == 0 {
            anyhow::bail!("Max file size must be greater than 0");
        }

        if self.cleanup_interval == 0 {
            anyhow::bail!("Cleanup interval must be greater than 0");
        }

        if self.playlist_max_age == 0 || self.download_max_age == 0 {
            anyhow::bail!("Retention ages must be greater than 0");
        }

        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_time)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval)
    }

    pub fn playlist_max_age(&self) -> Duration {
        Duration::from_secs(self.playlist_max_age)
    }

    pub fn download_max_age(&self) -> Duration {
        Duration::from_secs(self.download_max_age)
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The owner id is the only identity shown; account credentials never
    /// live in the config.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Owner: {}\n  \
            Cache: {} TTL, {} entries max\n  \
            Limits: {}/{} window, {} identities max, {} upstream timeout\n  \
            Paths: work={}, downloads={}\n  \
            Downloads: {} MB max, {} timeout\n  \
            Cleanup: every {}, playlists {}, downloads {}",
            self.owner_id,
            humantime::format_duration(self.cache_ttl()),
            self.cache_max_entries,
            self.rate_limit_max,
            humantime::format_duration(self.rate_limit_window()),
            self.rate_limit_max_identities,
            humantime::format_duration(self.request_timeout()),
            self.work_dir.display(),
            self.download_dir.display(),
            self.max_file_size / (1024 * 1024),
            humantime::format_duration(self.download_timeout()),
            humantime::format_duration(self.cleanup_interval()),
            humantime::format_duration(self.playlist_max_age()),
            humantime::format_duration(self.download_max_age()),
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // No default owner - must be provided
            owner_id: 0,

            cache_ttl: 300,
            cache_max_entries: 5000,

            rate_limit_time: 60,
            rate_limit_max: 20,
            rate_limit_max_identities: 10_000,
            request_timeout: 15,

            work_dir: ".".into(),
            download_dir: "downloads".into(),

            max_file_size: 2 * 1024 * 1024 * 1024,
            download_timeout: 300,

            cleanup_interval: 3600,
            playlist_max_age: 24 * 3600,
            download_max_age: 3600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_window_is_rejected() {
        let config = Config {
            rate_limit_time: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn summary_renders_durations() {
        let summary = Config::default().summary();
        assert!(summary.contains("5m TTL"));
        assert!(summary.contains("20/1m window"));
        assert!(summary.contains("playlists 1day"));
    }
}
