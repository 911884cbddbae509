use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tempfile::{NamedTempFile, TempPath};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{info, warn};

use crate::{
    account::{value_to_string, AccountConfig},
    catalog::CatalogQuery,
    error::DownloadError,
    selection::ContentKind,
    Identity,
};

/// Containers for which the re-encoded presets are offered.
const PRESET_CONTAINERS: [&str; 3] = ["mkv", "mp4", "avi"];

/// One downloadable variant of a movie or episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadFormat {
    pub quality: String,
    pub extension: String,
    pub size: String,
}

impl DownloadFormat {
    fn new(quality: &str, extension: &str, size: &str) -> Self {
        Self {
            quality: quality.to_string(),
            extension: extension.to_string(),
            size: size.to_string(),
        }
    }

    /// Offered when the upstream has no `movie_data` for the item.
    pub fn fallback() -> Vec<Self> {
        vec![Self::new("Default", "mp4", "variable size")]
    }

    /// Info query that describes `stream_id`; channels have none.
    pub fn info_query(kind: ContentKind, stream_id: &str) -> Option<CatalogQuery> {
        match kind {
            ContentKind::Channel => None,
            ContentKind::Movie => Some(CatalogQuery::MovieInfo { movie_id: stream_id.to_string() }),
            ContentKind::Series => Some(CatalogQuery::EpisodeInfo { episode_id: stream_id.to_string() }),
        }
    }

    /// Formats listed from a `get_movie_info` / `get_episode_info` answer.
    ///
    /// The original container comes first when known; common containers
    /// (`mp4` when unknown) also get the mp4 quality presets.
    pub fn from_info(info: Option<&Value>) -> Vec<Self> {
        let Some(movie_data) = info.and_then(|i| i.get("movie_data")).filter(|d| d.is_object()) else {
            return Self::fallback();
        };

        let mut formats = Vec::new();
        let container = movie_data.get("container_extension").and_then(value_to_string);

        if let Some(ext) = &container {
            formats.push(Self::new("Original", ext, "original size"));
        }

        if PRESET_CONTAINERS.contains(&container.as_deref().unwrap_or("mp4")) {
            formats.extend([
                Self::new("HD 720p", "mp4", "~1.5GB"),
                Self::new("Full HD 1080p", "mp4", "~3GB"),
                Self::new("SD 480p", "mp4", "~800MB"),
            ]);
        }

        formats
    }
}

/// Opaque byte transfer of movies and episodes into the download directory.
///
/// Only the owner identity may download. Files land as
/// `download_<streamId>.<ext>` and are reclaimed by the retention sweeper.
pub struct DownloadManager {
    client: reqwest::Client,
    dir: PathBuf,
    owner: Identity,
    max_file_size: u64,
}

impl DownloadManager {
    pub fn new(dir: impl Into<PathBuf>, owner: Identity, max_file_size: u64, timeout: Duration) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            dir: dir.into(),
            owner,
            max_file_size,
        })
    }

    pub fn is_allowed(&self, identity: Identity) -> bool {
        identity == self.owner
    }

    pub fn path_for(&self, stream_id: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("download_{}.{}", stream_id, ext))
    }

    /// Source URL of a movie or episode.
    pub fn source_url(account: &AccountConfig, kind: ContentKind, stream_id: &str, ext: &str) -> Result<String, DownloadError> {
        if kind == ContentKind::Channel {
            return Err(DownloadError::UnsupportedKind);
        }

        Ok(format!(
            "{}/{}/{}/{}/{}.{}",
            account.server,
            kind.url_segment(),
            account.username,
            account.password,
            stream_id,
            ext
        ))
    }

    /// Downloads one movie or episode and returns the local path.
    ///
    /// The body is streamed to a uniquely named `.part` file and renamed once
    /// complete; on any failure the partial file is removed.
    pub async fn download(
        &self,
        identity: Identity,
        account: &AccountConfig,
        kind: ContentKind,
        stream_id: &str,
        ext: &str,
    ) -> Result<PathBuf, DownloadError> {
        if !self.is_allowed(identity) {
            return Err(DownloadError::NotAllowed(identity));
        }

        let url = Self::source_url(account, kind, stream_id, ext)?;
        let target = self.path_for(stream_id, ext);

        info!("💾 Iniciando descarga de {} {}", kind, stream_id);

        fs::create_dir_all(&self.dir).await?;
        let (file, partial) = self.partial_file(stream_id, ext)?.into_parts();

        let result = self
            .transfer(&url, fs::File::from_std(file))
            .await
            .and_then(|bytes| Self::commit(partial, &target).map(|()| bytes));

        match result {
            Ok(bytes) => {
                info!("✅ Descarga completada: {} ({} bytes)", target.display(), bytes);
                Ok(target)
            }
            Err(e) => {
                warn!("❌ Descarga de {} falló: {}", stream_id, e);
                Err(e)
            }
        }
    }

    /// Fresh `download_<id>.<random>.<ext>.part` file, removed when dropped.
    fn partial_file(&self, stream_id: &str, ext: &str) -> Result<NamedTempFile, DownloadError> {
        let file = tempfile::Builder::new()
            .prefix(&format!("download_{}.", stream_id))
            .suffix(&format!(".{}.part", ext))
            .tempfile_in(&self.dir)?;
        Ok(file)
    }

    /// Moves a finished partial file into place. On failure the partial file
    /// is removed.
    fn commit(partial: TempPath, target: &Path) -> Result<(), DownloadError> {
        partial.persist(target).map_err(|e| DownloadError::Io(e.error))
    }

    async fn transfer(&self, url: &str, mut file: fs::File) -> Result<u64, DownloadError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(DownloadError::Status(response.status().as_u16()));
        }

        let total = response.content_length().unwrap_or(0);
        if total > self.max_file_size {
            return Err(DownloadError::TooLarge { limit: self.max_file_size });
        }

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let mut last_reported = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            downloaded += chunk.len() as u64;
            if downloaded > self.max_file_size {
                return Err(DownloadError::TooLarge { limit: self.max_file_size });
            }
            file.write_all(&chunk).await?;

            if total > 0 {
                let progress = downloaded * 100 / total;
                if progress >= last_reported + 15 {
                    last_reported = progress;
                    info!("⏳ Progreso: {}%", progress);
                }
            }
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(downloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> DownloadManager {
        DownloadManager::new(dir.path(), 1, 1024, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn source_url_uses_kind_segment() {
        let account = AccountConfig::new("http://x.tv", "u", "p");

        assert_eq!(
            DownloadManager::source_url(&account, ContentKind::Movie, "55", "mkv").unwrap(),
            "http://x.tv/movie/u/p/55.mkv"
        );
        assert_eq!(
            DownloadManager::source_url(&account, ContentKind::Series, "9", "mp4").unwrap(),
            "http://x.tv/series/u/p/9.mp4"
        );
        assert!(matches!(
            DownloadManager::source_url(&account, ContentKind::Channel, "1", "ts"),
            Err(DownloadError::UnsupportedKind)
        ));
    }

    #[test]
    fn artifacts_are_named_after_stream() {
        let dir = TempDir::new().unwrap();
        assert_eq!(manager(&dir).path_for("55", "mkv"), dir.path().join("download_55.mkv"));
    }

    #[tokio::test]
    async fn only_owner_may_download() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let account = AccountConfig::new("http://127.0.0.1:9", "u", "p");

        let result = manager.download(2, &account, ContentKind::Movie, "55", "mp4").await;

        assert!(matches!(result, Err(DownloadError::NotAllowed(2))));
        assert!(manager.is_allowed(1));
    }

    #[tokio::test]
    async fn failed_transfer_leaves_no_files() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        // Port 9 (discard) is closed on test hosts; the connection is refused
        let account = AccountConfig::new("http://127.0.0.1:9", "u", "p");

        let result = manager.download(1, &account, ContentKind::Movie, "55", "mp4").await;

        assert!(matches!(result, Err(DownloadError::Http(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn concurrent_transfers_get_distinct_partial_files() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        let first = manager.partial_file("55", "mp4").unwrap();
        let second = manager.partial_file("55", "mp4").unwrap();

        assert_ne!(first.path(), second.path());
        let name = first.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("download_55."));
        assert!(name.ends_with(".mp4.part"));
    }

    #[test]
    fn failed_commit_removes_the_partial_file() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let target = manager.path_for("55", "mp4");
        // A directory in the way makes the rename fail
        std::fs::create_dir(&target).unwrap();

        let partial = manager.partial_file("55", "mp4").unwrap().into_temp_path();
        let result = DownloadManager::commit(partial, &target);

        assert!(matches!(result, Err(DownloadError::Io(_))));
        let left: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().path()).collect();
        assert_eq!(left, [target]);
    }

    #[test]
    fn formats_follow_the_container_extension() {
        let mkv = DownloadFormat::from_info(Some(&json!({"movie_data": {"container_extension": "mkv"}})));
        assert_eq!(mkv.len(), 4);
        assert_eq!(mkv[0], DownloadFormat::new("Original", "mkv", "original size"));
        assert_eq!(mkv[1].quality, "HD 720p");

        let ts = DownloadFormat::from_info(Some(&json!({"movie_data": {"container_extension": "ts"}})));
        assert_eq!(ts, [DownloadFormat::new("Original", "ts", "original size")]);

        let unknown = DownloadFormat::from_info(Some(&json!({"movie_data": {}})));
        assert_eq!(unknown.len(), 3);
        assert!(unknown.iter().all(|f| f.extension == "mp4"));
    }

    #[test]
    fn formats_fall_back_to_mp4_without_movie_data() {
        assert_eq!(DownloadFormat::from_info(None), DownloadFormat::fallback());
        assert_eq!(DownloadFormat::from_info(Some(&json!({"info": {}}))), DownloadFormat::fallback());
        assert_eq!(DownloadFormat::fallback()[0].extension, "mp4");
    }
}
