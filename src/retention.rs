use std::{
    fs::Metadata,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};
use tokio::fs;
use tracing::{debug, error, info};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub playlists_removed: usize,
    pub downloads_removed: usize,
    pub failures: usize,
}

impl std::fmt::Display for SweepReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} playlists, {} descargas eliminadas ({} errores)",
            self.playlists_removed, self.downloads_removed, self.failures
        )
    }
}

/// Removes stale generated playlists and downloaded files.
///
/// Scheduling belongs to the caller; a sweep is a single pass.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    playlist_dir: PathBuf,
    download_dir: PathBuf,
    playlist_max_age: Duration,
    download_max_age: Duration,
}

impl RetentionSweeper {
    pub fn new(
        playlist_dir: impl Into<PathBuf>,
        download_dir: impl Into<PathBuf>,
        playlist_max_age: Duration,
        download_max_age: Duration,
    ) -> Self {
        Self {
            playlist_dir: playlist_dir.into(),
            download_dir: download_dir.into(),
            playlist_max_age,
            download_max_age,
        }
    }

    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(SystemTime::now()).await
    }

    /// Runs one pass as if the current time were `now`.
    pub async fn sweep_at(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();

        let (removed, failed) = sweep_dir(&self.playlist_dir, now, self.playlist_max_age, |name, meta| {
            if name.starts_with("playlist_") && name.ends_with(".m3u") {
                meta.modified().ok()
            } else {
                None
            }
        })
        .await;
        report.playlists_removed = removed;
        report.failures += failed;

        // Creation time where the platform records it, mtime otherwise.
        let (removed, failed) = sweep_dir(&self.download_dir, now, self.download_max_age, |_, meta| {
            meta.created().or_else(|_| meta.modified()).ok()
        })
        .await;
        report.downloads_removed = removed;
        report.failures += failed;

        if report.playlists_removed + report.downloads_removed + report.failures > 0 {
            info!("🧹 Limpieza completada: {}", report);
        }

        report
    }
}

/// Deletes regular files in `dir` whose timestamp (picked by `stamp`) is older
/// than `max_age`. Returns `(removed, failures)`.
async fn sweep_dir<F>(dir: &Path, now: SystemTime, max_age: Duration, stamp: F) -> (usize, usize)
where
    F: Fn(&str, &Metadata) -> Option<SystemTime>,
{
    let mut stale = Vec::new();
    let mut failures = 0;

    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return (0, 0),
        Err(e) => {
            error!("Error leyendo {}: {}", dir.display(), e);
            return (0, 1);
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                error!("Error recorriendo {}: {}", dir.display(), e);
                failures += 1;
                break;
            }
        };

        let path = entry.path();
        let metadata = match entry.metadata().await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => continue,
            Err(e) => {
                error!("Error leyendo metadata de {}: {}", path.display(), e);
                failures += 1;
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(stamped) = stamp(&name, &metadata) else {
            continue;
        };

        if now.duration_since(stamped).unwrap_or_default() > max_age {
            stale.push(path);
        }
    }

    let (removed, failed) = remove_files(&stale).await;
    (removed, failures + failed)
}

/// Removes every path, logging and counting failures instead of stopping.
/// Returns `(removed, failures)`.
async fn remove_files(paths: &[PathBuf]) -> (usize, usize) {
    let mut removed = 0;
    let mut failures = 0;

    for path in paths {
        match fs::remove_file(path).await {
            Ok(()) => {
                removed += 1;
                debug!("🗑️ Archivo antiguo eliminado: {}", path.display());
            }
            Err(e) => {
                error!("Error eliminando {}: {}", path.display(), e);
                failures += 1;
            }
        }
    }

    (removed, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    fn touch(path: &Path, modified: SystemTime) {
        let file = File::create(path).unwrap();
        file.set_modified(modified).unwrap();
    }

    fn sweeper(work: &TempDir, downloads: &TempDir) -> RetentionSweeper {
        RetentionSweeper::new(work.path(), downloads.path(), 24 * HOUR, HOUR)
    }

    #[tokio::test]
    async fn removes_playlists_older_than_a_day() {
        let work = TempDir::new().unwrap();
        let downloads = TempDir::new().unwrap();
        let now = SystemTime::now();

        touch(&work.path().join("playlist_1.m3u"), now - 25 * HOUR);
        touch(&work.path().join("playlist_2.m3u"), now - HOUR);
        touch(&work.path().join("notes.txt"), now - 48 * HOUR);

        let report = sweeper(&work, &downloads).sweep().await;

        assert_eq!(report.playlists_removed, 1);
        assert!(!work.path().join("playlist_1.m3u").exists());
        assert!(work.path().join("playlist_2.m3u").exists());
        assert!(work.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn removes_downloads_older_than_an_hour() {
        let work = TempDir::new().unwrap();
        let downloads = TempDir::new().unwrap();
        std::fs::write(downloads.path().join("download_5.mp4"), b"data").unwrap();

        let sweeper = sweeper(&work, &downloads);

        let report = sweeper.sweep_at(SystemTime::now() + HOUR / 2).await;
        assert_eq!(report.downloads_removed, 0);

        let report = sweeper.sweep_at(SystemTime::now() + 2 * HOUR).await;
        assert_eq!(report.downloads_removed, 1);
        assert!(!downloads.path().join("download_5.mp4").exists());
    }

    #[tokio::test]
    async fn missing_directories_are_not_failures() {
        let root = TempDir::new().unwrap();
        let sweeper = RetentionSweeper::new(root.path().join("a"), root.path().join("b"), HOUR, HOUR);

        assert_eq!(sweeper.sweep().await, SweepReport::default());
    }

    #[tokio::test]
    async fn subdirectories_are_left_alone() {
        let work = TempDir::new().unwrap();
        let downloads = TempDir::new().unwrap();
        std::fs::create_dir(downloads.path().join("nested")).unwrap();

        let report = sweeper(&work, &downloads).sweep_at(SystemTime::now() + 10 * HOUR).await;

        assert_eq!(report.downloads_removed, 0);
        assert!(downloads.path().join("nested").is_dir());
    }

    #[tokio::test]
    async fn failed_removal_does_not_stop_the_pass() {
        let dir = TempDir::new().unwrap();
        let stale = dir.path().join("download_1.mp4");
        let undeletable = dir.path().join("download_2.mp4");
        std::fs::write(&stale, b"data").unwrap();
        // Directories cannot be removed as files, whatever the privileges
        std::fs::create_dir(&undeletable).unwrap();

        let (removed, failures) = remove_files(&[undeletable.clone(), stale.clone()]).await;

        assert_eq!((removed, failures), (1, 1));
        assert!(!stale.exists());
        assert!(undeletable.is_dir());
    }
}
