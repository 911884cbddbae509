use std::{
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::info;

use crate::{
    account::AccountConfig,
    error::PlaylistError,
    selection::{SelectionItem, UserSelections},
    Identity,
};

/// Serializes selections into M3U playlists inside one directory.
#[derive(Debug, Clone)]
pub struct PlaylistWriter {
    dir: PathBuf,
}

impl PlaylistWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `playlist_<identity>.m3u` inside the playlist directory.
    pub fn path_for(&self, identity: Identity) -> PathBuf {
        self.dir.join(format!("playlist_{}.m3u", identity))
    }

    /// Renders the playlist document.
    ///
    /// Channels come first, then movies, then episodes, each in the order they
    /// were selected.
    pub fn render(selections: &UserSelections, account: &AccountConfig) -> String {
        let mut out = String::from("#EXTM3U\n");

        for item in selections.iter() {
            push_entry(&mut out, item, account);
        }

        out
    }

    /// Writes the playlist of `identity`.
    ///
    /// Returns `Ok(None)` when there is nothing selected. The document is
    /// written to a temporary file in the same directory and renamed into
    /// place, so readers never observe a partial playlist.
    pub fn write(
        &self,
        identity: Identity,
        selections: &UserSelections,
        account: &AccountConfig,
    ) -> Result<Option<PathBuf>, PlaylistError> {
        if selections.is_empty() {
            return Ok(None);
        }

        let document = Self::render(selections, account);
        let target = self.path_for(identity);

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|source| PlaylistError::Create {
            dir: self.dir.clone(),
            source,
        })?;
        tmp.write_all(document.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| PlaylistError::Persist {
            path: target.clone(),
            source: e.error,
        })?;

        info!(
            "📝 Playlist generada para {}: {} entradas en {}",
            identity,
            selections.total(),
            target.display()
        );

        Ok(Some(target))
    }
}

fn push_entry(out: &mut String, item: &SelectionItem, account: &AccountConfig) {
    let id = attribute(&item.id);
    let name = attribute(&item.name);

    out.push_str(&format!(
        "#EXTINF:-1 tvg-id=\"{}\" tvg-name=\"{}\" tvg-logo=\"{}\" group-title=\"{}\",{}\n",
        id,
        name,
        attribute(&item.logo),
        attribute(&item.category),
        name
    ));
    out.push_str(&format!(
        "{}/{}/{}/{}/{}.{}\n",
        account.server,
        item.kind.url_segment(),
        account.username,
        account.password,
        id,
        attribute(&item.container)
    ));
}

/// Keeps a value on one line and inside its quotes.
fn attribute(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '\r' | '\n' => ' ',
            '"' => '\'',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{ContentKind, SelectionStore};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn item(id: &str, name: &str, kind: ContentKind, container: &str, category: &str) -> SelectionItem {
        SelectionItem {
            id: id.to_string(),
            name: name.to_string(),
            logo: String::new(),
            container: container.to_string(),
            category: category.to_string(),
            kind,
            episode: None,
        }
    }

    fn account() -> AccountConfig {
        AccountConfig::new("http://x.tv", "u", "p")
    }

    #[test]
    fn single_channel_document_is_exact() {
        let store = SelectionStore::new();
        store.add(1, ContentKind::Channel, item("7", "Sports", ContentKind::Channel, "ts", "TV"));

        let document = PlaylistWriter::render(&store.get(1), &account());

        assert_eq!(
            document,
            "#EXTM3U\n\
             #EXTINF:-1 tvg-id=\"7\" tvg-name=\"Sports\" tvg-logo=\"\" group-title=\"TV\",Sports\n\
             http://x.tv/live/u/p/7.ts\n"
        );
    }

    #[test]
    fn kinds_are_rendered_channels_movies_series() {
        let store = SelectionStore::new();
        store.add(1, ContentKind::Series, item("30", "Show - S1E1 - Pilot", ContentKind::Series, "mkv", "Shows"));
        store.add(1, ContentKind::Movie, item("20", "Film", ContentKind::Movie, "mp4", "Movies"));
        store.add(1, ContentKind::Channel, item("10", "News", ContentKind::Channel, "ts", "TV"));

        let document = PlaylistWriter::render(&store.get(1), &account());
        let urls: Vec<_> = document.lines().filter(|l| l.starts_with("http")).collect();

        assert_eq!(
            urls,
            [
                "http://x.tv/live/u/p/10.ts",
                "http://x.tv/movie/u/p/20.mp4",
                "http://x.tv/series/u/p/30.mkv",
            ]
        );
    }

    #[test]
    fn hostile_names_cannot_break_lines() {
        let store = SelectionStore::new();
        store.add(1, ContentKind::Movie, item("1", "Bad\n\"Name\"", ContentKind::Movie, "mp4", "X"));

        let document = PlaylistWriter::render(&store.get(1), &account());

        assert_eq!(document.lines().count(), 3);
        assert!(document.contains("tvg-name=\"Bad 'Name'\""));
    }

    #[test]
    fn empty_selection_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let writer = PlaylistWriter::new(dir.path());

        let result = writer.write(1, &UserSelections::default(), &account()).unwrap();

        assert!(result.is_none());
        assert!(!writer.path_for(1).exists());
    }

    #[test]
    fn write_replaces_playlist_atomically() {
        let dir = TempDir::new().unwrap();
        let writer = PlaylistWriter::new(dir.path());
        let store = SelectionStore::new();
        store.add(42, ContentKind::Channel, item("7", "Sports", ContentKind::Channel, "ts", "TV"));

        let path = writer.write(42, &store.get(42), &account()).unwrap().unwrap();
        assert_eq!(path, dir.path().join("playlist_42.m3u"));

        store.add(42, ContentKind::Movie, item("8", "Film", ContentKind::Movie, "mp4", "Movies"));
        writer.write(42, &store.get(42), &account()).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.ends_with("http://x.tv/movie/u/p/8.mp4\n"));

        // Only the final playlist remains; no temporary files are left behind
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let writer = PlaylistWriter::new(dir.path().join("gone"));
        let store = SelectionStore::new();
        store.add(1, ContentKind::Channel, item("7", "Sports", ContentKind::Channel, "ts", "TV"));

        let result = writer.write(1, &store.get(1), &account());
        assert!(matches!(result, Err(PlaylistError::Create { .. })));
    }
}
