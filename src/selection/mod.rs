//! # Selection Module
//!
//! Per-identity collection of the channels, movies and episodes a user has
//! picked for export.
//!
//! Each identity owns three ordered lists. Within one list ids are unique;
//! adding an item whose id is empty or already present is rejected. Order of
//! insertion is kept and is the order of the exported playlist.

pub mod projection;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::Identity;

/// The three content categories a selection is split into.
///
/// `Series` items are individual episodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Channel,
    Movie,
    Series,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [ContentKind::Channel, ContentKind::Movie, ContentKind::Series];

    /// Path segment of the stream URL (`live`, `movie`, `series`).
    pub fn url_segment(self) -> &'static str {
        match self {
            Self::Channel => "live",
            Self::Movie => "movie",
            Self::Series => "series",
        }
    }

    pub fn default_container(self) -> &'static str {
        match self {
            Self::Channel => "ts",
            Self::Movie | Self::Series => "mp4",
        }
    }

    /// Group title used when the upstream item carries no category name.
    pub fn default_label(self) -> &'static str {
        match self {
            Self::Channel => "Channels",
            Self::Movie => "Movies",
            Self::Series => "Series",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Channel => 0,
            Self::Movie => 1,
            Self::Series => 2,
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Channel => "channels",
            Self::Movie => "movies",
            Self::Series => "series",
        };
        f.write_str(name)
    }
}

/// Series position of an episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeTag {
    pub series_name: String,
    pub season: String,
    pub episode: String,
}

/// One entry of a user's selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionItem {
    pub id: String,
    pub name: String,
    pub logo: String,
    pub container: String,
    pub category: String,
    pub kind: ContentKind,
    pub episode: Option<EpisodeTag>,
}

/// Snapshot of one identity's selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserSelections {
    pub channels: Vec<SelectionItem>,
    pub movies: Vec<SelectionItem>,
    pub series: Vec<SelectionItem>,
}

impl UserSelections {
    pub fn list(&self, kind: ContentKind) -> &[SelectionItem] {
        match kind {
            ContentKind::Channel => &self.channels,
            ContentKind::Movie => &self.movies,
            ContentKind::Series => &self.series,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.channels.len() + self.movies.len() + self.series.len()
    }

    /// Channels, then movies, then episodes, each in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SelectionItem> {
        self.channels.iter().chain(&self.movies).chain(&self.series)
    }
}

/// Item counts of one identity's selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SelectionStats {
    pub channels: usize,
    pub movies: usize,
    pub series: usize,
    /// Same as `series`: every series entry is an episode.
    pub episodes: usize,
    pub total: usize,
}

#[derive(Debug, Default)]
struct KindList {
    items: Vec<SelectionItem>,
    ids: HashSet<String>,
}

impl KindList {
    fn push(&mut self, item: SelectionItem) -> bool {
        if !self.ids.insert(item.id.clone()) {
            return false;
        }
        self.items.push(item);
        true
    }

    fn clear(&mut self) {
        self.items.clear();
        self.ids.clear();
    }
}

#[derive(Debug, Default)]
struct SelectionLists {
    lists: [KindList; 3],
}

impl SelectionLists {
    fn add(&mut self, kind: ContentKind, mut item: SelectionItem) -> bool {
        if item.id.trim().is_empty() {
            return false;
        }
        item.kind = kind;
        self.lists[kind.index()].push(item)
    }

    fn snapshot(&self) -> UserSelections {
        UserSelections {
            channels: self.lists[ContentKind::Channel.index()].items.clone(),
            movies: self.lists[ContentKind::Movie.index()].items.clone(),
            series: self.lists[ContentKind::Series.index()].items.clone(),
        }
    }

    fn len(&self, kind: ContentKind) -> usize {
        self.lists[kind.index()].items.len()
    }
}

/// Selections of every identity, sharded by identity.
///
/// Every mutation runs under the identity's map entry guard, so the
/// duplicate check and the append are one atomic step.
#[derive(Debug, Default)]
pub struct SelectionStore {
    users: DashMap<Identity, SelectionLists>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot, creating empty lists on first access.
    pub fn get(&self, identity: Identity) -> UserSelections {
        self.users.entry(identity).or_default().snapshot()
    }

    /// Adds `item` to the `kind` list of `identity`.
    ///
    /// Returns `false` if the id is empty or already selected.
    pub fn add(&self, identity: Identity, kind: ContentKind, item: SelectionItem) -> bool {
        let mut lists = self.users.entry(identity).or_default();
        let added = lists.add(kind, item);
        if added {
            debug!("➕ Agregado a {} de {}", kind, identity);
        }
        added
    }

    /// Adds every item, returning how many were accepted.
    pub fn add_many<I>(&self, identity: Identity, kind: ContentKind, items: I) -> usize
    where
        I: IntoIterator<Item = SelectionItem>,
    {
        let mut lists = self.users.entry(identity).or_default();
        let added = items
            .into_iter()
            .map(|item| lists.add(kind, item))
            .filter(|added| *added)
            .count();

        info!("➕ Agregados {} elementos a {} de {}", added, kind, identity);
        added
    }

    /// Empties one list, or all three when `kind` is `None`.
    pub fn clear(&self, identity: Identity, kind: Option<ContentKind>) {
        if let Some(mut lists) = self.users.get_mut(&identity) {
            match kind {
                Some(kind) => lists.lists[kind.index()].clear(),
                None => lists.lists.iter_mut().for_each(KindList::clear),
            }
            info!("🗑️ Selección {} de {} vaciada", kind.map_or("completa".to_string(), |k| k.to_string()), identity);
        }
    }

    pub fn stats(&self, identity: Identity) -> SelectionStats {
        let lists = self.users.entry(identity).or_default();
        let channels = lists.len(ContentKind::Channel);
        let movies = lists.len(ContentKind::Movie);
        let series = lists.len(ContentKind::Series);

        SelectionStats {
            channels,
            movies,
            series,
            episodes: series,
            total: channels + movies + series,
        }
    }

    /// Identities that have touched the store.
    pub fn active_identities(&self) -> usize {
        self.users.len()
    }

    /// Items selected across all identities and kinds.
    pub fn total_items(&self) -> usize {
        self.users
            .iter()
            .map(|entry| ContentKind::ALL.iter().map(|k| entry.value().len(*k)).sum::<usize>())
            .sum()
    }
}
