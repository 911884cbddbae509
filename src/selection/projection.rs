//! Conversion of upstream catalog JSON into [`SelectionItem`]s.

use serde_json::Value;

use super::{ContentKind, EpisodeTag, SelectionItem};
use crate::account::value_to_string;

/// Projects one live or VOD stream listing entry.
///
/// The id comes from `stream_id`, falling back to `id`; entries with neither
/// yield `None`.
pub fn stream_item(kind: ContentKind, raw: &Value, category: &str) -> Option<SelectionItem> {
    let id = raw
        .get("stream_id")
        .and_then(value_to_string)
        .or_else(|| raw.get("id").and_then(value_to_string))?;

    let default_name = match kind {
        ContentKind::Channel => "Unnamed channel",
        ContentKind::Movie => "Unnamed movie",
        ContentKind::Series => "Episode",
    };

    Some(SelectionItem {
        id,
        name: text(raw, "name").unwrap_or_else(|| default_name.to_string()),
        logo: text(raw, "stream_icon").unwrap_or_default(),
        container: text(raw, "container_extension").unwrap_or_else(|| kind.default_container().to_string()),
        category: category.to_string(),
        kind,
        episode: None,
    })
}

/// Group title of a listing entry: its `category_name`, or the kind default.
pub fn category_label(kind: ContentKind, raw: &Value) -> String {
    text(raw, "category_name").unwrap_or_else(|| kind.default_label().to_string())
}

/// Series id of a `get_series` listing entry.
pub fn series_id(raw: &Value) -> Option<String> {
    raw.get("series_id")
        .and_then(value_to_string)
        .or_else(|| raw.get("id").and_then(value_to_string))
}

/// Expands a `get_series_info` answer into one item per episode.
///
/// `series` is the listing entry (name and cover), `info` the series info
/// whose `episodes` object maps season numbers to episode arrays. Seasons
/// are walked in numeric order; episodes without an id are skipped.
pub fn episode_items(series: &Value, info: &Value, category: &str) -> Vec<SelectionItem> {
    let Some(seasons) = info.get("episodes").and_then(Value::as_object) else {
        return Vec::new();
    };

    let series_name = text(series, "name").unwrap_or_else(|| "Series".to_string());
    let cover = text(series, "cover").unwrap_or_default();

    let mut ordered: Vec<(&String, &Value)> = seasons.iter().collect();
    ordered.sort_by_key(|(season, _)| (season.parse::<u64>().unwrap_or(u64::MAX), season.to_string()));

    ordered
        .into_iter()
        .filter_map(|(season, episodes)| episodes.as_array().map(|eps| (season, eps)))
        .flat_map(|(season, episodes)| {
            let series_name = series_name.clone();
            let cover = cover.clone();
            episodes.iter().filter_map(move |episode| {
                let id = episode.get("id").and_then(value_to_string)?;
                let number = episode
                    .get("episode_num")
                    .and_then(value_to_string)
                    .unwrap_or_else(|| "?".to_string());
                let title = text(episode, "title").unwrap_or_else(|| "Episode".to_string());

                Some(SelectionItem {
                    id,
                    name: format!("{} - S{}E{} - {}", series_name, season, number, title),
                    logo: cover.clone(),
                    container: text(episode, "container_extension")
                        .unwrap_or_else(|| ContentKind::Series.default_container().to_string()),
                    category: category.to_string(),
                    kind: ContentKind::Series,
                    episode: Some(EpisodeTag {
                        series_name: series_name.clone(),
                        season: season.clone(),
                        episode: number,
                    }),
                })
            })
        })
        .collect()
}

fn text(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(value_to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stream_item_uses_stream_id_and_defaults() {
        let item = stream_item(ContentKind::Channel, &json!({"stream_id": 7, "name": "Sports"}), "TV").unwrap();
        assert_eq!(item.id, "7");
        assert_eq!(item.name, "Sports");
        assert_eq!(item.logo, "");
        assert_eq!(item.container, "ts");
        assert_eq!(item.category, "TV");

        let movie = stream_item(ContentKind::Movie, &json!({"id": "m1"}), "Films").unwrap();
        assert_eq!(movie.id, "m1");
        assert_eq!(movie.container, "mp4");
        assert_eq!(movie.name, "Unnamed movie");
    }

    #[test]
    fn stream_item_without_id_is_dropped() {
        assert!(stream_item(ContentKind::Movie, &json!({"name": "No id"}), "x").is_none());
        assert!(stream_item(ContentKind::Movie, &json!({"stream_id": null}), "x").is_none());
        assert!(stream_item(ContentKind::Movie, &json!({"stream_id": ""}), "x").is_none());
    }

    #[test]
    fn category_label_falls_back_to_kind() {
        assert_eq!(category_label(ContentKind::Movie, &json!({"category_name": "Action"})), "Action");
        assert_eq!(category_label(ContentKind::Channel, &json!({})), "Channels");
    }

    #[test]
    fn episodes_expand_all_seasons_in_numeric_order() {
        let series = json!({"series_id": 3, "name": "Show", "cover": "http://img/show.jpg"});
        let info = json!({
            "episodes": {
                "10": [{"id": "e10", "episode_num": 1, "title": "Late", "container_extension": "mkv"}],
                "2": [
                    {"id": "e21", "episode_num": 1, "title": "Pilot"},
                    {"episode_num": 2, "title": "Missing id"}
                ]
            }
        });

        let items = episode_items(&series, &info, "My Shows");
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["e21", "e10"]);

        assert_eq!(items[0].name, "Show - S2E1 - Pilot");
        assert_eq!(items[0].container, "mp4");
        assert_eq!(items[0].logo, "http://img/show.jpg");
        assert_eq!(items[0].category, "My Shows");
        assert_eq!(items[1].container, "mkv");
        assert_eq!(
            items[1].episode,
            Some(EpisodeTag {
                series_name: "Show".to_string(),
                season: "10".to_string(),
                episode: "1".to_string(),
            })
        );
    }

    #[test]
    fn series_info_without_episodes_yields_nothing() {
        assert!(episode_items(&json!({"name": "x"}), &json!({"info": {}}), "c").is_empty());
        assert_eq!(series_id(&json!({"series_id": 12})), Some("12".to_string()));
    }
}
