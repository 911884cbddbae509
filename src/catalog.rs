//! Upstream catalog queries and their cache fingerprints.

use std::collections::BTreeMap;

use crate::account::AccountConfig;

/// Query string parameters of one upstream request.
///
/// A `BTreeMap` keeps keys sorted, so two maps with the same pairs serialize
/// identically regardless of insertion order.
pub type QueryParams = BTreeMap<String, String>;

/// Actions understood by the upstream `player_api.php`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogQuery {
    AccountInfo,
    LiveCategories,
    VodCategories,
    SeriesCategories,
    LiveStreams { category_id: Option<String> },
    VodStreams { category_id: Option<String> },
    Series { category_id: Option<String> },
    SeriesInfo { series_id: String },
    MovieInfo { movie_id: String },
    EpisodeInfo { episode_id: String },
}

impl CatalogQuery {
    pub fn action(&self) -> &'static str {
        match self {
            Self::AccountInfo => "get_account_info",
            Self::LiveCategories => "get_live_categories",
            Self::VodCategories => "get_vod_categories",
            Self::SeriesCategories => "get_series_categories",
            Self::LiveStreams { .. } => "get_live_streams",
            Self::VodStreams { .. } => "get_vod_streams",
            Self::Series { .. } => "get_series",
            Self::SeriesInfo { .. } => "get_series_info",
            Self::MovieInfo { .. } => "get_movie_info",
            Self::EpisodeInfo { .. } => "get_episode_info",
        }
    }

    /// Builds the full parameter map, credentials included.
    pub fn params(&self, account: &AccountConfig) -> QueryParams {
        let mut params = QueryParams::new();
        params.insert("username".to_string(), account.username.clone());
        params.insert("password".to_string(), account.password.clone());
        params.insert("action".to_string(), self.action().to_string());

        match self {
            Self::LiveStreams { category_id }
            | Self::VodStreams { category_id }
            | Self::Series { category_id } => {
                if let Some(id) = category_id.as_ref().filter(|id| !id.is_empty()) {
                    params.insert("category_id".to_string(), id.clone());
                }
            }
            Self::SeriesInfo { series_id } => {
                params.insert("series_id".to_string(), series_id.clone());
            }
            Self::MovieInfo { movie_id } => {
                params.insert("movie_id".to_string(), movie_id.clone());
            }
            Self::EpisodeInfo { episode_id } => {
                params.insert("episode_id".to_string(), episode_id.clone());
            }
            _ => {}
        }

        params
    }
}

/// Cache key of an upstream request.
///
/// The canonical form is the endpoint followed by the sorted-key JSON
/// encoding of the parameters. JSON string escaping makes the encoding
/// injective, so the string itself is the key and two different requests can
/// never share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(endpoint: &str, params: &QueryParams) -> Self {
        // Serializing a map of strings cannot fail.
        let encoded = serde_json::to_string(params).unwrap_or_default();
        Self(format!("{}\n{}", endpoint, encoded))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Credentials live in the key; only show the action part.
        match self.0.find("\"action\":") {
            Some(pos) => {
                let rest = &self.0[pos + 9..];
                let end = rest.find(',').or_else(|| rest.find('}')).unwrap_or(rest.len());
                write!(f, "action={}", &rest[..end])
            }
            None => write!(f, "<{} bytes>", self.0.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn fingerprint_ignores_insertion_order() {
        let a = params(&[("a", "1"), ("b", "2")]);
        let b = params(&[("b", "2"), ("a", "1")]);
        assert_eq!(Fingerprint::new("http://x.tv/api", &a), Fingerprint::new("http://x.tv/api", &b));
    }

    #[test]
    fn fingerprint_separates_endpoints_and_values() {
        let p = params(&[("a", "1")]);
        assert_ne!(Fingerprint::new("http://x.tv/api", &p), Fingerprint::new("http://y.tv/api", &p));

        // Values that would collide under naive concatenation stay distinct
        let left = params(&[("a", "1,b=2")]);
        let right = params(&[("a", "1"), ("b", "2")]);
        assert_ne!(Fingerprint::new("e", &left), Fingerprint::new("e", &right));
    }

    #[test]
    fn query_params_include_credentials_and_filters() {
        let account = AccountConfig::new("http://x.tv", "u", "p");
        let query = CatalogQuery::LiveStreams { category_id: Some("12".to_string()) };
        let built = query.params(&account);

        assert_eq!(built.get("action").map(String::as_str), Some("get_live_streams"));
        assert_eq!(built.get("category_id").map(String::as_str), Some("12"));
        assert_eq!(built.get("username").map(String::as_str), Some("u"));

        let all = CatalogQuery::Series { category_id: None }.params(&account);
        assert!(!all.contains_key("category_id"));

        let episode = CatalogQuery::EpisodeInfo { episode_id: "77".to_string() }.params(&account);
        assert_eq!(episode.get("action").map(String::as_str), Some("get_episode_info"));
        assert_eq!(episode.get("episode_id").map(String::as_str), Some("77"));
    }

    #[test]
    fn fingerprint_display_hides_credentials() {
        let account = AccountConfig::new("http://x.tv", "user", "secret");
        let fp = Fingerprint::new(&account.api_url, &CatalogQuery::AccountInfo.params(&account));
        let shown = fp.to_string();
        assert_eq!(shown, "action=\"get_account_info\"");
        assert!(!shown.contains("secret"));
    }
}
