use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use url::Url;

/// Credentials of an upstream streaming account.
///
/// Built from the playlist URL a user pastes into the chat, e.g.
/// `http://host:8080/get.php?username=u&password=p&type=m3u_plus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// `scheme://host[:port]`, without trailing slash
    pub server: String,
    pub username: String,
    pub password: String,
    /// `<server>/player_api.php`
    pub api_url: String,
}

impl AccountConfig {
    pub fn new(server: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        let server = server.into().trim_end_matches('/').to_string();
        let api_url = format!("{}/player_api.php", server);
        Self {
            server,
            username: username.into(),
            password: password.into(),
            api_url,
        }
    }

    /// Extracts account credentials from a playlist URL.
    ///
    /// Returns `None` if the text is not an absolute URL with a host, or if
    /// either `username` or `password` is missing or empty.
    pub fn from_playlist_url(text: &str) -> Option<Self> {
        let parsed = match Url::parse(text.trim()) {
            Ok(url) => url,
            Err(e) => {
                warn!("URL de playlist inválida: {}", e);
                return None;
            }
        };

        let host = parsed.host_str()?;
        let server = match parsed.port() {
            Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
            None => format!("{}://{}", parsed.scheme(), host),
        };

        let mut username = None;
        let mut password = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "username" if username.is_none() => username = Some(value.into_owned()),
                "password" if password.is_none() => password = Some(value.into_owned()),
                _ => {}
            }
        }

        match (username, password) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                Some(Self::new(server, user, pass))
            }
            _ => None,
        }
    }
}

/// Account and server summary shown to the user after connecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub server: String,
    pub username: String,
    pub status: String,
    pub exp_date: String,
    pub active_cons: String,
    pub max_connections: String,
    pub available_channels: String,
    pub available_movies: String,
    pub available_series: String,
}

impl AccountInfo {
    /// Projects a `get_account_info` response.
    ///
    /// Missing fields fall back to `Active` / `N/A` / `0` / `1`; a response
    /// without a `user_info` section (raw text wrapper) is reported as `Online`.
    pub fn from_response(account: &AccountConfig, data: &Value) -> Self {
        let user_info = data.get("user_info").filter(|v| v.is_object());
        let server_info = data.get("server_info").filter(|v| v.is_object());

        let status_default = if user_info.is_some() { "Active" } else { "Online" };

        Self {
            server: account.server.clone(),
            username: account.username.clone(),
            status: field(user_info, "status", status_default),
            exp_date: field(user_info, "exp_date", "N/A"),
            active_cons: field(user_info, "active_cons", "0"),
            max_connections: field(user_info, "max_connections", "1"),
            available_channels: field(server_info, "available_channels", "0"),
            available_movies: field(server_info, "available_movies", "0"),
            available_series: field(server_info, "available_series", "0"),
        }
    }

    /// Summary used when the upstream did not answer.
    pub fn unreachable(account: &AccountConfig) -> Self {
        Self {
            server: account.server.clone(),
            username: account.username.clone(),
            status: "Connected".to_string(),
            exp_date: "N/A".to_string(),
            active_cons: "0".to_string(),
            max_connections: "1".to_string(),
            available_channels: "N/A".to_string(),
            available_movies: "N/A".to_string(),
            available_series: "N/A".to_string(),
        }
    }
}

fn field(section: Option<&Value>, key: &str, default: &str) -> String {
    section
        .and_then(|s| s.get(key))
        .and_then(value_to_string)
        .unwrap_or_else(|| default.to_string())
}

/// Renders scalar JSON values as plain strings; `null`, empty strings and
/// containers yield `None`.
pub(crate) fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_get_php_url() {
        let account = AccountConfig::from_playlist_url(
            "http://tv.example.com:8080/get.php?username=alice&password=s3cret&type=m3u_plus",
        )
        .unwrap();

        assert_eq!(account.server, "http://tv.example.com:8080");
        assert_eq!(account.username, "alice");
        assert_eq!(account.password, "s3cret");
        assert_eq!(account.api_url, "http://tv.example.com:8080/player_api.php");
    }

    #[test]
    fn rejects_url_without_credentials() {
        assert!(AccountConfig::from_playlist_url("http://tv.example.com/get.php?username=alice").is_none());
        assert!(AccountConfig::from_playlist_url("http://tv.example.com/get.php?username=&password=x").is_none());
        assert!(AccountConfig::from_playlist_url("not a url").is_none());
    }

    #[test]
    fn account_info_uses_fallbacks() {
        let account = AccountConfig::new("http://x.tv/", "u", "p");
        assert_eq!(account.server, "http://x.tv");

        let info = AccountInfo::from_response(
            &account,
            &json!({"user_info": {"status": "Active", "exp_date": 1700000000, "max_connections": "2"}}),
        );
        assert_eq!(info.exp_date, "1700000000");
        assert_eq!(info.max_connections, "2");
        assert_eq!(info.active_cons, "0");
        assert_eq!(info.available_movies, "0");

        let raw = AccountInfo::from_response(&account, &json!({"status": "ok", "raw_data": "hello"}));
        assert_eq!(raw.status, "Online");
    }
}
