//! # Upstream Module
//!
//! Access to the third-party catalog API behind an account's
//! `player_api.php` endpoint.
//!
//! The engine only depends on the [`CatalogFetcher`] trait; [`HttpFetcher`]
//! is the production implementation and tests substitute a mock.

pub mod http;

use async_trait::async_trait;
use serde_json::Value;

use crate::{catalog::QueryParams, error::FetchError};

pub use http::HttpFetcher;

/// Classified result of one upstream request.
#[derive(Debug)]
pub enum FetchOutcome {
    /// 200 with a body that decodes as JSON
    Json(Value),
    /// 200 with a non-empty body that is not JSON
    RawText(String),
    /// Timeout, connection failure, non-2xx after the POST retry, empty body
    Failed(FetchError),
}

/// Common trait for anything able to query the upstream catalog.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    /// Issues one logical request: GET first, one POST retry on any non-200.
    ///
    /// Never returns an error; failures are reported as
    /// [`FetchOutcome::Failed`].
    async fn fetch(&self, endpoint: &str, params: &QueryParams) -> FetchOutcome;
}

/// Classifies a successful response body.
pub(crate) fn classify_body(body: String) -> FetchOutcome {
    match serde_json::from_str::<Value>(&body) {
        Ok(value) => FetchOutcome::Json(value),
        Err(_) if body.trim().is_empty() => FetchOutcome::Failed(FetchError::EmptyBody),
        Err(_) => FetchOutcome::RawText(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_json_text_and_empty_bodies() {
        assert!(matches!(classify_body("[1,2]".to_string()), FetchOutcome::Json(_)));
        assert!(matches!(classify_body("Welcome".to_string()), FetchOutcome::RawText(t) if t == "Welcome"));
        assert!(matches!(
            classify_body("  \n".to_string()),
            FetchOutcome::Failed(FetchError::EmptyBody)
        ));
    }
}
