use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

use super::{classify_body, CatalogFetcher, FetchOutcome};
use crate::{catalog::QueryParams, error::FetchError};

/// Client for the upstream `player_api.php` over HTTP.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()?;

        Ok(Self { client })
    }

    async fn try_get(&self, endpoint: &str, params: &QueryParams) -> Result<(StatusCode, String), FetchError> {
        let response = self.client.get(endpoint).query(params).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    async fn try_post(&self, endpoint: &str, params: &QueryParams) -> Result<(StatusCode, String), FetchError> {
        let response = self.client.post(endpoint).form(params).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

#[async_trait]
impl CatalogFetcher for HttpFetcher {
    async fn fetch(&self, endpoint: &str, params: &QueryParams) -> FetchOutcome {
        let action = params.get("action").map(String::as_str).unwrap_or("?");

        match self.try_get(endpoint, params).await {
            Ok((status, body)) if status == StatusCode::OK => return classify_body(body),
            Ok((status, _)) => {
                debug!("GET {} answered {}, retrying as POST", action, status);
            }
            Err(e) => {
                warn!("❌ GET {} falló: {}", action, e);
                return FetchOutcome::Failed(e);
            }
        }

        match self.try_post(endpoint, params).await {
            Ok((status, body)) if status == StatusCode::OK => classify_body(body),
            Ok((status, _)) => {
                warn!("❌ POST {} answered {}", action, status);
                FetchOutcome::Failed(FetchError::Status(status.as_u16()))
            }
            Err(e) => {
                warn!("❌ POST {} falló: {}", action, e);
                FetchOutcome::Failed(e)
            }
        }
    }
}
