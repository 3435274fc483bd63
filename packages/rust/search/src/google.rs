//! Google Custom Search JSON API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use vcdossier_shared::{DossierError, Result, SearchConfig, read_secret};

use crate::{SearchResult, WebSearch};

/// The API rejects `num` outside 1..=10.
const MAX_RESULTS_PER_REQUEST: u32 = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchResult>,
}

/// Client for `GET customsearch/v1`.
pub struct GoogleSearchClient {
    client: Client,
    base_url: String,
    api_key: String,
    engine_id: String,
    country: String,
}

impl GoogleSearchClient {
    /// Build from config, reading the key and engine id from their env vars.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let api_key = read_secret(&config.api_key_env).ok_or_else(|| {
            DossierError::config(format!(
                "Google Search not configured: set {}",
                config.api_key_env
            ))
        })?;
        let engine_id = read_secret(&config.engine_id_env).ok_or_else(|| {
            DossierError::config(format!(
                "Google Search not configured: set {}",
                config.engine_id_env
            ))
        })?;
        Self::new(config, api_key, engine_id)
    }

    pub fn new(
        config: &SearchConfig,
        api_key: impl Into<String>,
        engine_id: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("vcdossier/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DossierError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: api_key.into(),
            engine_id: engine_id.into(),
            country: config.country.clone(),
        })
    }
}

#[async_trait]
impl WebSearch for GoogleSearchClient {
    #[instrument(skip_all, fields(query = %query, num = num))]
    async fn search(&self, query: &str, num: u32) -> Result<Vec<SearchResult>> {
        let num = num.clamp(1, MAX_RESULTS_PER_REQUEST).to_string();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
                ("gl", self.country.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DossierError::Network(format!("search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DossierError::api("google-search", status.as_u16(), body));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| DossierError::parse(format!("unexpected search response: {e}")))?;

        debug!(results = parsed.items.len(), "search complete");
        Ok(parsed.items)
    }
}
