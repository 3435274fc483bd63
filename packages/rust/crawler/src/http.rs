//! Plain HTTP page fetcher.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::{debug, instrument, warn};

use vcdossier_shared::{DossierError, Result, ScrapeSettings};

use crate::{PageFetcher, ScrapedPage};

/// Fetches pages with a single GET; no script execution.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(settings: &ScrapeSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(settings.navigation_timeout_secs))
            .build()
            .map_err(|e| DossierError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(skip_all, fields(url = %url))]
    async fn fetch(&self, url: &str) -> ScrapedPage {
        debug!("fetching page");

        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "request failed");
                return ScrapedPage::failed(url, e.to_string());
            }
        };

        let status_code = response.status().as_u16();
        match response.text().await {
            Ok(body) => ScrapedPage {
                url: url.to_string(),
                status_code,
                html: Some(body),
                error: None,
                fetched_at: Utc::now(),
            },
            Err(e) => {
                warn!(status_code, error = %e, "body read failed");
                ScrapedPage {
                    status_code,
                    ..ScrapedPage::failed(url, format!("body read failed: {e}"))
                }
            }
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
