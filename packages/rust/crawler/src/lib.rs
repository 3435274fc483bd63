//! Page fetching for firm websites.
//!
//! This crate provides:
//! - [`PageFetcher`]: the fetch seam used by the pipeline
//! - [`HttpFetcher`]: plain HTTP GET
//! - `BrowserFetcher`: headless Chrome over CDP (feature `browser`)
//! - [`fetcher_from_config`]: engine selection from `[scrape]`

mod http;

#[cfg(feature = "browser")]
mod browser;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vcdossier_shared::{FetchEngine, Result, ScrapeSettings};

#[cfg(feature = "browser")]
pub use browser::BrowserFetcher;
pub use http::HttpFetcher;

// ---------------------------------------------------------------------------
// ScrapedPage
// ---------------------------------------------------------------------------

/// Result of fetching one URL. Failures are recorded, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub url: String,
    /// HTTP status, `0` when no response was received.
    pub status_code: u16,
    pub html: Option<String>,
    pub error: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl ScrapedPage {
    /// A page that could not be fetched at all.
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status_code: 0,
            html: None,
            error: Some(error.into()),
            fetched_at: Utc::now(),
        }
    }

    /// HTML of a `200 OK` page, if any.
    pub fn ok_html(&self) -> Option<&str> {
        match (&self.html, self.status_code) {
            (Some(html), 200) => Some(html),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// PageFetcher
// ---------------------------------------------------------------------------

/// Fetches rendered HTML for a URL. Implementations are used serially.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url`; errors are encoded in the returned page.
    async fn fetch(&self, url: &str) -> ScrapedPage;

    /// Release any held resources (browser process). Safe to call twice.
    async fn close(&self) -> Result<()>;
}

/// Build the fetcher selected by `[scrape] engine`.
pub fn fetcher_from_config(settings: &ScrapeSettings) -> Result<Box<dyn PageFetcher>> {
    match settings.engine {
        FetchEngine::Http => Ok(Box::new(HttpFetcher::new(settings)?)),
        #[cfg(feature = "browser")]
        FetchEngine::Browser => Ok(Box::new(BrowserFetcher::new(settings.clone()))),
        #[cfg(not(feature = "browser"))]
        FetchEngine::Browser => {
            tracing::warn!(
                engine = "browser",
                "built without the `browser` feature; pages are fetched over plain HTTP without JS rendering"
            );
            Ok(Box::new(HttpFetcher::new(settings)?))
        }
    }
}
