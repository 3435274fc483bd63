//! LinkedIn data providers.
//!
//! Profiles and company pages are scraped by third-party vendors behind the
//! [`LinkedInProvider`] trait. Providers never fail: a job that exhausts its
//! retry budget (or returns nothing) yields `success = false`.

mod apify;
mod bright_data;
mod format;
mod insights;

use std::future::Future;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use vcdossier_shared::{
    LinkedInCompany, LinkedInConfig, LinkedInProfile, LinkedInVendor, Result, RetryPolicy,
};

pub use apify::ApifyProvider;
pub use bright_data::BrightDataProvider;
pub use format::{
    company_from_apify, company_from_bright_data, profile_from_apify, profile_from_bright_data,
};
pub use insights::{ProfileInsights, SkillCount, extract_insights};

// ---------------------------------------------------------------------------
// ScrapeOutcome
// ---------------------------------------------------------------------------

/// Result of one scrape job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeOutcome<T> {
    pub success: bool,
    pub records: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ScrapeOutcome<T> {
    pub fn ok(records: Vec<T>) -> Self {
        Self {
            success: true,
            records,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            records: Vec::new(),
            message: Some(message.into()),
        }
    }

    /// Records on success, empty otherwise.
    pub fn into_records(self) -> Vec<T> {
        if self.success { self.records } else { Vec::new() }
    }
}

// ---------------------------------------------------------------------------
// LinkedInProvider
// ---------------------------------------------------------------------------

/// A vendor that turns LinkedIn URLs into structured records.
#[async_trait]
pub trait LinkedInProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn scrape_profiles(&self, urls: &[String]) -> ScrapeOutcome<LinkedInProfile>;

    async fn scrape_companies(&self, urls: &[String]) -> ScrapeOutcome<LinkedInCompany>;
}

/// Run a vendor job under `policy`, then map raw records with `format`.
pub(crate) async fn collect<T, F, Fut>(
    vendor: &str,
    job: &str,
    policy: &RetryPolicy,
    fetch: F,
    format: fn(Value) -> T,
) -> ScrapeOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<Value>>>,
{
    let operation = format!("{vendor}.{job}");
    match policy.retry(&operation, fetch).await {
        Ok(records) if records.is_empty() => {
            warn!(vendor, job, "no records returned");
            ScrapeOutcome::failed(format!("No data returned from {vendor}"))
        }
        Ok(records) => {
            info!(vendor, job, records = records.len(), "scrape complete");
            ScrapeOutcome::ok(records.into_iter().map(format).collect())
        }
        Err(e) => {
            warn!(vendor, job, error = %e, "scrape failed");
            ScrapeOutcome::failed(format!(
                "{vendor} scraping failed after {} attempts: {e}",
                policy.max_retries + 1
            ))
        }
    }
}

/// Split LinkedIn URLs into (profiles, companies); `/company/` and `/school/` are companies.
pub fn split_linkedin_urls(urls: &[String]) -> (Vec<String>, Vec<String>) {
    urls.iter()
        .cloned()
        .partition(|url| !(url.contains("/company/") || url.contains("/school/")))
}

/// Build the configured provider. `None` when disabled or its secret is missing.
pub fn provider_from_config(config: &LinkedInConfig) -> Option<Box<dyn LinkedInProvider>> {
    let built: Result<Box<dyn LinkedInProvider>> = match config.provider {
        LinkedInVendor::None => {
            info!("LinkedIn scraping disabled");
            return None;
        }
        LinkedInVendor::BrightData => {
            BrightDataProvider::from_config(config).map(|p| Box::new(p) as Box<dyn LinkedInProvider>)
        }
        LinkedInVendor::Apify => {
            ApifyProvider::from_config(config).map(|p| Box::new(p) as Box<dyn LinkedInProvider>)
        }
    };

    match built {
        Ok(provider) => {
            info!(provider = provider.name(), "LinkedIn provider ready");
            Some(provider)
        }
        Err(e) => {
            warn!(error = %e, "LinkedIn provider unavailable, LinkedIn phases will be skipped");
            None
        }
    }
}
