//! Apify actors run synchronously via `run-sync-get-dataset-items`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::instrument;

use vcdossier_shared::{
    ApifyConfig, DossierError, LinkedInCompany, LinkedInConfig, LinkedInProfile, Result,
    RetryPolicy, read_secret,
};

use crate::format::{company_from_apify, profile_from_apify};
use crate::{LinkedInProvider, ScrapeOutcome, collect};

const VENDOR: &str = "Apify";

/// Synchronous actor runs are capped at five minutes server-side.
const RUN_TIMEOUT: Duration = Duration::from_secs(330);

pub struct ApifyProvider {
    client: Client,
    config: ApifyConfig,
    token: String,
    retry: RetryPolicy,
}

impl ApifyProvider {
    pub fn from_config(config: &LinkedInConfig) -> Result<Self> {
        let token = read_secret(&config.apify.token_env).ok_or_else(|| {
            DossierError::config(format!(
                "Apify token not found. Set the {} environment variable.",
                config.apify.token_env
            ))
        })?;
        Self::new(config, token)
    }

    pub fn new(config: &LinkedInConfig, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("vcdossier/", env!("CARGO_PKG_VERSION")))
            .timeout(RUN_TIMEOUT)
            .build()
            .map_err(|e| DossierError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: config.apify.clone(),
            token: token.into(),
            retry: RetryPolicy::with_attempts(config.max_attempts, config.initial_backoff_ms),
        })
    }

    /// Actor ids are written `user/name` but addressed as `user~name`.
    fn run_url(&self, actor: &str) -> String {
        format!(
            "{}/v2/acts/{}/run-sync-get-dataset-items",
            self.config.base_url.trim_end_matches('/'),
            actor.replace('/', "~")
        )
    }

    async fn run_actor(&self, actor: &str, input: &Value) -> Result<Vec<Value>> {
        let response = self
            .client
            .post(self.run_url(actor))
            .query(&[("token", self.token.as_str())])
            .json(input)
            .send()
            .await
            .map_err(|e| DossierError::Network(format!("actor run failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DossierError::api("apify", status.as_u16(), body));
        }

        let items: Value = response
            .json()
            .await
            .map_err(|e| DossierError::parse(format!("unexpected dataset items: {e}")))?;

        match items {
            Value::Array(items) => Ok(items),
            other => Err(DossierError::parse(format!(
                "expected dataset item array, got {}",
                type_name(&other)
            ))),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn url_inputs(urls: &[String]) -> Vec<Value> {
    urls.iter().map(|url| json!({ "url": url })).collect()
}

#[async_trait]
impl LinkedInProvider for ApifyProvider {
    fn name(&self) -> &'static str {
        "apify"
    }

    #[instrument(skip_all, fields(urls = urls.len()))]
    async fn scrape_profiles(&self, urls: &[String]) -> ScrapeOutcome<LinkedInProfile> {
        if urls.is_empty() {
            return ScrapeOutcome::ok(Vec::new());
        }
        let input = json!({
            "urls": url_inputs(urls),
            "findContacts.contactCompassToken": "",
            "scrapeCompany": false,
        });
        let actor = self.config.profile_actor.as_str();
        collect(
            VENDOR,
            "profiles",
            &self.retry,
            || self.run_actor(actor, &input),
            profile_from_apify,
        )
        .await
    }

    #[instrument(skip_all, fields(urls = urls.len()))]
    async fn scrape_companies(&self, urls: &[String]) -> ScrapeOutcome<LinkedInCompany> {
        if urls.is_empty() {
            return ScrapeOutcome::ok(Vec::new());
        }
        let Some(actor) = self.config.company_actor.as_deref() else {
            return ScrapeOutcome::failed("Apify company scraping requires linkedin.apify.company_actor");
        };
        let input = json!({ "urls": url_inputs(urls) });
        collect(
            VENDOR,
            "companies",
            &self.retry,
            || self.run_actor(actor, &input),
            company_from_apify,
        )
        .await
    }
}
