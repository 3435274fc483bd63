//! Bright Data dataset API (trigger → poll progress → download snapshot).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use vcdossier_shared::{
    BrightDataConfig, DossierError, LinkedInCompany, LinkedInConfig, LinkedInProfile, Result,
    RetryPolicy, read_secret,
};

use crate::format::{company_from_bright_data, profile_from_bright_data};
use crate::{LinkedInProvider, ScrapeOutcome, collect};

const VENDOR: &str = "Bright Data";
const SERVICE: &str = "bright-data";

#[derive(Debug, Deserialize)]
struct TriggerResponse {
    snapshot_id: String,
}

#[derive(Debug, Deserialize)]
struct ProgressResponse {
    #[serde(default)]
    status: String,
}

pub struct BrightDataProvider {
    client: Client,
    config: BrightDataConfig,
    api_key: String,
    retry: RetryPolicy,
}

impl BrightDataProvider {
    pub fn from_config(config: &LinkedInConfig) -> Result<Self> {
        let api_key = read_secret(&config.bright_data.api_key_env).ok_or_else(|| {
            DossierError::config(format!(
                "Bright Data API key not found. Set the {} environment variable.",
                config.bright_data.api_key_env
            ))
        })?;
        Self::new(config, api_key)
    }

    pub fn new(config: &LinkedInConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("vcdossier/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| DossierError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: config.bright_data.clone(),
            api_key: api_key.into(),
            retry: RetryPolicy::with_attempts(config.max_attempts, config.initial_backoff_ms),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/datasets/v3/{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DossierError::api(SERVICE, status.as_u16(), body))
    }

    async fn trigger(&self, dataset_id: &str, urls: &[String]) -> Result<String> {
        let inputs: Vec<Value> = urls.iter().map(|url| json!({ "url": url })).collect();

        let response = self
            .client
            .post(self.endpoint("trigger"))
            .bearer_auth(&self.api_key)
            .query(&[("dataset_id", dataset_id), ("include_errors", "true")])
            .json(&inputs)
            .send()
            .await
            .map_err(|e| DossierError::Network(format!("trigger failed: {e}")))?;

        let trigger: TriggerResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| DossierError::parse(format!("unexpected trigger response: {e}")))?;

        debug!(snapshot_id = %trigger.snapshot_id, "snapshot triggered");
        Ok(trigger.snapshot_id)
    }

    async fn wait_until_ready(&self, snapshot_id: &str) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(self.config.max_wait_secs);
        let interval = Duration::from_secs(self.config.poll_interval_secs);

        loop {
            let response = self
                .client
                .get(self.endpoint(&format!("progress/{snapshot_id}")))
                .bearer_auth(&self.api_key)
                .send()
                .await
                .map_err(|e| DossierError::Network(format!("progress check failed: {e}")))?;

            let progress: ProgressResponse = Self::check(response)
                .await?
                .json()
                .await
                .map_err(|e| DossierError::parse(format!("unexpected progress response: {e}")))?;

            match progress.status.as_str() {
                "ready" => return Ok(()),
                "failed" => {
                    return Err(DossierError::api(
                        SERVICE,
                        200,
                        format!("snapshot {snapshot_id} failed"),
                    ));
                }
                status => debug!(snapshot_id, status, "snapshot not ready"),
            }

            if Instant::now() >= deadline {
                return Err(DossierError::Network(format!(
                    "snapshot {snapshot_id} not ready after {}s",
                    self.config.max_wait_secs
                )));
            }
            tokio::time::sleep(interval).await;
        }
    }

    async fn download(&self, snapshot_id: &str) -> Result<Vec<Value>> {
        let response = self
            .client
            .get(self.endpoint(&format!("snapshot/{snapshot_id}")))
            .bearer_auth(&self.api_key)
            .query(&[("format", "json")])
            .send()
            .await
            .map_err(|e| DossierError::Network(format!("snapshot download failed: {e}")))?;

        let body: Value = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| DossierError::parse(format!("unexpected snapshot body: {e}")))?;

        let records = match body {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            single => vec![single],
        };

        // `include_errors` adds per-URL error rows next to the real records.
        let (ok, errors): (Vec<Value>, Vec<Value>) = records
            .into_iter()
            .partition(|r| r.get("error").is_none_or(Value::is_null));
        for row in &errors {
            warn!(url = ?row.get("url"), error = ?row.get("error"), "vendor could not scrape URL");
        }
        Ok(ok)
    }

    async fn run_job(&self, dataset_id: &str, urls: &[String]) -> Result<Vec<Value>> {
        let snapshot_id = self.trigger(dataset_id, urls).await?;
        self.wait_until_ready(&snapshot_id).await?;
        self.download(&snapshot_id).await
    }
}

#[async_trait]
impl LinkedInProvider for BrightDataProvider {
    fn name(&self) -> &'static str {
        SERVICE
    }

    #[instrument(skip_all, fields(urls = urls.len()))]
    async fn scrape_profiles(&self, urls: &[String]) -> ScrapeOutcome<LinkedInProfile> {
        if urls.is_empty() {
            return ScrapeOutcome::ok(Vec::new());
        }
        let dataset = self.config.profile_dataset_id.as_str();
        collect(
            VENDOR,
            "profiles",
            &self.retry,
            || self.run_job(dataset, urls),
            profile_from_bright_data,
        )
        .await
    }

    #[instrument(skip_all, fields(urls = urls.len()))]
    async fn scrape_companies(&self, urls: &[String]) -> ScrapeOutcome<LinkedInCompany> {
        if urls.is_empty() {
            return ScrapeOutcome::ok(Vec::new());
        }
        let dataset = self.config.company_dataset_id.as_str();
        collect(
            VENDOR,
            "companies",
            &self.retry,
            || self.run_job(dataset, urls),
            company_from_bright_data,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> BrightDataProvider {
        let mut config = LinkedInConfig::default();
        config.initial_backoff_ms = 1;
        config.bright_data.base_url = server.uri();
        config.bright_data.poll_interval_secs = 0;
        config.bright_data.max_wait_secs = 5;
        BrightDataProvider::new(&config, "bd-key").unwrap()
    }

    fn urls() -> Vec<String> {
        vec!["https://www.linkedin.com/in/asha-rao".to_string()]
    }

    #[tokio::test]
    async fn trigger_poll_download() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/datasets/v3/trigger"))
            .and(query_param("dataset_id", "gd_l1viktl72bvl7bjuj0"))
            .and(query_param("include_errors", "true"))
            .and(header("authorization", "Bearer bd-key"))
            .and(body_json(json!([{ "url": "https://www.linkedin.com/in/asha-rao" }])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "snapshot_id": "s_1" })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/datasets/v3/progress/s_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "running" })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/datasets/v3/progress/s_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ready" })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/datasets/v3/snapshot/s_1"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "url": "https://www.linkedin.com/in/asha-rao", "name": "Asha Rao", "position": "Partner at Acme" },
                { "url": "https://www.linkedin.com/in/ghost", "error": "Page not found" }
            ])))
            .mount(&server)
            .await;

        let outcome = provider(&server).scrape_profiles(&urls()).await;
        assert!(outcome.success);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].name.as_deref(), Some("Asha Rao"));
        assert_eq!(outcome.records[0].headline.as_deref(), Some("Partner at Acme"));
    }

    #[tokio::test]
    async fn failed_snapshot_exhausts_attempts() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/datasets/v3/trigger"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "snapshot_id": "s_2" })))
            .expect(3)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/datasets/v3/progress/s_2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "failed" })))
            .mount(&server)
            .await;

        let outcome = provider(&server).scrape_companies(&urls()).await;
        assert!(!outcome.success);
        assert!(outcome.message.unwrap().contains("failed"));
    }

    #[tokio::test]
    async fn empty_snapshot_is_no_data() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/datasets/v3/trigger"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "snapshot_id": "s_3" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/datasets/v3/progress/s_3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ready" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/datasets/v3/snapshot/s_3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let outcome = provider(&server).scrape_profiles(&urls()).await;
        assert!(!outcome.success);
        assert_eq!(outcome.message.as_deref(), Some("No data returned from Bright Data"));
    }

    #[tokio::test]
    async fn empty_input_skips_vendor() {
        let server = MockServer::start().await;
        let outcome = provider(&server).scrape_profiles(&[]).await;
        assert!(outcome.success);
        assert!(outcome.records.is_empty());
    }
}
