//! Gemini `generateContent` REST client.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error, instrument};

use vcdossier_shared::{DossierError, GeminiConfig, Result, RetryPolicy, read_secret};

use crate::LanguageModel;
use crate::json::clean_json;

/// File name used when an unparsable structured response is dumped.
const DEBUG_FILE_NAME: &str = "debug_gemini_response.txt";

const SERVICE: &str = "gemini";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'a str,
    response_schema: &'a Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Gemini client with search grounding and structured output.
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    retry: RetryPolicy,
    debug_dir: Option<PathBuf>,
}

impl GeminiClient {
    /// Build a client from config, reading the key from the configured env var.
    pub fn from_config(config: &GeminiConfig) -> Result<Self> {
        let api_key = read_secret(&config.api_key_env).ok_or_else(|| {
            DossierError::config(format!(
                "Gemini API key not found. Set the {} environment variable.",
                config.api_key_env
            ))
        })?;
        Self::new(config, api_key)
    }

    /// Build a client with an explicit key.
    pub fn new(config: &GeminiConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DossierError::Network(format!("failed to build HTTP client: {e}")))?;

        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
            retry: RetryPolicy::new(
                config.max_retries,
                config.initial_backoff_ms,
                config.max_backoff_ms,
            ),
            debug_dir: config.debug_dir.as_ref().map(PathBuf::from),
        })
    }

    /// Send one request with rate-limit retries and return the candidate text.
    async fn generate(&self, request: &GenerateRequest<'_>, operation: &str) -> Result<String> {
        self.retry
            .retry_if(operation, || self.send(request), DossierError::is_retryable)
            .await
    }

    async fn send(&self, request: &GenerateRequest<'_>) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| DossierError::Network(format!("gemini request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DossierError::Network(format!("gemini body read failed: {e}")))?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(env) => format!("{}: {}", env.error.status, env.error.message),
                Err(_) => body,
            };
            return Err(DossierError::api(SERVICE, status.as_u16(), message));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| DossierError::parse(format!("unexpected gemini response: {e}")))?;

        extract_text(parsed)
    }

    async fn dump_unparsable(&self, raw: &str) {
        let Some(dir) = &self.debug_dir else {
            return;
        };
        let path = dir.join(DEBUG_FILE_NAME);
        let written = match tokio::fs::create_dir_all(dir).await {
            Ok(()) => tokio::fs::write(&path, raw).await,
            Err(e) => Err(e),
        };
        match written {
            Ok(()) => error!(path = %path.display(), "raw model response saved"),
            Err(e) => error!(error = %e, "could not save raw model response"),
        }
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: GenerateResponse) -> Result<String> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(DossierError::Llm(format!("prompt blocked: {reason}")));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| DossierError::Llm("response contained no candidates".into()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
        return Err(DossierError::Llm(format!(
            "empty response (finish reason: {reason})"
        )));
    }

    Ok(text)
}

#[async_trait]
impl LanguageModel for GeminiClient {
    #[instrument(skip_all, fields(prompt_len = prompt.len()))]
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            tools: vec![json!({ "google_search": {} })],
            generation_config: None,
        };

        let text = self.generate(&request, "gemini.generate_text").await?;
        debug!(response_len = text.len(), "grounded generation complete");
        Ok(text)
    }

    #[instrument(skip_all, fields(prompt_len = prompt.len()))]
    async fn generate_json(&self, prompt: &str, schema: &Value) -> Result<Value> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            tools: Vec::new(),
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema,
            }),
        };

        let raw = self.generate(&request, "gemini.generate_json").await?;
        let cleaned = clean_json(&raw);

        match serde_json::from_str(&cleaned) {
            Ok(value) => Ok(value),
            Err(e) => {
                error!(raw_len = raw.len(), error = %e, "structured response is not valid JSON");
                self.dump_unparsable(&raw).await;
                Err(DossierError::parse(format!("invalid JSON from model: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL_PATH: &str = "/v1beta/models/gemini-test:generateContent";

    fn test_config(server: &MockServer) -> GeminiConfig {
        GeminiConfig {
            model: "gemini-test".into(),
            base_url: server.uri(),
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            ..GeminiConfig::default()
        }
    }

    fn candidate(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
    }

    #[tokio::test]
    async fn text_generation_attaches_search_tool() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({ "tools": [{ "google_search": {} }] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "Acme Ventures " }, { "text": "is based in Mumbai." }] }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new(&test_config(&server), "test-key").unwrap();
        let text = client.generate_text("Who is Acme?").await.unwrap();
        assert_eq!(text, "Acme Ventures is based in Mumbai.");
    }

    #[tokio::test]
    async fn structured_generation_sends_schema_and_strips_fences() {
        let server = MockServer::start().await;
        let schema = json!({ "type": "object", "properties": { "ok": { "type": "boolean" } } });

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(body_partial_json(json!({
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "responseSchema": schema
                }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(candidate("```json\n{\"ok\": true}\n```")),
            )
            .mount(&server)
            .await;

        let client = GeminiClient::new(&test_config(&server), "test-key").unwrap();
        let value = client.generate_json("Is it ok?", &schema).await.unwrap();
        assert_eq!(value, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn retries_rate_limits() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" }
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate("recovered")))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&test_config(&server), "test-key").unwrap();
        let text = client.generate_text("hello").await.unwrap();
        assert_eq!(text, "recovered");
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "code": 400, "message": "Invalid schema", "status": "INVALID_ARGUMENT" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new(&test_config(&server), "test-key").unwrap();
        let err = client.generate_text("hello").await.unwrap_err();
        assert!(matches!(err, DossierError::Api { status: 400, .. }));
        assert!(err.to_string().contains("INVALID_ARGUMENT"));
    }

    #[tokio::test]
    async fn gives_up_after_retry_budget() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .expect(3)
            .mount(&server)
            .await;

        let client = GeminiClient::new(&test_config(&server), "test-key").unwrap();
        let err = client.generate_text("hello").await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn blocked_prompt_is_an_llm_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": { "blockReason": "SAFETY" }
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&test_config(&server), "test-key").unwrap();
        let err = client.generate_text("hello").await.unwrap_err();
        assert!(matches!(err, DossierError::Llm(_)));
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn invalid_json_is_dumped_to_debug_dir() {
        let server = MockServer::start().await;
        let debug_dir = std::env::temp_dir().join(format!("vcd-gemini-{}", uuid::Uuid::now_v7()));

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate("{\"urls\": [")))
            .mount(&server)
            .await;

        let mut config = test_config(&server);
        config.debug_dir = Some(debug_dir.to_string_lossy().to_string());
        let client = GeminiClient::new(&config, "test-key").unwrap();

        let err = client
            .generate_json("extract", &json!({ "type": "object" }))
            .await
            .unwrap_err();
        assert!(matches!(err, DossierError::Parse { .. }));

        let dumped = tokio::fs::read_to_string(debug_dir.join(DEBUG_FILE_NAME)).await.unwrap();
        assert_eq!(dumped, "{\"urls\": [");
        let _ = tokio::fs::remove_dir_all(&debug_dir).await;
    }
}
