//! Generative model access for vcdossier.
//!
//! Agents talk to the model through the [`LanguageModel`] trait; the
//! production implementation is [`GeminiClient`].

mod gemini;
mod json;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use vcdossier_shared::{DossierError, Result};

pub use gemini::GeminiClient;
pub use json::clean_json;

/// A generative model that can answer free-text and schema-constrained prompts.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Free-text answer with web-search grounding enabled.
    async fn generate_text(&self, prompt: &str) -> Result<String>;

    /// JSON answer constrained by `schema` (OpenAPI-style subset).
    async fn generate_json(&self, prompt: &str, schema: &Value) -> Result<Value>;
}

/// Ask for schema-constrained JSON and deserialize it into `T`.
pub async fn generate_structured<T: DeserializeOwned>(
    model: &dyn LanguageModel,
    prompt: &str,
    schema: &Value,
) -> Result<T> {
    let value = model.generate_json(prompt, schema).await?;
    serde_json::from_value(value)
        .map_err(|e| DossierError::parse(format!("model output does not match schema: {e}")))
}
