//! Error types for vcdossier.
//!
//! Library crates use [`DossierError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all vcdossier operations.
#[derive(Debug, thiserror::Error)]
pub enum DossierError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level HTTP failure (connect, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// An external API answered with a non-success status.
    #[error("{service} API error (HTTP {status}): {message}")]
    Api {
        service: String,
        status: u16,
        message: String,
    },

    /// JSON, HTML or response-shape parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Generative model error (empty candidates, blocked prompt, ...).
    #[error("llm error: {0}")]
    Llm(String),

    /// Headless browser error.
    #[error("browser error: {0}")]
    Browser(String),

    /// Firm store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (missing firm, bad input file, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DossierError>;

/// Message fragments that mark a transient upstream condition.
const TRANSIENT_MARKERS: &[&str] = &[
    "too many requests",
    "service unavailable",
    "overloaded",
    "resource exhausted",
    "resource_exhausted",
];

impl DossierError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an API error for a named upstream service.
    pub fn api(service: impl Into<String>, status: u16, msg: impl Into<String>) -> Self {
        Self::Api {
            service: service.into(),
            status,
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure is a rate-limit or overload condition worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { status: 429 | 503, .. } => true,
            Self::Api { message, .. } | Self::Network(message) | Self::Llm(message) => {
                let lower = message.to_lowercase();
                TRANSIENT_MARKERS.iter().any(|m| lower.contains(m))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = DossierError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = DossierError::api("gemini", 400, "bad schema");
        assert_eq!(err.to_string(), "gemini API error (HTTP 400): bad schema");
    }

    #[test]
    fn retryable_statuses() {
        assert!(DossierError::api("gemini", 429, "slow down").is_retryable());
        assert!(DossierError::api("gemini", 503, "").is_retryable());
        assert!(!DossierError::api("gemini", 400, "invalid argument").is_retryable());
    }

    #[test]
    fn retryable_messages() {
        assert!(DossierError::api("gemini", 500, "The model is overloaded.").is_retryable());
        assert!(DossierError::Llm("Resource exhausted (quota)".into()).is_retryable());
        assert!(!DossierError::parse("expected value at line 1").is_retryable());
        assert!(!DossierError::Network("connection refused".into()).is_retryable());
    }
}
