//! Exponential backoff for calls to external services.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::DossierError;

/// Retry budget and delay schedule.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
        }
    }

    /// Policy from a total attempt count (first try included).
    pub fn with_attempts(attempts: u32, initial_backoff_ms: u64) -> Self {
        Self::new(attempts.saturating_sub(1), initial_backoff_ms, u64::MAX / 4)
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0, 0, 0)
    }

    /// Delay before retry number `retry` (1-based): `initial * 2^(retry-1)`, capped.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Retry every error.
    pub async fn retry<F, Fut, T>(&self, operation: &str, f: F) -> Result<T, DossierError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DossierError>>,
    {
        self.retry_if(operation, f, |_| true).await
    }

    /// Retry only errors accepted by `should_retry`; others are returned at once.
    pub async fn retry_if<F, Fut, T, P>(
        &self,
        operation: &str,
        mut f: F,
        should_retry: P,
    ) -> Result<T, DossierError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DossierError>>,
        P: Fn(&DossierError) -> bool,
    {
        let mut retries = 0;

        loop {
            match f().await {
                Ok(value) => {
                    if retries > 0 {
                        info!(operation, attempts = retries + 1, "succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(e) if retries < self.max_retries && should_retry(&e) => {
                    retries += 1;
                    let backoff = self.backoff_for(retries);
                    warn!(
                        operation,
                        attempt = retries,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "call failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    if retries > 0 {
                        warn!(operation, attempts = retries + 1, error = %e, "giving up");
                    }
                    return Err(e);
                }
            }
        }
    }
}
