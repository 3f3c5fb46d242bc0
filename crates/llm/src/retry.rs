use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;
use vigil_common::{Result, VigilError};

use crate::client::{LlmClient, LlmRequest, LlmResponse};

/// Backoff policy for transient provider failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Exponential delay for the given zero-based attempt, capped at `max_delay_ms`.
    pub fn delay_for(&self, attempt: u32) -> u64 {
        let base = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        (base as u64).min(self.max_delay_ms)
    }
}

/// Retries a single provider call on rate limits and server errors.
///
/// This only ever wraps the transport. Whole investigation steps are not retried.
pub struct RetryingClient<T: LlmClient> {
    inner: T,
    config: RetryConfig,
}

impl<T: LlmClient> RetryingClient<T> {
    pub fn new(inner: T, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

const TRANSIENT_STATUSES: [&str; 5] = ["429", "500", "502", "503", "504"];

fn is_transient(error: &VigilError) -> bool {
    let VigilError::ExternalCall(msg) = error else {
        return false;
    };
    let lower = msg.to_lowercase();
    TRANSIENT_STATUSES.iter().any(|code| lower.contains(code))
        || lower.contains("rate limit")
        || lower.contains("request failed")
}

fn retry_after_ms(msg: &str) -> Option<u64> {
    let lower = msg.to_lowercase();
    let rest = &lower[lower.find("retry-after")? + "retry-after".len()..];
    let digits: String = rest
        .trim_start_matches(|c: char| c == ':' || c.is_whitespace())
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u64>().ok().map(|secs| secs.saturating_mul(1000))
}

#[async_trait]
impl<T: LlmClient> LlmClient for RetryingClient<T> {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let mut attempt = 0;
        loop {
            let err = match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if attempt >= self.config.max_retries || !is_transient(&err) {
                return Err(err);
            }

            let delay = retry_after_ms(&err.to_string())
                .map(|ms| ms.min(self.config.max_delay_ms))
                .unwrap_or_else(|| self.config.delay_for(attempt));

            warn!(
                attempt = attempt + 1,
                max_retries = self.config.max_retries,
                delay_ms = delay,
                error = %err,
                "Retrying LLM request"
            );

            tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
            attempt += 1;
        }
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
