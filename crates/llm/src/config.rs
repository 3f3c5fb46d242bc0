use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vigil_common::{Result, VigilError};

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use crate::openai::OpenAiClient;
use crate::provider::Provider;
use crate::retry::{RetryConfig, RetryingClient};

pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: Provider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    /// Classification prompts run at zero temperature unless overridden.
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_concurrent() -> usize {
    4
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: default_model(),
            api_key: None,
            api_url: None,
            temperature: 0.0,
            max_tokens: None,
            max_concurrent_requests: default_max_concurrent(),
            retry: RetryConfig::default(),
        }
    }
}

impl LlmConfig {
    /// The configured key, or the provider's environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| {
                self.provider
                    .api_key_env()
                    .and_then(|var| std::env::var(var).ok())
                    .filter(|k| !k.is_empty())
            })
    }
}

/// Caps the number of in-flight provider calls shared by all investigations.
pub struct SemaphoredClient {
    inner: Arc<dyn LlmClient>,
    semaphore: Arc<tokio::sync::Semaphore>,
}

impl SemaphoredClient {
    pub fn new(inner: Arc<dyn LlmClient>, max_concurrent: usize) -> Self {
        Self {
            inner,
            semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent.max(1))),
        }
    }
}

#[async_trait]
impl LlmClient for SemaphoredClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let _permit = self.semaphore.acquire().await.map_err(|e| {
            VigilError::ExternalCall(format!("LLM concurrency limiter closed: {e}"))
        })?;
        self.inner.complete(request).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// Build the provider client wrapped in retry and concurrency limits.
///
/// Fails with a configuration error when a hosted provider has no credential.
pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let api_key = config.resolve_api_key();
    if let Some(var) = config.provider.api_key_env() {
        if api_key.is_none() {
            return Err(VigilError::Configuration(format!(
                "{} requires an API key: set llm.api_key or {var}",
                config.provider
            )));
        }
    }

    let base: Box<dyn LlmClient> = Box::new(OpenAiClient::new(
        config.provider,
        config.api_url.clone(),
        config.model.clone(),
        api_key,
    ));
    let retrying: Box<dyn LlmClient> = Box::new(RetryingClient::new(base, config.retry.clone()));

    Ok(Arc::new(SemaphoredClient::new(
        Arc::from(retrying),
        config.max_concurrent_requests,
    )))
}
