//! Client for OpenAI-compatible chat completion endpoints.
//!
//! Groq, OpenAI and Ollama all accept the same request shape; only the base
//! URL and the credential differ.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vigil_common::{Result, VigilError};

use crate::client::{LlmClient, LlmRequest, LlmResponse, TokenUsage};
use crate::provider::Provider;

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    model: String,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: WireMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

pub struct OpenAiClient {
    provider: Provider,
    base_url: String,
    model: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(
        provider: Provider,
        base_url: Option<String>,
        model: String,
        api_key: Option<String>,
    ) -> Self {
        Self {
            provider,
            base_url: base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| provider.default_base_url().to_string()),
            model,
            api_key,
            http_client: reqwest::Client::new(),
        }
    }

    fn build_body<'a>(&'a self, request: &LlmRequest) -> CompletionRequest<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system_prompt {
            messages.push(WireMessage {
                role: "system".into(),
                content: system.clone(),
            });
        }
        messages.extend(request.messages.iter().map(|m| WireMessage {
            role: m.role.as_str().into(),
            content: m.content.clone(),
        }));

        CompletionRequest {
            model: &self.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request
                .json_mode
                .then_some(ResponseFormat { kind: "json_object" }),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_body(&request);
        debug!(provider = %self.provider, model = %self.model, "Sending chat completion");

        let mut http_req = self.http_client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            http_req = http_req.bearer_auth(key);
        }

        let response = http_req.send().await.map_err(|e| {
            VigilError::ExternalCall(format!("{} request failed: {e}", self.provider))
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(|v| format!(", Retry-After: {v}"))
                .unwrap_or_default();
            let body_text = response.text().await.unwrap_or_default();
            return Err(VigilError::ExternalCall(format!(
                "{} API error {status}{retry_after}: {body_text}",
                self.provider
            )));
        }

        let parsed: CompletionResponse = response.json().await.map_err(|e| {
            VigilError::ExternalCall(format!("Failed to parse {} response: {e}", self.provider))
        })?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            VigilError::ExternalCall(format!("No choices in {} response", self.provider))
        })?;

        Ok(LlmResponse {
            content: choice.message.content,
            model: parsed.model,
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
            finish_reason: choice.finish_reason,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
