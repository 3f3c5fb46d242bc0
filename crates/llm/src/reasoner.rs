//! Structured classification on top of a chat completion client.
//!
//! Every LLM call made by the investigation steps and the supervisor goes
//! through [`Reasoner`], so tests can script the answers.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use vigil_common::{Result, VigilError};

use crate::client::{ChatMessage, LlmClient, LlmRequest};

/// A prompt whose answer must be a single JSON object of a named shape.
#[derive(Debug, Clone)]
pub struct StructuredPrompt {
    /// Name of the expected output shape, used in error messages and logs.
    pub schema_name: &'static str,
    pub system: String,
    pub user: String,
}

impl StructuredPrompt {
    pub fn new(
        schema_name: &'static str,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            schema_name,
            system: system.into(),
            user: user.into(),
        }
    }
}

#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Ask for a JSON object. Transport failures are `ExternalCall` errors;
    /// output that holds no JSON object is a `Classification` error.
    async fn classify_raw(&self, prompt: StructuredPrompt) -> Result<Value>;
}

/// Ask the reasoner and deserialize its answer into `T`.
///
/// An answer that does not fit `T` is a `Classification` error.
pub async fn classify<T: DeserializeOwned>(
    reasoner: &dyn Reasoner,
    prompt: StructuredPrompt,
) -> Result<T> {
    let schema = prompt.schema_name;
    let value = reasoner.classify_raw(prompt).await?;
    serde_json::from_value(value).map_err(|e| {
        VigilError::Classification(format!("output does not match {schema}: {e}"))
    })
}

/// [`Reasoner`] backed by an [`LlmClient`] in JSON mode.
pub struct LlmReasoner {
    client: Arc<dyn LlmClient>,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl LlmReasoner {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            temperature: 0.0,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl Reasoner for LlmReasoner {
    async fn classify_raw(&self, prompt: StructuredPrompt) -> Result<Value> {
        let request = LlmRequest {
            system_prompt: Some(prompt.system),
            messages: vec![ChatMessage::user(prompt.user)],
            temperature: Some(self.temperature),
            max_tokens: self.max_tokens,
            json_mode: true,
        };

        let response = self.client.complete(request).await?;
        debug!(
            schema = prompt.schema_name,
            model = %response.model,
            chars = response.content.len(),
            "Reasoner answered"
        );

        let object = extract_json_object(&response.content).ok_or_else(|| {
            VigilError::Classification(format!(
                "no JSON object in {} output: {}",
                prompt.schema_name,
                truncate(&response.content, 200)
            ))
        })?;

        serde_json::from_str(object).map_err(|e| {
            VigilError::Classification(format!("malformed {} output: {e}", prompt.schema_name))
        })
    }
}

/// Locate the first balanced `{...}` in model output, skipping braces inside
/// string literals. Models often wrap JSON in prose or code fences.
pub fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
