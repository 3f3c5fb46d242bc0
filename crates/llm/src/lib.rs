pub mod client;
pub mod config;
pub mod openai;
pub mod provider;
pub mod reasoner;
pub mod retry;

pub use client::{ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, TokenUsage};
pub use config::{DEFAULT_MODEL, LlmConfig, SemaphoredClient, build_llm_client};
pub use openai::OpenAiClient;
pub use provider::Provider;
pub use reasoner::{LlmReasoner, Reasoner, StructuredPrompt, classify, extract_json_object};
pub use retry::{RetryConfig, RetryingClient};
