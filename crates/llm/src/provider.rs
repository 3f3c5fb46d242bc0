use serde::{Deserialize, Serialize};
use std::fmt;

/// Hosted or local chat completion providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Groq,
    #[serde(rename = "openai")]
    OpenAi,
    Ollama,
}

impl Provider {
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Groq => "https://api.groq.com/openai",
            Self::OpenAi => "https://api.openai.com",
            Self::Ollama => "http://localhost:11434",
        }
    }

    /// Environment variable holding the credential, if the provider needs one.
    pub fn api_key_env(self) -> Option<&'static str> {
        match self {
            Self::Groq => Some("GROQ_API_KEY"),
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Ollama => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Groq => "groq",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        };
        f.write_str(s)
    }
}
