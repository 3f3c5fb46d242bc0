//! Playbook chunk types and configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A contiguous slice of one playbook document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybookChunk {
    /// Unique ID, `<source>#<index>`
    pub id: String,

    /// Document path relative to the playbook directory
    pub source: String,

    /// Position of this chunk within its document
    pub index: usize,

    pub content: String,
}

impl PlaybookChunk {
    pub fn new(source: impl Into<String>, index: usize, content: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            id: format!("{source}#{index}"),
            source,
            index,
            content: content.into(),
        }
    }
}

/// Configuration for the playbook library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookConfig {
    /// Directory scanned for `**/*.md`
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// Maximum chunk length in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Upper bound on the context handed to the reasoner
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
}

fn default_dir() -> PathBuf {
    PathBuf::from("./documents")
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_max_context_tokens() -> usize {
    1000
}

impl Default for PlaybookConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_context_tokens: default_max_context_tokens(),
        }
    }
}
