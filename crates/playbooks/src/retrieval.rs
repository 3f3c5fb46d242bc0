//! Playbook retrieval for the consultation step.

use crate::store::PlaybookLibrary;
use crate::types::PlaybookChunk;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use vigil_common::Result;

/// Look up the playbook text most relevant to an incident summary.
#[async_trait]
pub trait PlaybookRetriever: Send + Sync {
    /// Returns an empty string when nothing relevant exists.
    async fn retrieve(&self, query: &str) -> Result<String>;
}

/// Scores chunks by how often they mention the query's terms and returns the
/// best one.
pub struct KeywordRetriever {
    library: Arc<PlaybookLibrary>,
    max_context_tokens: usize,
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "was", "were", "are", "has", "have",
    "not", "any", "been", "into", "its", "indicator", "summary", "analysis",
];

impl KeywordRetriever {
    pub fn new(library: Arc<PlaybookLibrary>, max_context_tokens: usize) -> Self {
        Self {
            library,
            max_context_tokens,
        }
    }

    /// The highest-scoring chunk, or `None` if no chunk shares a term with the query.
    pub fn best_match(&self, query: &str) -> Option<&PlaybookChunk> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return None;
        }

        let mut best: Option<(&PlaybookChunk, usize)> = None;
        for chunk in self.library.chunks() {
            let score = score(&terms, &chunk.content);
            // Strict comparison keeps the earliest chunk on ties
            if score > 0 && best.is_none_or(|(_, s)| score > s) {
                best = Some((chunk, score));
            }
        }

        if let Some((chunk, score)) = best {
            debug!(chunk = %chunk.id, score = score, "Best playbook match");
        }
        best.map(|(chunk, _)| chunk)
    }
}

#[async_trait]
impl PlaybookRetriever for KeywordRetriever {
    async fn retrieve(&self, query: &str) -> Result<String> {
        let Some(chunk) = self.best_match(query) else {
            debug!(chunks = self.library.len(), "No playbook matched the incident");
            return Ok(String::new());
        };

        let context = format!("Source: {}\n\n{}", chunk.source, chunk.content);
        Ok(truncate_to_tokens(&context, self.max_context_tokens).to_string())
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3)
        .map(str::to_lowercase)
}

fn query_terms(query: &str) -> HashSet<String> {
    tokenize(query)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn score(terms: &HashSet<String>, content: &str) -> usize {
    tokenize(content).filter(|w| terms.contains(w)).count()
}

fn estimate_tokens(text: &str) -> usize {
    // Rough estimate: ~4 chars per token
    text.len() / 4
}

fn truncate_to_tokens(text: &str, max_tokens: usize) -> &str {
    if estimate_tokens(text) <= max_tokens {
        return text;
    }
    let max_chars = max_tokens * 4;
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
