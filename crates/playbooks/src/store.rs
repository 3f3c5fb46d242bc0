//! Immutable in-memory playbook library.

use crate::ingest::{chunk_text, load_markdown};
use crate::types::{PlaybookChunk, PlaybookConfig};
use tracing::{info, warn};
use vigil_common::Result;

/// All chunks of all ingested playbooks. Built once at start-up and shared
/// read-only between investigations.
#[derive(Debug, Clone, Default)]
pub struct PlaybookLibrary {
    chunks: Vec<PlaybookChunk>,
}

impl PlaybookLibrary {
    /// Chunk already-loaded `(source, contents)` documents.
    pub fn from_documents<S, C>(
        documents: impl IntoIterator<Item = (S, C)>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self
    where
        S: AsRef<str>,
        C: AsRef<str>,
    {
        let chunks = documents
            .into_iter()
            .flat_map(|(source, content)| {
                let source = source.as_ref().to_string();
                chunk_text(content.as_ref(), chunk_size, chunk_overlap)
                    .into_iter()
                    .enumerate()
                    .map(move |(i, text)| PlaybookChunk::new(source.clone(), i, text))
            })
            .collect();
        Self { chunks }
    }

    /// Ingest the configured directory. A missing directory yields an empty
    /// library; consultation then reports that no playbook was found.
    pub fn load(config: &PlaybookConfig) -> Result<Self> {
        if !config.dir.is_dir() {
            warn!(dir = %config.dir.display(), "Playbook directory not found, library is empty");
            return Ok(Self::default());
        }

        let documents = load_markdown(&config.dir)?;
        let doc_count = documents.len();
        let library = Self::from_documents(documents, config.chunk_size, config.chunk_overlap);

        info!(
            dir = %config.dir.display(),
            documents = doc_count,
            chunks = library.len(),
            "Playbook library loaded"
        );
        Ok(library)
    }

    pub fn chunks(&self) -> &[PlaybookChunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
