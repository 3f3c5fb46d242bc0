//! Incident-response playbooks for Vigil.
//!
//! Markdown playbooks are read from a directory at start-up, split into
//! overlapping chunks and kept in an immutable [`PlaybookLibrary`]. The
//! consultation step asks a [`PlaybookRetriever`] for the chunk that best
//! matches the incident summary.
//!
//! ```text
//! documents/**/*.md ──► chunk_text ──► PlaybookLibrary ──► KeywordRetriever
//!                                        (Arc, shared)       retrieve(summary)
//! ```

pub mod ingest;
pub mod retrieval;
pub mod store;
pub mod types;

pub use retrieval::{KeywordRetriever, PlaybookRetriever};
pub use store::PlaybookLibrary;
pub use types::{PlaybookChunk, PlaybookConfig};
