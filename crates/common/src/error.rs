//! Error types for Vigil.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VigilError {
    /// A required credential or setting is missing. Raised before any step runs.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The reputation or retrieval collaborator failed or was unreachable.
    #[error("External call error: {0}")]
    ExternalCall(String),

    /// Reasoner output did not match the declared schema.
    #[error("Classification error: {0}")]
    Classification(String),

    /// The supervisor produced a decision outside its table, or no rule matched.
    #[error("Routing error: {0}")]
    Routing(String),

    #[error("Step timed out after {0} ms")]
    Timeout(u64),

    /// A step returned fields it does not own, or fields that are already set.
    #[error("Invalid state update: {0}")]
    InvalidUpdate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Serializable classification of a [`VigilError`], carried by error events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigurationError,
    ExternalCallError,
    ClassificationError,
    RoutingError,
    TimeoutError,
    InvalidUpdateError,
    InternalError,
}

impl VigilError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::ConfigurationError,
            Self::ExternalCall(_) => ErrorKind::ExternalCallError,
            Self::Classification(_) => ErrorKind::ClassificationError,
            Self::Routing(_) => ErrorKind::RoutingError,
            Self::Timeout(_) => ErrorKind::TimeoutError,
            Self::InvalidUpdate(_) => ErrorKind::InvalidUpdateError,
            Self::Io(_) | Self::Serialization(_) => ErrorKind::InternalError,
        }
    }
}

pub type Result<T> = std::result::Result<T, VigilError>;
