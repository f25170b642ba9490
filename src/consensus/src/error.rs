//! Error types for consensus and scoring

use peerscore_core::CoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConsensusError>;

#[derive(Error, Debug, Clone)]
pub enum ConsensusError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authoritative fetch failed: {0}")]
    Oracle(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<CoreError> for ConsensusError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Serialization(msg) => ConsensusError::Serialization(msg),
            other => ConsensusError::Oracle(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConsensusError {
    fn from(err: serde_json::Error) -> Self {
        ConsensusError::Serialization(err.to_string())
    }
}
