//! Error types for the network module

use peerscore_core::{CoreError, PeerId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NetworkError>;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("No peers available for sampling")]
    NoPeersAvailable,

    #[error("Unknown peer: {0}")]
    UnknownPeer(PeerId),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Timeout")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CoreError> for NetworkError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Timeout => NetworkError::Timeout,
            CoreError::Serialization(msg) => NetworkError::Serialization(msg),
            CoreError::Io(err) => NetworkError::Io(err),
            other => NetworkError::Transport(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(e: serde_json::Error) -> Self {
        NetworkError::Serialization(e.to_string())
    }
}
