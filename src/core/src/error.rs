//! Unified error types for the validator collaborators
//!
//! Collaborator implementations (transports, ledgers, oracles) report failures
//! through `CoreError`; the subsystem crates translate them into their own
//! error enums or absorb them at the round boundary.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type shared by collaborator traits
#[derive(Debug, Error)]
pub enum CoreError {
    /// Transport layer errors (per-peer, never fatal)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Ledger errors (height queries, weight emission, snapshots)
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Authoritative oracle errors
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// Serialization/Deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Operation timeout
    #[error("Timeout")]
    Timeout,

    /// Invalid input/state
    #[error("Invalid: {0}")]
    Invalid(String),

    /// I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Create a transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        CoreError::Transport(msg.into())
    }

    /// Create a ledger error
    pub fn ledger<S: Into<String>>(msg: S) -> Self {
        CoreError::Ledger(msg.into())
    }

    /// Create an oracle error
    pub fn oracle<S: Into<String>>(msg: S) -> Self {
        CoreError::Oracle(msg.into())
    }

    /// Create an invalid error
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        CoreError::Invalid(msg.into())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}
