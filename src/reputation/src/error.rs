//! Error types for the reputation system

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReputationError {
    /// Durable write failed; the in-memory update was not committed
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Corrupt persisted state: {0}")]
    CorruptState(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Prometheus metric error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl From<bincode::Error> for ReputationError {
    fn from(err: bincode::Error) -> Self {
        ReputationError::Serialization(err.to_string())
    }
}

impl From<rocksdb::Error> for ReputationError {
    fn from(err: rocksdb::Error) -> Self {
        ReputationError::Persistence(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReputationError>;
