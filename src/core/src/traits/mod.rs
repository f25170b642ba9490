//! Contracts of the validator's external collaborators

pub mod transport;
pub mod ledger;
pub mod oracle;

// Re-export commonly used traits
pub use transport::PeerTransport;
pub use ledger::Ledger;
pub use oracle::AuthoritativeFetch;
