//! # peerscore core
//!
//! Shared types, collaborator traits, and error handling for the peerscore
//! validator. Every other crate in the workspace depends on this one, so it
//! carries no logic beyond the data model and the contracts of the external
//! collaborators (peer transport, incentive ledger, authoritative oracle).

pub mod types;
pub mod traits;
pub mod error;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use traits::{AuthoritativeFetch, Ledger, PeerTransport};
pub use traits::oracle::StaticOracle;
pub use types::{IdentityKey, Peer, PeerId, Query, QueryRound, WeightSet};
