//! Shared types for the validator

pub mod peer;
pub mod query;
pub mod response;
pub mod weights;

// Re-export commonly used types
pub use peer::{IdentityKey, Peer, PeerId};
pub use query::{Query, QueryRound};
pub use response::{into_structured, parse_response};
pub use weights::{WeightSet, WEIGHT_EPSILON};
