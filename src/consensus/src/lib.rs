//! # peerscore consensus
//!
//! Judgment over a round of untrusted answers:
//!
//! - [`ConsensusEngine`] picks the source of truth, by `exp(score)`-weighted
//!   majority when enough trusted peers answered, or from the oracle otherwise.
//! - [`ScoringEngine`] compares every answer with that source and yields a
//!   reward in `[0, 1]`.
//! - [`SemanticClusterer`] backs the scoring mode for free-form content.

pub mod clustering;
pub mod error;
pub mod scoring;
pub mod source_of_truth;

pub use clustering::SemanticClusterer;
pub use error::{ConsensusError, Result};
pub use scoring::{ScoringConfig, ScoringEngine, ScoringMode};
pub use source_of_truth::{ConsensusConfig, ConsensusEngine, Decision};
