//! Source-of-truth determination under partial trust
//!
//! When more than `min_quorum` responders hold a reputation above
//! `trust_threshold`, the answer is decided by the responders themselves:
//! every distinct answer accumulates `exp(score)` over the peers that gave it
//! and the heaviest answer wins. Otherwise the authoritative oracle is asked
//! exactly once and its answer is used as-is.

use crate::error::{ConsensusError, Result};
use peerscore_core::types::into_structured;
use peerscore_core::{AuthoritativeFetch, PeerId, Query};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// Reputation a responder must exceed to count as trusted
pub const DEFAULT_TRUST_THRESHOLD: f64 = 0.8;

/// Trusted responders needed (strictly more than this) to skip the oracle
pub const DEFAULT_MIN_QUORUM: usize = 10;

/// Consensus thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Reputation a responder must exceed to count as trusted
    pub trust_threshold: f64,

    /// Trusted responders must outnumber this to use peer consensus
    pub min_quorum: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            trust_threshold: DEFAULT_TRUST_THRESHOLD,
            min_quorum: DEFAULT_MIN_QUORUM,
        }
    }
}

impl ConsensusConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.trust_threshold) {
            return Err(ConsensusError::Configuration(format!(
                "trust_threshold must be in [0, 1], got {}",
                self.trust_threshold
            )));
        }
        Ok(())
    }
}

/// How the source of truth for a round was reached
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Trusted quorum met; the heaviest answer won
    PeerConsensus { trusted: usize, weight: f64 },

    /// Quorum not met; the oracle answer was used
    Oracle { trusted: usize },

    /// No usable answer; every response in the round scores zero
    NoSourceOfTruth { trusted: usize, via_oracle: bool },
}

impl Decision {
    /// Whether the oracle was consulted
    pub fn used_oracle(&self) -> bool {
        matches!(
            self,
            Decision::Oracle { .. } | Decision::NoSourceOfTruth { via_oracle: true, .. }
        )
    }

    /// Number of trusted responders seen in the round
    pub fn trusted(&self) -> usize {
        match self {
            Decision::PeerConsensus { trusted, .. }
            | Decision::Oracle { trusted }
            | Decision::NoSourceOfTruth { trusted, .. } => *trusted,
        }
    }
}

/// Derives a single answer from mutually distrusting responders
#[derive(Debug, Clone)]
pub struct ConsensusEngine {
    config: ConsensusConfig,
}

impl ConsensusEngine {
    /// Create a new engine
    pub fn new(config: ConsensusConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Engine configuration
    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Count responders whose reputation exceeds the trust threshold
    pub fn count_trusted(&self, responders: &HashMap<PeerId, Value>, scores: &[f64]) -> usize {
        responders
            .keys()
            .filter(|id| score_of(scores, **id) > self.config.trust_threshold)
            .count()
    }

    /// Decide the source of truth for one round
    ///
    /// `scores` is the reputation snapshot read at the start of the round,
    /// indexed by peer id. The oracle is called at most once.
    pub async fn source_of_truth(
        &self,
        valid: &HashMap<PeerId, Value>,
        scores: &[f64],
        query: &Query,
        fetch: &dyn AuthoritativeFetch,
    ) -> (Option<Value>, Decision) {
        let trusted = self.count_trusted(valid, scores);

        if trusted > self.config.min_quorum {
            let Some((winner, weight)) = weighted_majority(valid, scores) else {
                return (None, Decision::NoSourceOfTruth { trusted, via_oracle: false });
            };
            debug!(
                "Peer consensus on {}: {} trusted, winning weight {:.3}",
                query.kind, trusted, weight
            );
            return match into_structured(winner) {
                Some(value) => (Some(value), Decision::PeerConsensus { trusted, weight }),
                None => {
                    warn!("Consensus answer for {} is not a structured document", query.kind);
                    (None, Decision::NoSourceOfTruth { trusted, via_oracle: false })
                }
            };
        }

        info!(
            "Only {} trusted responders for {} (need > {}), asking oracle",
            trusted, query.kind, self.config.min_quorum
        );
        match fetch.get(query).await {
            Ok(Some(answer)) => match into_structured(answer) {
                Some(value) => (Some(value), Decision::Oracle { trusted }),
                None => {
                    warn!("Oracle answer for {} is not a structured document", query.kind);
                    (None, Decision::NoSourceOfTruth { trusted, via_oracle: true })
                }
            },
            Ok(None) => {
                debug!("Oracle had no answer for {}", query.kind);
                (None, Decision::NoSourceOfTruth { trusted, via_oracle: true })
            }
            Err(e) => {
                warn!("Oracle fetch for {} failed: {}", query.kind, e);
                (None, Decision::NoSourceOfTruth { trusted, via_oracle: true })
            }
        }
    }
}

fn score_of(scores: &[f64], id: PeerId) -> f64 {
    match scores.get(id.index()) {
        Some(s) if s.is_finite() => *s,
        _ => 0.0,
    }
}

/// Heaviest distinct answer by summed `exp(score)`
///
/// Answers are grouped by their canonical JSON encoding (object keys sorted).
/// Ties go to the smallest encoding so the outcome never depends on map order.
fn weighted_majority(valid: &HashMap<PeerId, Value>, scores: &[f64]) -> Option<(Value, f64)> {
    let mut responders: Vec<_> = valid.iter().collect();
    responders.sort_by_key(|(id, _)| **id);

    let mut tally: BTreeMap<String, (f64, &Value)> = BTreeMap::new();
    for (id, value) in responders {
        let key = match serde_json::to_string(value) {
            Ok(key) => key,
            Err(_) => continue,
        };
        let entry = tally.entry(key).or_insert((0.0, value));
        entry.0 += score_of(scores, *id).exp();
    }

    let mut best: Option<(f64, &Value)> = None;
    for (weight, value) in tally.into_values() {
        if best.map_or(true, |(top, _)| weight > top) {
            best = Some((weight, value));
        }
    }
    best.map(|(weight, value)| (value.clone(), weight))
}
