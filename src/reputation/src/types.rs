//! Common types for reputation, volume and weight processing

use crate::error::{ReputationError, Result};
use peerscore_core::{IdentityKey, PeerId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Reputation score, conceptually in [0, 1]
pub type ReputationScore = f64;

/// Reputation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationConfig {
    /// EMA smoothing factor: `new = alpha * reward + (1 - alpha) * old`
    pub alpha: f64,

    /// Score above which a peer is reported as trusted in statistics
    pub trust_threshold: f64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            trust_threshold: 0.8,
        }
    }
}

impl ReputationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(ReputationError::InvalidConfig(format!(
                "alpha must be in (0, 1], got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

/// Constraints imposed by the incentive ledger on emitted weights
///
/// The cap can only be met when more than `1 / max_weight_limit` peers
/// survive. With fewer, weights are uniform over the survivors and each share
/// is above the cap; see [`WeightConstraints::cap_always_feasible`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConstraints {
    /// Fewer known peers than this forces the uniform fallback
    pub min_allowed_non_zero: usize,

    /// Largest share any single peer may receive
    pub max_weight_limit: f64,

    /// Quantile of low scores to exclude, bounded so enough peers survive
    pub exclusion_quantile: f64,
}

impl Default for WeightConstraints {
    fn default() -> Self {
        Self {
            min_allowed_non_zero: 8,
            max_weight_limit: 0.1,
            exclusion_quantile: 0.0,
        }
    }
}

impl WeightConstraints {
    /// Whether every non-uniform weight set can honor `max_weight_limit`
    ///
    /// At least `min_allowed_non_zero` peers survive exclusion, so the cap is
    /// feasible on every path once `min_allowed_non_zero * max_weight_limit > 1`.
    pub fn cap_always_feasible(&self) -> bool {
        self.min_allowed_non_zero as f64 * self.max_weight_limit > 1.0
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.max_weight_limit > 0.0 && self.max_weight_limit <= 1.0) {
            return Err(ReputationError::InvalidConfig(format!(
                "max_weight_limit must be in (0, 1], got {}",
                self.max_weight_limit
            )));
        }
        if !(0.0..=1.0).contains(&self.exclusion_quantile) {
            return Err(ReputationError::InvalidConfig(format!(
                "exclusion_quantile must be in [0, 1], got {}",
                self.exclusion_quantile
            )));
        }
        Ok(())
    }
}

/// Volume ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Height units per epoch group
    pub bucket_size: u64,

    /// Number of most recent buckets kept
    pub retention: usize,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            bucket_size: 360,
            retention: 48,
        }
    }
}

impl VolumeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bucket_size == 0 || self.retention == 0 {
            return Err(ReputationError::InvalidConfig(
                "volume bucket_size and retention must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Persisted reputation vector with the identity bound to each slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReputationState {
    pub scores: Vec<ReputationScore>,
    pub identities: Vec<IdentityKey>,
}

/// Volume credited to peers within one epoch group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeBucket {
    pub epoch_group: u64,
    pub per_peer_volume: BTreeMap<PeerId, f64>,
}

/// Persisted volume ledger
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeState {
    pub buckets: Vec<VolumeBucket>,

    /// Item keys already credited per peer, with the epoch group each was
    /// first credited in; keys leave with their bucket
    pub seen: HashMap<PeerId, HashMap<String, u64>>,
}
