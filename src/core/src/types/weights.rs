//! Weight vector handed to the incentive ledger

use super::peer::PeerId;
use serde::{Deserialize, Serialize};

/// Tolerance used when checking weight invariants
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// Ledger-legal weight vector, produced fresh every emission round
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightSet {
    /// Peers receiving weight
    pub ids: Vec<PeerId>,

    /// Weight per peer, parallel to `ids`
    pub weights: Vec<f64>,
}

impl WeightSet {
    /// Create a weight set from parallel vectors
    pub fn new(ids: Vec<PeerId>, weights: Vec<f64>) -> Self {
        Self { ids, weights }
    }

    /// Uniform `1/n` weights over the given ids
    pub fn uniform(ids: Vec<PeerId>) -> Self {
        let n = ids.len();
        let weights = if n == 0 { Vec::new() } else { vec![1.0 / n as f64; n] };
        Self { ids, weights }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Sum of all weights
    pub fn total(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Largest single weight
    pub fn max_weight(&self) -> f64 {
        self.weights.iter().cloned().fold(0.0f64, f64::max)
    }


    /// Check the structural ledger constraints (lengths, sign, unit sum)
    pub fn is_normalized(&self) -> bool {
        self.ids.len() == self.weights.len()
            && self.weights.iter().all(|w| *w >= 0.0 && w.is_finite())
            && (self.is_empty() || (self.total() - 1.0).abs() <= WEIGHT_EPSILON)
    }
}
