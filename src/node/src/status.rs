//! Read-only status snapshots

use parking_lot::RwLock;
use peerscore_core::{PeerId, WeightSet};
use peerscore_reputation::{
    ReputationScore, ReputationStatistics, ReputationStore, ValidatorMetrics, VolumeLedger,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Cheap handle onto the validator's published state
///
/// Every accessor returns an owned copy; holding one never blocks writers.
#[derive(Clone)]
pub struct StatusHandle {
    reputation: Arc<ReputationStore>,
    volumes: Arc<VolumeLedger>,
    weights: Arc<RwLock<Option<WeightSet>>>,
    metrics: Arc<ValidatorMetrics>,
}

impl StatusHandle {
    pub(crate) fn new(
        reputation: Arc<ReputationStore>,
        volumes: Arc<VolumeLedger>,
        weights: Arc<RwLock<Option<WeightSet>>>,
        metrics: Arc<ValidatorMetrics>,
    ) -> Self {
        Self {
            reputation,
            volumes,
            weights,
            metrics,
        }
    }

    /// Committed reputation scores, indexed by peer id
    pub fn current_scores(&self) -> Vec<ReputationScore> {
        self.reputation.snapshot().scores.clone()
    }

    /// Weight set computed by the latest weights round
    pub fn current_weights(&self) -> Option<WeightSet> {
        self.weights.read().clone()
    }

    /// Volume per peer over the retention window
    pub fn current_volumes(&self) -> BTreeMap<PeerId, f64> {
        self.volumes.totals()
    }

    pub fn statistics(&self) -> ReputationStatistics {
        self.reputation.statistics()
    }

    /// Prometheus text exposition
    pub fn metrics_text(&self) -> peerscore_reputation::Result<String> {
        self.metrics.gather_text()
    }
}
