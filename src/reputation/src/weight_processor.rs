//! Reputation to ledger-legal weights
//!
//! 1. Non-positive scores are dropped. With nothing left, or fewer known
//!    peers than `min_allowed_non_zero`, every known peer gets `1/n`.
//! 2. With too few positive scores, every known peer gets a floor of
//!    [`FLOOR_WEIGHT`] on top of its score before capping.
//! 3. Otherwise scores below a quantile cutoff are excluded (the quantile is
//!    bounded so at least `min_allowed_non_zero` survive) and the rest is
//!    capped and normalized.
//!
//! Capping clips every value above a cutoff chosen so that, after
//! renormalizing, no share exceeds `max_weight_limit`. When fewer than
//! `1 / max_weight_limit` peers survive the cap cannot be met and the result
//! is uniform over them, which is above the cap.

use crate::types::WeightConstraints;
use peerscore_core::{PeerId, WeightSet};
use tracing::debug;

/// Floor given to every peer when too few have a positive score
pub const FLOOR_WEIGHT: f64 = 1e-5;

/// Converts score vectors into weight sets
#[derive(Debug, Clone, Default)]
pub struct WeightProcessor {
    constraints: WeightConstraints,
}

impl WeightProcessor {
    pub fn new(constraints: WeightConstraints) -> Self {
        Self { constraints }
    }

    pub fn constraints(&self) -> &WeightConstraints {
        &self.constraints
    }

    /// Build the weight set for `ids`, reading each id's score from `scores`
    ///
    /// Ids beyond the end of `scores` score zero.
    pub fn process(&self, ids: &[PeerId], scores: &[f64]) -> WeightSet {
        process_weights(ids, scores, &self.constraints)
    }
}

/// See the module docs for the three paths
pub fn process_weights(ids: &[PeerId], scores: &[f64], constraints: &WeightConstraints) -> WeightSet {
    let score = |id: &PeerId| match scores.get(id.index()) {
        Some(s) if s.is_finite() => *s,
        _ => 0.0,
    };
    let n = ids.len();
    let positive: Vec<(PeerId, f64)> = ids
        .iter()
        .map(|id| (*id, score(id)))
        .filter(|(_, s)| *s > 0.0)
        .collect();

    if positive.is_empty() || n < constraints.min_allowed_non_zero {
        debug!(
            "Uniform weights over {} peers ({} positive, {} required)",
            n,
            positive.len(),
            constraints.min_allowed_non_zero
        );
        return WeightSet::uniform(ids.to_vec());
    }

    if positive.len() < constraints.min_allowed_non_zero {
        let floored: Vec<f64> = ids.iter().map(|id| FLOOR_WEIGHT + score(id).max(0.0)).collect();
        return WeightSet::new(
            ids.to_vec(),
            normalize_max_weight(&floored, constraints.max_weight_limit),
        );
    }

    let values: Vec<f64> = positive.iter().map(|(_, s)| *s).collect();
    let count = values.len();
    let max_exclude = count.saturating_sub(constraints.min_allowed_non_zero) as f64 / count as f64;
    let lowest_quantile = constraints.exclusion_quantile.min(max_exclude);
    let cutoff = quantile(&values, lowest_quantile);

    let (kept_ids, kept): (Vec<PeerId>, Vec<f64>) =
        positive.into_iter().filter(|(_, s)| *s >= cutoff).unzip();
    debug!(
        "Quantile {:.3} cutoff {:.6}: kept {} of {} positive scores",
        lowest_quantile,
        cutoff,
        kept.len(),
        count
    );

    let weights = normalize_max_weight(&kept, constraints.max_weight_limit);
    WeightSet::new(kept_ids, weights)
}

/// Normalize to unit sum with no share above `limit`
///
/// Values are clipped at a single cutoff found by walking the sorted values
/// from the largest down: with the top `k` clipped to `c` and the remainder
/// summing to `rest`, the clipped share is exactly `limit` when
/// `c = limit * rest / (1 - k * limit)`. The first `k` whose next value fits
/// under that `c` fixes the cutoff.
///
/// Returns the uniform distribution when the input sums to zero or when the
/// cap is infeasible (fewer than `1 / limit` positive values).
pub fn normalize_max_weight(weights: &[f64], limit: f64) -> Vec<f64> {
    let len = weights.len();
    if len == 0 {
        return Vec::new();
    }
    let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    let positive = weights.iter().filter(|w| **w > 0.0).count();
    if total <= 0.0 || positive as f64 * limit <= 1.0 {
        return vec![1.0 / len as f64; len];
    }

    let mut descending: Vec<f64> = weights.iter().map(|w| w.max(0.0)).collect();
    descending.sort_by(|a, b| b.total_cmp(a));
    if descending[0] <= limit * total {
        return weights.iter().map(|w| w.max(0.0) / total).collect();
    }

    // Suffix sums accumulated from the smallest value up
    let mut rest = vec![0.0; len + 1];
    for k in (0..len).rev() {
        rest[k] = rest[k + 1] + descending[k];
    }

    let mut cutoff = None;
    for (k, value) in descending.iter().enumerate() {
        let clipped_share = k as f64 * limit;
        if clipped_share >= 1.0 {
            break;
        }
        let candidate = limit * rest[k] / (1.0 - clipped_share);
        if *value <= candidate {
            cutoff = Some(candidate);
            break;
        }
    }
    let Some(cutoff) = cutoff else {
        return vec![1.0 / len as f64; len];
    };

    let clipped: Vec<f64> = weights.iter().map(|w| w.max(0.0).min(cutoff)).collect();
    let clipped_total: f64 = clipped.iter().sum();
    clipped.into_iter().map(|w| w / clipped_total).collect()
}


/// Linear-interpolated quantile of unsorted values
fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
