//! EMA reputation store
//!
//! Scores live in a dense vector indexed by peer id. Writers are serialized
//! by a mutex and build the next vector from a copy of the current one; the
//! new vector is persisted first and only then swapped in, so readers always
//! hold either the old or the new snapshot in full.

use crate::error::Result;
use crate::storage::StateStore;
use crate::types::{ReputationConfig, ReputationScore, ReputationState};
use parking_lot::{Mutex, RwLock};
use peerscore_core::{IdentityKey, PeerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-peer reputation backed by durable storage
pub struct ReputationStore {
    config: ReputationConfig,
    current: RwLock<Arc<ReputationState>>,
    writer: Mutex<()>,
    store: Arc<dyn StateStore>,
}

impl ReputationStore {
    /// Open the store and reconcile persisted scores with the live identities
    ///
    /// Every slot whose persisted identity differs from the live one is reset
    /// to zero; those ids are returned so callers can clear per-peer state.
    pub fn open(
        config: ReputationConfig,
        store: Arc<dyn StateStore>,
        live_identities: &[IdentityKey],
    ) -> Result<(Self, Vec<PeerId>)> {
        config.validate()?;

        let persisted = match store.load_reputation() {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                warn!("Persisted reputation unreadable, starting empty: {}", e);
                ReputationState::default()
            }
        };
        info!("Loaded {} persisted reputation scores", persisted.scores.len());

        let this = Self {
            config,
            current: RwLock::new(Arc::new(persisted)),
            writer: Mutex::new(()),
            store,
        };
        let replaced = this.sync_identities(live_identities)?;
        Ok((this, replaced))
    }

    /// Consistent snapshot of the full state
    pub fn snapshot(&self) -> Arc<ReputationState> {
        self.current.read().clone()
    }

    /// Copy of the score vector
    pub fn scores(&self) -> Vec<ReputationScore> {
        self.current.read().scores.clone()
    }

    /// Score of one peer; unseen peers score zero
    pub fn score_of(&self, id: PeerId) -> ReputationScore {
        self.current.read().scores.get(id.index()).copied().unwrap_or(0.0)
    }

    /// Length of the score vector
    pub fn len(&self) -> usize {
        self.current.read().scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fold one round of rewards into the scores
    ///
    /// Non-finite rewards count as 0 and rewards are clamped to [0, 1].
    /// Peers without a reward this round keep their score. On persistence
    /// failure nothing is committed.
    pub fn update(&self, rewards: &HashMap<PeerId, f64>) -> Result<Arc<ReputationState>> {
        let _guard = self.writer.lock();
        let mut next = (**self.current.read()).clone();

        let alpha = self.config.alpha;
        for (id, reward) in rewards {
            let reward = if reward.is_finite() { reward.clamp(0.0, 1.0) } else { 0.0 };
            grow(&mut next, id.index() + 1);
            let old = next.scores[id.index()];
            next.scores[id.index()] = alpha * reward + (1.0 - alpha) * old;
        }

        self.commit(next)
    }

    /// Zero the scores of replaced peers
    pub fn reset(&self, ids: &[PeerId]) -> Result<Arc<ReputationState>> {
        let _guard = self.writer.lock();
        let mut next = (**self.current.read()).clone();
        for id in ids {
            grow(&mut next, id.index() + 1);
            next.scores[id.index()] = 0.0;
        }
        self.commit(next)
    }

    /// Bind slots to the live identity list
    ///
    /// Slots with a previously known, different identity are zeroed; the
    /// vector grows to cover every live slot. Returns the replaced ids.
    pub fn sync_identities(&self, identities: &[IdentityKey]) -> Result<Vec<PeerId>> {
        let _guard = self.writer.lock();
        let current = self.current.read().clone();
        let mut next = (*current).clone();
        grow(&mut next, identities.len());

        let mut replaced = Vec::new();
        for (index, identity) in identities.iter().enumerate() {
            let known = &next.identities[index];
            if known == identity {
                continue;
            }
            if !known.is_empty() {
                next.scores[index] = 0.0;
                replaced.push(PeerId(index as u32));
            }
            next.identities[index] = identity.clone();
        }

        if next != *current {
            if !replaced.is_empty() {
                info!("Reset reputation of {} replaced peers: {:?}", replaced.len(), replaced);
            }
            self.commit(next)?;
        }
        Ok(replaced)
    }

    /// Summary statistics over all slots
    pub fn statistics(&self) -> ReputationStatistics {
        let state = self.snapshot();
        let mut stats = ReputationStatistics {
            total_peers: state.scores.len(),
            ..Default::default()
        };
        if state.scores.is_empty() {
            return stats;
        }

        stats.lowest_score = f64::INFINITY;
        for score in &state.scores {
            if *score > self.config.trust_threshold {
                stats.trusted_peers += 1;
            }
            stats.average_score += score;
            stats.highest_score = stats.highest_score.max(*score);
            stats.lowest_score = stats.lowest_score.min(*score);
        }
        stats.average_score /= state.scores.len() as f64;
        stats
    }

    fn commit(&self, next: ReputationState) -> Result<Arc<ReputationState>> {
        self.store.save_reputation(&next)?;
        let next = Arc::new(next);
        *self.current.write() = next.clone();
        debug!("Committed reputation snapshot of {} peers", next.scores.len());
        Ok(next)
    }
}

/// Zero-extend scores and identities to at least `len` slots
fn grow(state: &mut ReputationState, len: usize) {
    if state.scores.len() < len {
        state.scores.resize(len, 0.0);
    }
    if state.identities.len() < len {
        state.identities.resize(len, IdentityKey::new());
    }
}

/// Reputation summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReputationStatistics {
    /// Number of slots in the score vector
    pub total_peers: usize,

    /// Peers above the trust threshold
    pub trusted_peers: usize,

    pub average_score: f64,
    pub highest_score: f64,
    pub lowest_score: f64,
}
