//! Peer sampling with full-coverage cycles
//!
//! The sampler keeps an "uncalled" pool of eligible peers that have not been
//! queried in the current coverage cycle. Requests drain the pool without
//! replacement, so absent churn every eligible peer is queried once before any
//! peer is queried twice. When the pool runs dry it is refilled from the full
//! eligible set and sampling resumes.

use crate::error::{NetworkError, Result};
use crate::registry::PeerRegistry;
use parking_lot::Mutex;
use peerscore_core::PeerId;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Samples query candidates from the registry
pub struct PeerSampler {
    registry: Arc<PeerRegistry>,
    required_version: u32,
    uncalled: Mutex<HashSet<PeerId>>,
}

impl PeerSampler {
    /// Create a sampler over a registry
    pub fn new(registry: Arc<PeerRegistry>, required_version: u32) -> Self {
        Self {
            registry,
            required_version,
            uncalled: Mutex::new(HashSet::new()),
        }
    }

    /// Minimum protocol version a peer must report to be sampled
    pub fn required_version(&self) -> u32 {
        self.required_version
    }

    /// Select up to `k` distinct eligible peers, never any in `exclude`
    ///
    /// Returns every eligible peer when fewer than `k` remain. Fails only when
    /// no eligible peer is left after exclusion.
    pub fn sample(&self, k: usize, exclude: &[PeerId]) -> Result<Vec<PeerId>> {
        let excluded: HashSet<PeerId> = exclude.iter().copied().collect();
        let eligible: HashSet<PeerId> = self
            .registry
            .eligible_ids(self.required_version())
            .into_iter()
            .collect();

        let candidates: HashSet<PeerId> = eligible.difference(&excluded).copied().collect();
        if candidates.is_empty() {
            return Err(NetworkError::NoPeersAvailable);
        }

        let target = k.min(candidates.len());
        let mut chosen: Vec<PeerId> = Vec::with_capacity(target);
        let mut rng = rand::thread_rng();

        let mut pool = self.uncalled.lock();
        // Peers that dropped out of eligibility leave the cycle
        pool.retain(|id| eligible.contains(id));

        Self::drain(&mut pool, &candidates, &mut chosen, target, &mut rng);

        if chosen.len() < target {
            debug!("Uncalled pool exhausted, starting a new coverage cycle");
            *pool = candidates.clone();
            Self::drain(&mut pool, &candidates, &mut chosen, target, &mut rng);
        }

        Ok(chosen)
    }

    /// Number of peers left in the current coverage cycle
    pub fn uncalled_len(&self) -> usize {
        self.uncalled.lock().len()
    }

    /// Drop the current cycle; the next sample starts a fresh one
    pub fn reset_pool(&self) {
        self.uncalled.lock().clear();
    }

    fn drain<R: rand::Rng>(
        pool: &mut HashSet<PeerId>,
        candidates: &HashSet<PeerId>,
        chosen: &mut Vec<PeerId>,
        target: usize,
        rng: &mut R,
    ) {
        let mut available: Vec<PeerId> = pool
            .iter()
            .filter(|id| candidates.contains(id) && !chosen.contains(id))
            .copied()
            .collect();
        available.sort();

        let need = target - chosen.len();
        let picks: Vec<PeerId> = available.choose_multiple(rng, need).copied().collect();
        for id in picks {
            pool.remove(&id);
            chosen.push(id);
        }
    }
}
