//! Throughput accounting per epoch group
//!
//! Each bucket covers `bucket_size` height units. Peers are credited once per
//! distinct item they return (items are keyed by a blake3 hash of their
//! canonical JSON), and only the last `retention` buckets are kept. Dedup
//! keys are dropped together with the bucket they were credited in, so an
//! item seen again after its bucket expired is credited anew.

use crate::types::{VolumeBucket, VolumeConfig, VolumeState};
use parking_lot::RwLock;
use peerscore_core::PeerId;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Append-only, bounded volume ledger
pub struct VolumeLedger {
    config: VolumeConfig,
    state: RwLock<VolumeState>,
}

impl VolumeLedger {
    pub fn new(config: VolumeConfig) -> Self {
        Self::from_state(config, VolumeState::default())
    }

    /// Restore a ledger from persisted state
    pub fn from_state(config: VolumeConfig, state: VolumeState) -> Self {
        let ledger = Self {
            config,
            state: RwLock::new(state),
        };
        ledger.prune(&mut ledger.state.write());
        ledger
    }

    /// Epoch group a height falls into
    pub fn epoch_group(&self, height: u64) -> u64 {
        height / self.config.bucket_size.max(1)
    }

    /// Credit `peer` for the items it returned at `height`
    ///
    /// Returns the number of previously unseen items credited.
    pub fn record(&self, height: u64, peer: PeerId, items: &[String]) -> usize {
        let group = self.epoch_group(height);
        let mut state = self.state.write();

        let existing = state.buckets.iter().position(|b| b.epoch_group == group);
        if existing.is_none() && state.buckets.last().is_some_and(|b| b.epoch_group > group) {
            debug!("Dropping volume for stale epoch group {}", group);
            return 0;
        }

        let seen = state.seen.entry(peer).or_default();
        let mut fresh = 0;
        for key in items {
            if !seen.contains_key(key) {
                seen.insert(key.clone(), group);
                fresh += 1;
            }
        }
        if fresh == 0 {
            return 0;
        }

        let pos = match existing {
            Some(pos) => pos,
            None => {
                state.buckets.push(VolumeBucket {
                    epoch_group: group,
                    per_peer_volume: BTreeMap::new(),
                });
                self.prune(&mut state);
                state.buckets.len() - 1
            }
        };
        *state.buckets[pos].per_peer_volume.entry(peer).or_insert(0.0) += fresh as f64;
        fresh
    }

    /// Clear everything accumulated for replaced peers
    pub fn clear_peers(&self, ids: &[PeerId]) {
        if ids.is_empty() {
            return;
        }
        let mut state = self.state.write();
        for id in ids {
            state.seen.remove(id);
            for bucket in state.buckets.iter_mut() {
                bucket.per_peer_volume.remove(id);
            }
        }
    }

    /// Total volume per peer over the retention window
    pub fn totals(&self) -> BTreeMap<PeerId, f64> {
        let state = self.state.read();
        let mut totals = BTreeMap::new();
        for bucket in &state.buckets {
            for (peer, volume) in &bucket.per_peer_volume {
                *totals.entry(*peer).or_insert(0.0) += volume;
            }
        }
        totals
    }

    /// Rewards proportional to volume, scaled so the busiest peer gets 1.0
    pub fn rewards(&self) -> HashMap<PeerId, f64> {
        let totals = self.totals();
        let max = totals.values().cloned().fold(0.0f64, f64::max);
        if max <= 0.0 {
            return HashMap::new();
        }
        totals.into_iter().map(|(peer, v)| (peer, v / max)).collect()
    }

    /// Buckets currently in the window
    pub fn buckets(&self) -> Vec<VolumeBucket> {
        self.state.read().buckets.clone()
    }

    /// Full state for persistence
    pub fn state(&self) -> VolumeState {
        self.state.read().clone()
    }

    fn prune(&self, state: &mut VolumeState) {
        let excess = state.buckets.len().saturating_sub(self.config.retention);
        if excess > 0 {
            state.buckets.drain(..excess);
        }

        // Keys credited in the newest group stay even before its bucket exists
        let oldest = match state.buckets.first() {
            Some(bucket) => bucket.epoch_group,
            None => return,
        };
        state.seen.retain(|_, keys| {
            keys.retain(|_, group| *group >= oldest);
            !keys.is_empty()
        });
    }
}

/// Dedup keys for the items in a response
///
/// An array contributes one item per element; anything else is one item.
pub fn item_keys(response: &Value) -> Vec<String> {
    let key = |v: &Value| {
        let encoded = serde_json::to_vec(v).unwrap_or_default();
        blake3::hash(&encoded).to_hex().to_string()
    };
    match response {
        Value::Array(items) => items.iter().map(key).collect(),
        Value::Null => Vec::new(),
        other => vec![key(other)],
    }
}
