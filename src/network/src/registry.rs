//! Peer registry
//!
//! Tracks the known peer population. Slots are addressed by a stable
//! [`PeerId`]; the registry only ever grows. A slot whose identity key changes
//! between two syncs has been re-registered by a different participant and is
//! reported as replaced so that score and dedup state can be zeroed.

use parking_lot::RwLock;
use peerscore_core::{IdentityKey, Peer, PeerId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Outcome of reconciling the registry with a fresh population snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Slots that did not exist before
    pub added: Vec<PeerId>,

    /// Slots whose identity key changed
    pub replaced: Vec<PeerId>,

    /// Registry size after the sync
    pub total: usize,
}

impl SyncReport {
    /// Whether the sync changed the population
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.replaced.is_empty()
    }
}

/// Thread-safe registry of peers indexed by slot id
pub struct PeerRegistry {
    peers: RwLock<Vec<Peer>>,
}

impl PeerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(Vec::new()),
        }
    }

    /// Create a registry from an initial population
    pub fn from_peers(peers: Vec<Peer>) -> Self {
        let registry = Self::new();
        registry.sync(peers);
        registry
    }

    /// Reconcile with a population snapshot from the ledger
    ///
    /// Ledger-owned fields (identity, address, stake, role) are overwritten.
    /// Liveness fields survive unless the slot was replaced.
    pub fn sync(&self, snapshot: Vec<Peer>) -> SyncReport {
        let mut snapshot = snapshot;
        snapshot.sort_by_key(|p| p.id);

        let mut peers = self.peers.write();
        let mut report = SyncReport::default();

        for incoming in snapshot {
            let index = incoming.id.index();

            // Fill any gap with empty, unreachable placeholder slots
            while peers.len() < index {
                let placeholder = Peer::new(peers.len() as u32, String::new(), String::new());
                report.added.push(placeholder.id);
                peers.push(placeholder);
            }

            if index == peers.len() {
                debug!("Registered new peer {} ({})", incoming.id, incoming.identity);
                report.added.push(incoming.id);
                peers.push(incoming);
                continue;
            }

            let existing = &mut peers[index];
            if existing.identity != incoming.identity {
                if !existing.identity.is_empty() {
                    info!(
                        "Peer slot {} replaced: {} -> {}",
                        incoming.id, existing.identity, incoming.identity
                    );
                    report.replaced.push(incoming.id);
                }
                *existing = incoming;
            } else {
                existing.address = incoming.address;
                existing.stake = incoming.stake;
                existing.is_trusted_role = incoming.is_trusted_role;
            }
        }

        report.total = peers.len();
        report
    }

    /// Get a copy of a peer
    pub fn get(&self, id: PeerId) -> Option<Peer> {
        self.peers.read().get(id.index()).cloned()
    }

    /// Address of a peer, if registered
    pub fn address_of(&self, id: PeerId) -> Option<String> {
        self.peers
            .read()
            .get(id.index())
            .filter(|p| !p.address.is_empty())
            .map(|p| p.address.clone())
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    /// All slot ids in order
    pub fn ids(&self) -> Vec<PeerId> {
        self.peers.read().iter().map(|p| p.id).collect()
    }

    /// Identity key per slot, in slot order
    pub fn identities(&self) -> Vec<IdentityKey> {
        self.peers.read().iter().map(|p| p.identity.clone()).collect()
    }

    /// Copy of the full population
    pub fn snapshot(&self) -> Vec<Peer> {
        self.peers.read().clone()
    }

    /// Ids currently eligible for sampling
    pub fn eligible_ids(&self, required_version: u32) -> Vec<PeerId> {
        self.peers
            .read()
            .iter()
            .filter(|p| p.is_eligible(required_version))
            .map(|p| p.id)
            .collect()
    }

    /// Record the outcome of a liveness ping
    pub fn record_liveness(&self, id: PeerId, reachable: bool, version: Option<u32>, epoch: u64) {
        let mut peers = self.peers.write();
        if let Some(peer) = peers.get_mut(id.index()) {
            peer.reachable = reachable;
            if let Some(version) = version {
                peer.reported_version = version;
            }
            if reachable {
                peer.last_seen_epoch = epoch;
            }
        }
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
