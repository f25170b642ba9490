//! Peer population types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable small-integer peer identifier, used as an index into score vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub u32);

impl PeerId {
    /// Create a new peer ID
    pub fn new(id: u32) -> Self {
        PeerId(id)
    }

    /// Position of this peer in a dense per-peer vector
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PeerId {
    fn from(id: u32) -> Self {
        PeerId(id)
    }
}

/// Identity key bound to a peer slot; a change means the slot was re-registered
pub type IdentityKey = String;

/// A network participant that can be queried
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    /// Stable slot identifier
    pub id: PeerId,

    /// Identity currently registered in this slot
    pub identity: IdentityKey,

    /// Address handed to the transport
    pub address: String,

    /// Stake backing this peer
    #[serde(default)]
    pub stake: f64,

    /// Privileged nodes (e.g. other validators) are never sampled
    #[serde(default)]
    pub is_trusted_role: bool,

    /// Protocol version reported by the last liveness ping
    #[serde(default)]
    pub reported_version: u32,

    /// Epoch in which the peer last answered a ping
    #[serde(default)]
    pub last_seen_epoch: u64,

    /// Liveness flag maintained by the ping task
    #[serde(default)]
    pub reachable: bool,
}

impl Peer {
    /// Create a peer with default liveness metadata
    pub fn new<S: Into<String>, A: Into<String>>(id: u32, identity: S, address: A) -> Self {
        Self {
            id: PeerId(id),
            identity: identity.into(),
            address: address.into(),
            stake: 0.0,
            is_trusted_role: false,
            reported_version: 0,
            last_seen_epoch: 0,
            reachable: false,
        }
    }

    /// Whether this peer may be sampled for a query round
    pub fn is_eligible(&self, required_version: u32) -> bool {
        !self.is_trusted_role && self.reachable && self.reported_version >= required_version
    }
}
