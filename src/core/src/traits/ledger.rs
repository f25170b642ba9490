//! Incentive ledger trait

use crate::error::Result;
use crate::types::{Peer, PeerId};
use async_trait::async_trait;

/// External incentive ledger the validator reads heights from and emits weights to
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Current monotonically increasing height
    async fn current_height(&self) -> Result<u64>;

    /// Publish a weight vector
    async fn emit_weights(&self, ids: &[PeerId], weights: &[f64]) -> Result<()>;

    /// Current peer population, indexed by slot id
    async fn peer_snapshot(&self) -> Result<Vec<Peer>>;
}
