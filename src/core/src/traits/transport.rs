//! Peer transport trait

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// RPC mechanism used to reach a peer
///
/// Implementations must honour `timeout`; callers additionally wrap every call
/// in their own timer so a misbehaving transport cannot stall a round.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Send a request payload to a peer and wait for its response payload
    async fn call(&self, address: &str, payload: &[u8], timeout: Duration) -> Result<Vec<u8>>;
}
