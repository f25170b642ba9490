//! Authoritative oracle reached over the peer transport

use async_trait::async_trait;
use peerscore_core::types::parse_response;
use peerscore_core::{AuthoritativeFetch, CoreError, PeerTransport, Query, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Sends the round's query to a fixed oracle address
pub struct TransportOracle {
    address: String,
    timeout: Duration,
    transport: Arc<dyn PeerTransport>,
}

impl TransportOracle {
    pub fn new(address: String, timeout: Duration, transport: Arc<dyn PeerTransport>) -> Self {
        Self {
            address,
            timeout,
            transport,
        }
    }
}

#[async_trait]
impl AuthoritativeFetch for TransportOracle {
    async fn get(&self, query: &Query) -> Result<Option<Value>> {
        let payload = query.to_payload()?;
        let reply = tokio::time::timeout(
            self.timeout,
            self.transport.call(&self.address, &payload, self.timeout),
        )
        .await
        .map_err(|_| CoreError::Timeout)?
        .map_err(|e| CoreError::oracle(format!("{}: {}", self.address, e)))?;

        let answer = parse_response(&reply);
        debug!(
            "Oracle {} answered {} ({} bytes, parsed: {})",
            self.address,
            query.kind,
            reply.len(),
            answer.is_some()
        );
        Ok(answer)
    }
}
