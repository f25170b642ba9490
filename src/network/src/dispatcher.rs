//! Concurrent query fan-out
//!
//! One call per sampled peer, each under its own timeout. Transport failures,
//! timeouts and malformed payloads all collapse to an absent response for
//! that peer; nothing here is retried and nothing propagates past the round.

use crate::registry::PeerRegistry;
use futures::future::join_all;
use peerscore_core::types::parse_response;
use peerscore_core::{PeerId, PeerTransport, Query};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Why a peer ended up without a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsentReason {
    /// Peer has no known address
    UnknownPeer,
    /// Call did not complete within the timeout
    Timeout,
    /// Transport reported a failure
    Transport,
    /// Payload could not be parsed into a structured document
    Malformed,
}

/// Outcome of a single peer call
#[derive(Debug, Clone)]
pub enum CallOutcome {
    Answered(Value),
    Absent(AbsentReason),
}

/// Fans a query out to sampled peers
pub struct Dispatcher {
    transport: Arc<dyn PeerTransport>,
    registry: Arc<PeerRegistry>,
}

impl Dispatcher {
    /// Create a dispatcher
    pub fn new(transport: Arc<dyn PeerTransport>, registry: Arc<PeerRegistry>) -> Self {
        Self { transport, registry }
    }

    /// Query every peer concurrently and wait for all calls to settle
    pub async fn dispatch(
        &self,
        peers: &[PeerId],
        query: &Query,
        timeout: Duration,
    ) -> HashMap<PeerId, Option<Value>> {
        self.dispatch_detailed(peers, query, timeout)
            .await
            .into_iter()
            .map(|(id, outcome)| match outcome {
                CallOutcome::Answered(value) => (id, Some(value)),
                CallOutcome::Absent(_) => (id, None),
            })
            .collect()
    }

    /// Like [`dispatch`](Self::dispatch) but keeps the reason for every absence
    pub async fn dispatch_detailed(
        &self,
        peers: &[PeerId],
        query: &Query,
        timeout: Duration,
    ) -> HashMap<PeerId, CallOutcome> {
        let start = Instant::now();

        let payload = match query.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode query {}: {}", query.kind, e);
                return peers
                    .iter()
                    .map(|id| (*id, CallOutcome::Absent(AbsentReason::Malformed)))
                    .collect();
            }
        };

        let calls = peers.iter().map(|id| {
            let id = *id;
            let address = self.registry.address_of(id);
            let transport = self.transport.clone();
            let payload = &payload;
            async move {
                let Some(address) = address else {
                    return (id, CallOutcome::Absent(AbsentReason::UnknownPeer));
                };

                let outcome =
                    match tokio::time::timeout(timeout, transport.call(&address, payload, timeout))
                        .await
                    {
                        Ok(Ok(bytes)) => match parse_response(&bytes) {
                            Some(value) => CallOutcome::Answered(value),
                            None => CallOutcome::Absent(AbsentReason::Malformed),
                        },
                        Ok(Err(e)) => {
                            debug!("Peer {} at {} failed: {}", id, address, e);
                            CallOutcome::Absent(AbsentReason::Transport)
                        }
                        Err(_) => {
                            debug!("Peer {} at {} timed out after {:?}", id, address, timeout);
                            CallOutcome::Absent(AbsentReason::Timeout)
                        }
                    };
                (id, outcome)
            }
        });

        let results: HashMap<PeerId, CallOutcome> = join_all(calls).await.into_iter().collect();

        let answered = results
            .values()
            .filter(|o| matches!(o, CallOutcome::Answered(_)))
            .count();
        info!(
            "Dispatched {} to {} peers: {} answered, {} absent ({:?})",
            query.kind,
            peers.len(),
            answered,
            peers.len() - answered,
            start.elapsed()
        );

        results
    }
}
