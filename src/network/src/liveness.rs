//! Liveness probing
//!
//! Pings every registered peer, records reachability and the protocol version
//! it reports, and tracks consecutive failures so a single dropped ping does
//! not immediately evict a peer from sampling.

use crate::registry::PeerRegistry;
use dashmap::DashMap;
use futures::future::join_all;
use peerscore_core::{PeerId, PeerTransport, Query};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Health status for a single peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Dead,
}

/// Ping quality tracked per peer
#[derive(Debug, Clone)]
pub struct QualityMetrics {
    /// Round-trip time of the last successful ping
    pub rtt: Duration,

    /// Number of consecutive failures
    pub consecutive_failures: u32,

    /// Overall health status
    pub status: HealthStatus,
}

impl QualityMetrics {
    /// Create new quality metrics for a never-pinged peer
    pub fn new() -> Self {
        Self {
            rtt: Duration::ZERO,
            consecutive_failures: 0,
            status: HealthStatus::Dead,
        }
    }

    /// Update metrics after a successful ping
    pub fn update_success(&mut self, rtt: Duration) {
        self.rtt = rtt;
        self.consecutive_failures = 0;
        self.status = HealthStatus::Healthy;
    }

    /// Update metrics after a failed ping
    pub fn update_failure(&mut self, dead_after: u32) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= dead_after || self.status == HealthStatus::Dead {
            self.status = HealthStatus::Dead;
        } else {
            self.status = HealthStatus::Degraded;
        }
    }

    /// Whether the peer may still be sampled
    pub fn is_reachable(&self) -> bool {
        self.status != HealthStatus::Dead
    }
}

impl Default for QualityMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Liveness prober configuration
#[derive(Debug, Clone)]
pub struct LivenessConfig {
    /// Timeout for a single ping
    pub ping_timeout: Duration,

    /// Consecutive failures before a peer is marked unreachable
    pub dead_after: u32,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            ping_timeout: Duration::from_secs(5),
            dead_after: 3,
        }
    }
}

/// Summary of one probing pass
#[derive(Debug, Clone, Default)]
pub struct LivenessReport {
    pub reachable: Vec<PeerId>,
    pub unreachable: Vec<PeerId>,
}

#[derive(Debug, Deserialize)]
struct PingReply {
    #[serde(default)]
    version: Option<u32>,
}

/// Pings peers and writes liveness into the registry
pub struct LivenessProber {
    config: LivenessConfig,
    transport: Arc<dyn PeerTransport>,
    registry: Arc<PeerRegistry>,
    quality: DashMap<PeerId, QualityMetrics>,
}

impl LivenessProber {
    /// Create a new prober
    pub fn new(
        config: LivenessConfig,
        transport: Arc<dyn PeerTransport>,
        registry: Arc<PeerRegistry>,
    ) -> Self {
        Self {
            config,
            transport,
            registry,
            quality: DashMap::new(),
        }
    }

    /// Ping every registered peer concurrently
    pub async fn probe_all(&self, epoch: u64) -> LivenessReport {
        let payload = match Query::new("ping", Value::Null).to_payload() {
            Ok(payload) => payload,
            Err(_) => return LivenessReport::default(),
        };

        let peers = self.registry.snapshot();
        let timeout = self.config.ping_timeout;

        let pings = peers.iter().filter(|p| !p.address.is_empty()).map(|peer| {
            let transport = self.transport.clone();
            let payload = &payload;
            async move {
                let start = Instant::now();
                let result =
                    tokio::time::timeout(timeout, transport.call(&peer.address, payload, timeout))
                        .await;
                let reply = match result {
                    Ok(Ok(bytes)) => Some(
                        serde_json::from_slice::<PingReply>(&bytes)
                            .map(|r| r.version)
                            .unwrap_or(None),
                    ),
                    _ => None,
                };
                (peer.id, reply, start.elapsed())
            }
        });

        let mut report = LivenessReport::default();
        for (id, reply, rtt) in join_all(pings).await {
            let mut quality = self.quality.entry(id).or_default();
            match reply {
                Some(version) => {
                    quality.update_success(rtt);
                    self.registry.record_liveness(id, true, version, epoch);
                }
                None => {
                    quality.update_failure(self.config.dead_after);
                    let reachable = quality.is_reachable();
                    self.registry.record_liveness(id, reachable, None, epoch);
                    debug!(
                        "Ping to peer {} failed ({} consecutive)",
                        id, quality.consecutive_failures
                    );
                }
            }

            if quality.is_reachable() {
                report.reachable.push(id);
            } else {
                report.unreachable.push(id);
            }
        }

        info!(
            "Liveness pass at epoch {}: {} reachable, {} unreachable",
            epoch,
            report.reachable.len(),
            report.unreachable.len()
        );
        report
    }

    /// Current quality metrics for a peer
    pub fn quality(&self, id: PeerId) -> Option<QualityMetrics> {
        self.quality.get(&id).map(|q| q.clone())
    }

    /// Forget tracked quality for replaced peers
    pub fn forget(&self, ids: &[PeerId]) {
        for id in ids {
            self.quality.remove(id);
        }
    }
}
