//! In-memory collaborators shared by the end-to-end scenarios

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use peerscore_core::{
    AuthoritativeFetch, CoreError, Ledger, Peer, PeerId, PeerTransport, Query, Result,
};
use peerscore_node::ValidatorConfig;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn address(id: u32) -> String {
    format!("10.1.0.{}:8091", id)
}

/// Peers `0..n` with identities `hk-<id>`
pub fn peers(n: u32) -> Vec<Peer> {
    (0..n).map(|i| Peer::new(i, format!("hk-{}", i), address(i))).collect()
}

/// Answers pings with a version and queries with a per-address document
pub struct ScriptedPeers {
    answers: Mutex<HashMap<String, Value>>,
    version: u32,
}

impl ScriptedPeers {
    pub fn new(version: u32) -> Self {
        Self {
            answers: Mutex::new(HashMap::new()),
            version,
        }
    }

    pub fn answer(&self, id: u32, value: Value) {
        self.answers.lock().insert(address(id), value);
    }
}

#[async_trait]
impl PeerTransport for ScriptedPeers {
    async fn call(&self, address: &str, payload: &[u8], _timeout: Duration) -> Result<Vec<u8>> {
        let query = Query::from_payload(payload)?;
        if query.kind == "ping" {
            return Ok(format!("{{\"version\":{}}}", self.version).into_bytes());
        }
        match self.answers.lock().get(address) {
            Some(value) => Ok(serde_json::to_vec(value)?),
            None => Err(CoreError::transport("connection refused")),
        }
    }
}

/// Ledger with a manually driven height and recorded emissions
pub struct MockLedger {
    height: AtomicU64,
    peers: Mutex<Vec<Peer>>,
    emitted: Mutex<Vec<(Vec<PeerId>, Vec<f64>)>>,
    failures_left: AtomicU32,
    attempts: AtomicU32,
}

impl MockLedger {
    pub fn new(peers: Vec<Peer>) -> Self {
        Self {
            height: AtomicU64::new(0),
            peers: Mutex::new(peers),
            emitted: Mutex::new(Vec::new()),
            failures_left: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
        }
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    pub fn set_peers(&self, peers: Vec<Peer>) {
        *self.peers.lock() = peers;
    }

    /// Fail the next `n` emissions
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn emitted(&self) -> Vec<(Vec<PeerId>, Vec<f64>)> {
        self.emitted.lock().clone()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn current_height(&self) -> Result<u64> {
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn emit_weights(&self, ids: &[PeerId], weights: &[f64]) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CoreError::ledger("node unavailable"));
        }
        self.emitted
            .lock()
            .push((ids.to_vec(), weights.to_vec()));
        Ok(())
    }

    async fn peer_snapshot(&self) -> Result<Vec<Peer>> {
        Ok(self.peers.lock().clone())
    }
}

/// Oracle with a fixed answer that counts its calls
pub struct CountingOracle {
    answer: Option<Value>,
    calls: AtomicUsize,
}

impl CountingOracle {
    pub fn new(answer: Option<Value>) -> Arc<Self> {
        Arc::new(Self {
            answer,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthoritativeFetch for CountingOracle {
    async fn get(&self, _query: &Query) -> Result<Option<Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.clone())
    }
}

/// Config tuned for fast, deterministic scenarios
pub fn test_config(sample_size: usize) -> ValidatorConfig {
    let mut config = ValidatorConfig::default();
    config.network.sample_size = sample_size;
    config.network.query_timeout_ms = 500;
    config.network.ping_timeout_ms = 500;
    config.schedule.tick_ms = 10;
    config.emission.initial_delay_ms = 5;
    config.emission.max_delay_ms = 20;
    config
}
