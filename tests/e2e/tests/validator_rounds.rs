//! Full validator rounds against in-memory peers, ledger and storage

mod common;

use common::{init_tracing, peers, test_config, CountingOracle, MockLedger, ScriptedPeers};
use peerscore_consensus::Decision;
use peerscore_core::{AuthoritativeFetch, PeerId, StaticOracle};
use peerscore_node::{EmissionOutcome, RewardSource, Validator, ValidatorConfig};
use peerscore_reputation::{MemoryStateStore, ReputationState, StateStore};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A document with ten fields, every value tagged with `tag`
fn document(tag: &str) -> Value {
    let fields: Map<String, Value> = (0..10)
        .map(|i| (format!("field_{}", i), json!(format!("{}-{}", tag, i))))
        .collect();
    Value::Object(fields)
}

fn seeded_store(scores: Vec<f64>) -> Arc<MemoryStateStore> {
    let store = Arc::new(MemoryStateStore::new());
    let identities = (0..scores.len()).map(|i| format!("hk-{}", i)).collect();
    store
        .save_reputation(&ReputationState { scores, identities })
        .unwrap();
    store
}

struct Harness {
    validator: Validator,
    ledger: Arc<MockLedger>,
    transport: Arc<ScriptedPeers>,
    store: Arc<MemoryStateStore>,
}

async fn harness(
    config: ValidatorConfig,
    peer_count: u32,
    store: Arc<MemoryStateStore>,
    oracle: Arc<dyn AuthoritativeFetch>,
) -> Harness {
    init_tracing();
    let ledger = Arc::new(MockLedger::new(peers(peer_count)));
    let transport = Arc::new(ScriptedPeers::new(1));
    let validator = Validator::new(
        config,
        ledger.clone(),
        transport.clone(),
        oracle,
        store.clone(),
    )
    .unwrap();

    validator.sync_round().await.unwrap();
    validator.ping_round(0).await;

    Harness {
        validator,
        ledger,
        transport,
        store,
    }
}

#[tokio::test]
async fn test_twenty_peer_round_rewards_trusted_majority() {
    let mut scores = vec![0.9; 12];
    scores.extend(vec![0.1; 8]);
    let oracle = CountingOracle::new(Some(json!({"unused": true})));
    let h = harness(test_config(20), 20, seeded_store(scores), oracle.clone()).await;

    for i in 0..12 {
        h.transport.answer(i, document("a"));
    }
    for i in 12..20 {
        h.transport.answer(i, document("b"));
    }

    let summary = h.validator.query_round(1).await.unwrap().unwrap();

    assert!(matches!(summary.decision, Decision::PeerConsensus { trusted: 12, .. }));
    assert_eq!(oracle.calls(), 0);
    assert_eq!(summary.absent, 0);
    for i in 0..12 {
        assert_eq!(summary.rewards[&PeerId(i)], 1.0, "peer {}", i);
    }
    for i in 12..20 {
        assert_eq!(summary.rewards[&PeerId(i)], 0.0, "peer {}", i);
    }

    let scores = h.validator.status().current_scores();
    assert!((scores[0] - 0.91).abs() < 1e-9);
    assert!((scores[19] - 0.09).abs() < 1e-9);
}

#[tokio::test]
async fn test_insufficient_quorum_uses_oracle_verbatim() {
    let truth = json!({"name": "alice", "followers": 120});
    let oracle = CountingOracle::new(Some(truth.clone()));
    let h = harness(test_config(5), 5, Arc::new(MemoryStateStore::new()), oracle.clone()).await;

    h.transport.answer(0, truth.clone());
    h.transport.answer(1, json!({"name": "alice", "followers": 7}));
    h.transport.answer(2, json!({"name": "bob", "followers": 7}));
    // Peers 3 and 4 never answer

    let summary = h.validator.query_round(1).await.unwrap().unwrap();

    assert_eq!(summary.decision, Decision::Oracle { trusted: 0 });
    assert_eq!(oracle.calls(), 1);
    assert_eq!(summary.absent, 2);
    assert_eq!(summary.rewards[&PeerId(0)], 1.0);
    assert!((summary.rewards[&PeerId(1)] - 0.9).abs() < 1e-9);
    assert!((summary.rewards[&PeerId(2)] - 0.8).abs() < 1e-9);
    assert_eq!(summary.rewards[&PeerId(3)], 0.0);

    // Fresh peers start at zero, so one round lands at alpha * reward
    let scores = h.validator.status().current_scores();
    assert!((scores[0] - 0.1).abs() < 1e-9);
    assert_eq!(scores[3], 0.0);
}

#[tokio::test]
async fn test_no_source_of_truth_scores_zero() {
    let h = harness(
        test_config(3),
        3,
        seeded_store(vec![0.5, 0.5, 0.5]),
        Arc::new(StaticOracle::new(None)),
    )
    .await;
    for i in 0..3 {
        h.transport.answer(i, json!({"v": i}));
    }

    let summary = h.validator.query_round(1).await.unwrap().unwrap();
    assert!(matches!(summary.decision, Decision::NoSourceOfTruth { via_oracle: true, .. }));
    assert!(summary.rewards.values().all(|r| *r == 0.0));
    assert!((h.validator.status().current_scores()[0] - 0.45).abs() < 1e-9);
}

#[tokio::test]
async fn test_no_eligible_peers_skips_round() {
    let h = harness(
        test_config(3),
        0,
        Arc::new(MemoryStateStore::new()),
        Arc::new(StaticOracle::new(None)),
    )
    .await;
    assert!(h.validator.query_round(1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_persistence_keeps_snapshot() {
    let oracle = CountingOracle::new(Some(json!({"v": 1})));
    let h = harness(test_config(2), 2, seeded_store(vec![0.3, 0.6]), oracle).await;
    h.transport.answer(0, json!({"v": 1}));
    h.transport.answer(1, json!({"v": 1}));

    let before = h.validator.status().current_scores();
    h.store.set_fail_writes(true);

    assert!(h.validator.query_round(1).await.is_err());
    assert_eq!(h.validator.status().current_scores(), before);

    let metrics = h.validator.status().metrics_text().unwrap();
    assert!(metrics.contains("peerscore_persistence_failures_total 1"));

    // The next round commits once the store recovers
    h.store.set_fail_writes(false);
    h.validator.query_round(2).await.unwrap();
    assert_ne!(h.validator.status().current_scores(), before);
}

#[tokio::test]
async fn test_uniform_fallback_with_too_few_peers() {
    let mut config = test_config(4);
    config.weights.min_allowed_non_zero = 5;
    let h = harness(
        config,
        4,
        seeded_store(vec![0.0, 0.5, 0.5, 0.5]),
        Arc::new(StaticOracle::new(None)),
    )
    .await;

    let outcome = h.validator.weights_round(&CancellationToken::new()).await.unwrap();
    assert_eq!(outcome, EmissionOutcome::Emitted { peers: 4, attempts: 1 });

    let emitted = h.ledger.emitted();
    assert_eq!(emitted.len(), 1);
    let (ids, weights) = &emitted[0];
    assert_eq!(ids, &(0..4).map(PeerId).collect::<Vec<_>>());
    assert!(weights.iter().all(|w| (*w - 0.25).abs() < 1e-12));

    let published = h.validator.status().current_weights().unwrap();
    assert_eq!(&published.weights, weights);
}

#[tokio::test]
async fn test_weights_respect_cap() {
    let mut config = test_config(20);
    config.weights.min_allowed_non_zero = 8;
    config.weights.max_weight_limit = 0.1;
    let scores: Vec<f64> = (0..20).map(|i| if i == 0 { 1.0 } else { 0.05 + i as f64 * 0.01 }).collect();
    let h = harness(config, 20, seeded_store(scores), Arc::new(StaticOracle::new(None))).await;

    h.validator.weights_round(&CancellationToken::new()).await.unwrap();
    let set = h.validator.status().current_weights().unwrap();

    assert!(set.is_normalized());
    assert!(set.max_weight() <= 0.1 + 1e-6);
    assert_eq!(set.len(), 20);
}

#[tokio::test]
async fn test_emission_retries_then_succeeds() {
    let h = harness(
        test_config(4),
        10,
        seeded_store(vec![0.5; 10]),
        Arc::new(StaticOracle::new(None)),
    )
    .await;
    h.ledger.fail_next(2);

    let outcome = h.validator.weights_round(&CancellationToken::new()).await.unwrap();
    assert_eq!(outcome, EmissionOutcome::Emitted { peers: 10, attempts: 3 });
    assert_eq!(h.ledger.attempts(), 3);
    assert_eq!(h.ledger.emitted().len(), 1);
}

#[tokio::test]
async fn test_emission_gives_up_after_max_attempts() {
    let mut config = test_config(4);
    config.emission.max_attempts = 2;
    let h = harness(config, 10, seeded_store(vec![0.5; 10]), Arc::new(StaticOracle::new(None))).await;
    h.ledger.fail_next(100);

    let outcome = h.validator.weights_round(&CancellationToken::new()).await.unwrap();
    assert_eq!(outcome, EmissionOutcome::Failed { attempts: 3 });
    assert!(h.ledger.emitted().is_empty());

    let metrics = h.validator.status().metrics_text().unwrap();
    assert!(metrics.contains("peerscore_weight_emission_failures_total 1"));
}

#[tokio::test]
async fn test_emission_backoff_stops_on_cancel() {
    let mut config = test_config(4);
    config.emission.initial_delay_ms = 60_000;
    let h = harness(config, 10, seeded_store(vec![0.5; 10]), Arc::new(StaticOracle::new(None))).await;
    h.ledger.fail_next(100);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = h.validator.weights_round(&cancel).await.unwrap();
    assert_eq!(outcome, EmissionOutcome::Cancelled);
    assert_eq!(h.ledger.attempts(), 1);
}

#[tokio::test]
async fn test_volume_rewards_feed_weights() {
    let mut config = test_config(3);
    config.scoring.reward_source = RewardSource::Volume;
    config.weights.min_allowed_non_zero = 1;
    config.weights.max_weight_limit = 1.0;
    let truth = json!([{"id": 1}, {"id": 2}]);
    let oracle = CountingOracle::new(Some(truth.clone()));
    let h = harness(config, 3, Arc::new(MemoryStateStore::new()), oracle).await;

    h.transport.answer(0, truth.clone());
    h.transport.answer(1, json!([{"id": 1}]));
    // Peer 2 never answers

    h.validator.query_round(1).await.unwrap();
    // Same items again earn nothing new
    h.validator.query_round(2).await.unwrap();

    let volumes = h.validator.status().current_volumes();
    assert_eq!(volumes[&PeerId(0)], 2.0);
    assert_eq!(volumes[&PeerId(1)], 1.0);
    assert!(!volumes.contains_key(&PeerId(2)));

    // Content rounds do not touch reputation in volume mode
    assert!(h.validator.status().current_scores().iter().all(|s| *s == 0.0));

    h.validator.weights_round(&CancellationToken::new()).await.unwrap();
    let scores = h.validator.status().current_scores();
    assert!((scores[0] - 0.1).abs() < 1e-9);
    assert!((scores[1] - 0.05).abs() < 1e-9);
    assert_eq!(scores[2], 0.0);

    let persisted = h.store.load_volumes().unwrap().unwrap();
    assert_eq!(persisted.buckets.len(), 1);
}

/// Records the thread every reputation write runs on
struct ThreadRecordingStore {
    inner: MemoryStateStore,
    writers: parking_lot::Mutex<Vec<std::thread::ThreadId>>,
}

impl StateStore for ThreadRecordingStore {
    fn load_reputation(&self) -> peerscore_reputation::Result<Option<ReputationState>> {
        self.inner.load_reputation()
    }

    fn save_reputation(&self, state: &ReputationState) -> peerscore_reputation::Result<()> {
        self.writers.lock().push(std::thread::current().id());
        self.inner.save_reputation(state)
    }

    fn load_volumes(&self) -> peerscore_reputation::Result<Option<peerscore_reputation::VolumeState>> {
        self.inner.load_volumes()
    }

    fn save_volumes(&self, state: &peerscore_reputation::VolumeState) -> peerscore_reputation::Result<()> {
        self.inner.save_volumes(state)
    }
}

#[tokio::test]
async fn test_reputation_writes_leave_the_runtime_thread() {
    init_tracing();
    let store = Arc::new(ThreadRecordingStore {
        inner: MemoryStateStore::new(),
        writers: parking_lot::Mutex::new(Vec::new()),
    });
    let ledger = Arc::new(MockLedger::new(peers(2)));
    let transport = Arc::new(ScriptedPeers::new(1));
    transport.answer(0, json!({"v": 1}));
    transport.answer(1, json!({"v": 1}));
    let validator = Validator::new(
        test_config(2),
        ledger,
        transport,
        CountingOracle::new(Some(json!({"v": 1}))),
        store.clone(),
    )
    .unwrap();

    validator.sync_round().await.unwrap();
    validator.ping_round(0).await;
    validator.query_round(1).await.unwrap();

    // The current-thread test runtime drives every task on this thread
    let runtime_thread = std::thread::current().id();
    let writers = store.writers.lock().clone();
    assert!(!writers.is_empty());
    assert!(writers.iter().all(|id| *id != runtime_thread));
}
