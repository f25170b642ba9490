//! Scheduler-driven operation and cooperative shutdown

mod common;

use common::{init_tracing, peers, test_config, CountingOracle, MockLedger, ScriptedPeers};
use peerscore_node::{RoundScheduler, Validator};
use peerscore_reputation::MemoryStateStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_scheduler_runs_rounds_and_stops_on_cancel() {
    init_tracing();
    let mut config = test_config(4);
    config.schedule.sync_interval = 5;
    config.schedule.ping_interval = 1;
    config.schedule.query_interval = 1;
    config.schedule.weights_interval = 10;
    config.weights.min_allowed_non_zero = 1;
    config.weights.max_weight_limit = 1.0;

    let transport = Arc::new(ScriptedPeers::new(1));
    for i in 0..4 {
        transport.answer(i, json!({"v": 1}));
    }
    let ledger = Arc::new(MockLedger::new(peers(4)));
    let oracle = CountingOracle::new(Some(json!({"v": 1})));
    let validator = Arc::new(
        Validator::new(
            config,
            ledger.clone(),
            transport,
            oracle.clone(),
            Arc::new(MemoryStateStore::new()),
        )
        .unwrap(),
    );
    let status = validator.status();

    let shutdown = CancellationToken::new();
    let scheduler = tokio::spawn(RoundScheduler::new(validator, shutdown.clone()).run());

    for height in 1..=40 {
        ledger.set_height(height);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert!(oracle.calls() > 0, "no query round ran");
    assert!(status.current_scores().iter().any(|s| *s > 0.0));
    assert!(!ledger.emitted().is_empty(), "no weights emitted");
    assert!(status.current_weights().is_some());

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), scheduler)
        .await
        .expect("scheduler did not stop after cancel")
        .unwrap();
}

#[tokio::test]
async fn test_scheduler_idle_at_constant_height() {
    init_tracing();
    let ledger = Arc::new(MockLedger::new(peers(2)));
    let oracle = CountingOracle::new(Some(json!({"v": 1})));
    let transport = Arc::new(ScriptedPeers::new(1));
    transport.answer(0, json!({"v": 1}));
    transport.answer(1, json!({"v": 1}));

    let mut config = test_config(2);
    config.schedule.query_interval = 5;
    let validator = Arc::new(
        Validator::new(
            config,
            ledger.clone(),
            transport,
            oracle.clone(),
            Arc::new(MemoryStateStore::new()),
        )
        .unwrap(),
    );

    let shutdown = CancellationToken::new();
    let scheduler = tokio::spawn(RoundScheduler::new(validator, shutdown.clone()).run());

    // Height never moves: every task runs once at most, then waits
    tokio::time::sleep(Duration::from_millis(200)).await;
    let calls = oracle.calls();
    assert!(calls <= 1);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(oracle.calls(), calls);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), scheduler)
        .await
        .expect("scheduler did not stop after cancel")
        .unwrap();
}

#[tokio::test]
async fn test_cancel_before_start() {
    init_tracing();
    let ledger = Arc::new(MockLedger::new(peers(1)));
    let validator = Arc::new(
        Validator::new(
            test_config(1),
            ledger.clone(),
            Arc::new(ScriptedPeers::new(1)),
            CountingOracle::new(None),
            Arc::new(MemoryStateStore::new()),
        )
        .unwrap(),
    );

    let shutdown = CancellationToken::new();
    shutdown.cancel();
    tokio::time::timeout(
        Duration::from_secs(2),
        RoundScheduler::new(validator, shutdown).run(),
    )
    .await
    .expect("scheduler ignored an already cancelled token");
    assert_eq!(ledger.attempts(), 0);
}
