//! Durable state across restarts and peer replacement

mod common;

use common::{address, init_tracing, peers, test_config, CountingOracle, MockLedger, ScriptedPeers};
use peerscore_core::{Peer, PeerId};
use peerscore_node::{RewardSource, Validator, ValidatorConfig};
use peerscore_reputation::{MemoryStateStore, RocksDbStateStore};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn start(
    config: ValidatorConfig,
    ledger: Arc<MockLedger>,
    transport: Arc<ScriptedPeers>,
    store: Arc<dyn peerscore_reputation::StateStore>,
) -> Validator {
    let oracle = CountingOracle::new(Some(json!({"v": 1})));
    Validator::new(config, ledger, transport, oracle, store).unwrap()
}

#[tokio::test]
async fn test_restart_resets_replaced_identity() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(ScriptedPeers::new(1));
    for i in 0..3 {
        transport.answer(i, json!({"v": 1}));
    }

    {
        let store = Arc::new(RocksDbStateStore::open(dir.path().join("state")).unwrap());
        let ledger = Arc::new(MockLedger::new(peers(3)));
        let validator = start(test_config(3), ledger, transport.clone(), store);

        validator.sync_round().await.unwrap();
        validator.ping_round(0).await;
        validator.query_round(1).await.unwrap();
        validator.query_round(2).await.unwrap();

        let scores = validator.status().current_scores();
        assert!(scores.iter().all(|s| (*s - 0.19).abs() < 1e-9));
    }

    // Slot 1 is taken over by a new identity while the validator is down
    let mut population = peers(3);
    population[1] = Peer::new(1, "hk-1-new", address(1));

    let store = Arc::new(RocksDbStateStore::open(dir.path().join("state")).unwrap());
    let ledger = Arc::new(MockLedger::new(population));
    let validator = start(test_config(3), ledger, transport, store);

    // Persisted scores are visible before the first sync
    assert_eq!(validator.status().current_scores().len(), 3);

    validator.sync_round().await.unwrap();
    let scores = validator.status().current_scores();
    assert!((scores[0] - 0.19).abs() < 1e-9);
    assert_eq!(scores[1], 0.0);
    assert!((scores[2] - 0.19).abs() < 1e-9);
}

#[tokio::test]
async fn test_population_growth_extends_scores() {
    init_tracing();
    let transport = Arc::new(ScriptedPeers::new(1));
    let ledger = Arc::new(MockLedger::new(peers(2)));
    let validator = start(
        test_config(8),
        ledger.clone(),
        transport.clone(),
        Arc::new(MemoryStateStore::new()),
    );

    validator.sync_round().await.unwrap();
    assert_eq!(validator.status().current_scores(), vec![0.0, 0.0]);

    ledger.set_peers(peers(5));
    let report = validator.sync_round().await.unwrap();
    assert_eq!(report.added, vec![PeerId(2), PeerId(3), PeerId(4)]);
    assert_eq!(validator.status().current_scores(), vec![0.0; 5]);
}

#[tokio::test]
async fn test_replacement_clears_volume_dedup() {
    init_tracing();
    let mut config = test_config(2);
    config.scoring.reward_source = RewardSource::Volume;

    let items = json!([{"id": 1}, {"id": 2}]);
    let transport = Arc::new(ScriptedPeers::new(1));
    transport.answer(0, items.clone());
    transport.answer(1, items.clone());

    let ledger = Arc::new(MockLedger::new(peers(2)));
    let oracle = CountingOracle::new(Some(items.clone()));
    let validator = Validator::new(
        config,
        ledger.clone(),
        transport,
        oracle,
        Arc::new(MemoryStateStore::new()),
    )
    .unwrap();

    validator.sync_round().await.unwrap();
    validator.ping_round(0).await;
    validator.query_round(1).await.unwrap();
    assert_eq!(validator.status().current_volumes()[&PeerId(1)], 2.0);

    let mut population = peers(2);
    population[1] = Peer::new(1, "hk-1-new", address(1));
    ledger.set_peers(population);
    validator.sync_round().await.unwrap();

    let volumes = validator.status().current_volumes();
    assert_eq!(volumes[&PeerId(0)], 2.0);
    assert!(!volumes.contains_key(&PeerId(1)));

    // The newcomer earns credit for items its predecessor already served
    validator.ping_round(1).await;
    validator.query_round(2).await.unwrap();
    let volumes = validator.status().current_volumes();
    assert_eq!(volumes[&PeerId(0)], 2.0);
    assert_eq!(volumes[&PeerId(1)], 2.0);
}
