//! Reputation store and weight processing integration tests

use peerscore_core::PeerId;
use peerscore_reputation::{
    process_weights, ReputationConfig, ReputationStore, RocksDbStateStore, StateStore,
    VolumeConfig, VolumeLedger, WeightConstraints,
};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

fn identities(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_restart_resets_changed_identity() {
    let dir = TempDir::new().unwrap();

    {
        let backing: Arc<dyn StateStore> = Arc::new(RocksDbStateStore::open(dir.path()).unwrap());
        let (store, _) = ReputationStore::open(
            ReputationConfig::default(),
            backing,
            &identities(&["a", "b", "c"]),
        )
        .unwrap();
        let rewards: HashMap<PeerId, f64> = (0..3).map(|i| (PeerId(i), 1.0)).collect();
        for _ in 0..5 {
            store.update(&rewards).unwrap();
        }
    }

    let backing: Arc<dyn StateStore> = Arc::new(RocksDbStateStore::open(dir.path()).unwrap());
    let (store, replaced) = ReputationStore::open(
        ReputationConfig::default(),
        backing,
        &identities(&["a", "b2", "c", "d"]),
    )
    .unwrap();

    assert_eq!(replaced, vec![PeerId(1)]);
    let expected = 1.0 - 0.9f64.powi(5);
    assert!((store.score_of(PeerId(0)) - expected).abs() < 1e-12);
    assert_eq!(store.score_of(PeerId(1)), 0.0);
    assert!((store.score_of(PeerId(2)) - expected).abs() < 1e-12);
    assert_eq!(store.score_of(PeerId(3)), 0.0);
    assert_eq!(store.len(), 4);
}

#[test]
fn test_volume_ledger_survives_restart() {
    let dir = TempDir::new().unwrap();
    let config = VolumeConfig::default();

    {
        let backing = RocksDbStateStore::open(dir.path()).unwrap();
        let ledger = VolumeLedger::new(config.clone());
        ledger.record(100, PeerId(1), &["x".to_string(), "y".to_string()]);
        backing.save_volumes(&ledger.state()).unwrap();
    }

    let backing = RocksDbStateStore::open(dir.path()).unwrap();
    let ledger = VolumeLedger::from_state(config, backing.load_volumes().unwrap().unwrap());
    assert_eq!(ledger.totals()[&PeerId(1)], 2.0);
    // Dedup state was persisted as well
    assert_eq!(ledger.record(120, PeerId(1), &["x".to_string()]), 0);
}

#[test]
fn test_uniform_fallback_over_known_ids() {
    let ids: Vec<PeerId> = (0..4).map(PeerId).collect();
    let scores = [0.0, 0.5, 0.5, 0.5];
    let constraints = WeightConstraints {
        min_allowed_non_zero: 5,
        max_weight_limit: 0.1,
        exclusion_quantile: 0.0,
    };

    let set = process_weights(&ids, &scores, &constraints);
    assert_eq!(set.ids, ids);
    assert!(set.weights.iter().all(|w| (*w - 0.25).abs() < 1e-12));
}

fn limit_strategy() -> impl Strategy<Value = f64> {
    // Ledgers store the cap as a u16 fraction
    prop_oneof![0.05f64..=1.0, Just(6553.0 / 65535.0), (3277u16..=65535).prop_map(|v| v as f64 / 65535.0)]
}

fn score_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(0.0),
        0.0f64..1.0,
        -1.0f64..0.0,
        // Spread over nine orders of magnitude
        (0.0f64..9.0).prop_map(|e| 10f64.powf(-e)),
    ]
}

fn constraints_strategy() -> impl Strategy<Value = WeightConstraints> {
    (limit_strategy(), 0usize..6, 0.0f64..=1.0).prop_map(|(limit, extra, q)| WeightConstraints {
        // Keep the cap feasible whenever enough peers survive
        min_allowed_non_zero: (1.0 / limit).floor() as usize + 1 + extra,
        max_weight_limit: limit,
        exclusion_quantile: q,
    })
}

proptest! {
    #[test]
    fn prop_weights_sum_to_one_and_respect_cap(
        scores in prop::collection::vec(score_strategy(), 1..80),
        constraints in constraints_strategy(),
    ) {
        let ids: Vec<PeerId> = (0..scores.len() as u32).map(PeerId).collect();
        let set = process_weights(&ids, &scores, &constraints);

        prop_assert_eq!(set.ids.len(), set.weights.len());
        prop_assert!(set.weights.iter().all(|w| *w >= 0.0));
        prop_assert!((set.total() - 1.0).abs() <= 1e-6);

        let positive = scores.iter().filter(|s| **s > 0.0).count();
        let uniform_fallback = positive == 0 || ids.len() < constraints.min_allowed_non_zero;
        if uniform_fallback {
            let expected = 1.0 / ids.len() as f64;
            prop_assert!(set.weights.iter().all(|w| (*w - expected).abs() < 1e-12));
        } else {
            prop_assert!(set.max_weight() <= constraints.max_weight_limit + 1e-6);
        }
    }

    #[test]
    fn prop_all_zero_scores_are_uniform(n in 1usize..64, min in 1usize..10) {
        let ids: Vec<PeerId> = (0..n as u32).map(PeerId).collect();
        let constraints = WeightConstraints {
            min_allowed_non_zero: min,
            max_weight_limit: 0.5,
            exclusion_quantile: 0.1,
        };
        let set = process_weights(&ids, &vec![0.0; n], &constraints);
        prop_assert_eq!(set.len(), n);
        prop_assert!(set.weights.iter().all(|w| (*w - 1.0 / n as f64).abs() < 1e-12));
    }
}
