//! Property tests for the trust estimator: bounds and monotonicity hold for
//! arbitrary update sequences, configs and learning rates.

use coordination::trust::{
    InMemoryTrustStore, JsonTrustStore, LearningRate, TrustConfig, TrustStore,
};
use proptest::prelude::*;

fn learning_rate() -> impl Strategy<Value = LearningRate> {
    prop_oneof![
        Just(LearningRate::Decaying),
        (0.01f64..=1.0).prop_map(LearningRate::Fixed),
    ]
}

fn config() -> impl Strategy<Value = TrustConfig> {
    (0.0f64..0.5, 0.5f64..=1.0, 0.0f64..=1.0, learning_rate()).prop_map(
        |(floor, ceiling, t, learning_rate)| TrustConfig {
            default_score: floor + t * (ceiling - floor),
            floor,
            ceiling,
            learning_rate,
        },
    )
}

proptest! {
    #[test]
    fn prop_score_stays_in_bounds(
        config in config(),
        outcomes in prop::collection::vec(any::<bool>(), 0..60),
    ) {
        let store = InMemoryTrustStore::with_config(config).unwrap();
        for was_correct in outcomes {
            let score = store.update("agent", was_correct).unwrap();
            prop_assert!(score >= config.floor && score <= config.ceiling, "score {score} escaped bounds");
            prop_assert_eq!(score, store.get("agent"));
        }
    }

    #[test]
    fn prop_update_moves_in_outcome_direction(
        config in config(),
        history in prop::collection::vec(any::<bool>(), 0..30),
        was_correct in any::<bool>(),
    ) {
        let store = InMemoryTrustStore::with_config(config).unwrap();
        for outcome in history {
            store.update("agent", outcome).unwrap();
        }

        let before = store.get("agent");
        let after = store.update("agent", was_correct).unwrap();
        let margin = 1e-9;
        if was_correct {
            prop_assert!(after >= before);
            if before < config.ceiling - margin {
                prop_assert!(after > before, "true update did not raise {before}");
            }
        } else {
            prop_assert!(after <= before);
            if before > config.floor + margin {
                prop_assert!(after < before, "false update did not lower {before}");
            }
        }
    }

    #[test]
    fn prop_unknown_agent_reads_default(config in config(), name in "[a-z]{1,12}") {
        let store = InMemoryTrustStore::with_config(config).unwrap();
        prop_assert_eq!(store.get(&name), config.default_score);
    }
}

#[test]
fn test_counts_track_observations() {
    let store = InMemoryTrustStore::new();
    for outcome in [true, false, true, true] {
        store.update("critic", outcome).unwrap();
    }
    let stats = store.stats("critic").unwrap();
    assert_eq!(stats.total_count, 4);
    assert_eq!(stats.correct_count, 3);
    assert!((stats.accuracy - 75.0).abs() < 1e-9);
}

#[test]
fn test_json_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trust.json");

    let raised = {
        let store = JsonTrustStore::open(&path).unwrap();
        store.update("pragmatist", true).unwrap()
    };

    let reopened = JsonTrustStore::open(&path).unwrap();
    assert_eq!(reopened.get("pragmatist"), raised);
    assert_eq!(reopened.stats("pragmatist").unwrap().total_count, 1);
    // Seeded agents are present even though only one was updated.
    assert_eq!(reopened.all().len(), 3);
}
