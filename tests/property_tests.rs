//! Property-based tests for concept-trainer
//!
//! - Retention-model invariants (halving, monotonic countdown)
//! - Sweep and catalog grouping properties
//! - Run with ProptestConfig::with_cases(100)
//! - Must complete in <30 seconds for pre-commit hook

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use concept_trainer::catalog::{group_unlearned, Concept, ConceptFilter, Difficulty};
use concept_trainer::clock::{Clock, ManualClock};
use concept_trainer::config::TrainerConfig;
use concept_trainer::kv::MemoryKvStore;
use concept_trainer::progress::{
    expiry_days_for, ConceptRecord, LearningEngine, ProgressStore, TimeRemaining, DAY_MS,
};
use concept_trainer::sandbox::ExecutionResult;
use proptest::prelude::*;

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

fn epoch() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
}

/// Generate a record learned at the epoch with a valid window
fn arb_record() -> impl Strategy<Value = ConceptRecord> {
    (1u32..=365, any::<bool>()).prop_map(|(days, assisted)| ConceptRecord::new(epoch(), days, assisted))
}

/// Generate a pair of ordered offsets (ms) spanning past the longest window
fn arb_ordered_offsets() -> impl Strategy<Value = (i64, i64)> {
    let max = 366 * DAY_MS;
    (0..max, 1..max).prop_map(move |(a, step)| (a, (a + step).min(max)))
}

fn arb_difficulty() -> impl Strategy<Value = Difficulty> {
    prop_oneof![
        Just(Difficulty::Beginner),
        Just(Difficulty::Intermediate),
        Just(Difficulty::Advanced),
    ]
}

/// Generate a small catalog with unique ids and numbers
fn arb_catalog() -> impl Strategy<Value = Vec<Concept>> {
    proptest::collection::vec((0u8..4, arb_difficulty()), 0..30).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (category, difficulty))| {
                let number = u32::try_from(i).unwrap() + 1;
                serde_json::from_value(serde_json::json!({
                    "id": format!("c{number}"),
                    "number": number,
                    "category": format!("cat{category}"),
                    "difficulty": difficulty,
                    "name": format!("{number}. Concept"),
                    "description": "generated",
                    "instruction": "",
                    "boilerplate": ""
                }))
                .unwrap()
            })
            .collect()
    })
}

fn remaining_ms(remaining: TimeRemaining) -> Option<i64> {
    match remaining {
        TimeRemaining::Remaining(d) => Some(d.num_milliseconds()),
        TimeRemaining::Expired => None,
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ========================================================================
    // Retention rule
    // ========================================================================

    /// Property: assisted window is half the default, floored, never zero
    #[test]
    fn prop_assisted_window_is_halved_and_positive(default in 1u32..=365) {
        let assisted = expiry_days_for(default, true);
        prop_assert!(assisted >= 1);
        prop_assert!(assisted <= default);
        prop_assert_eq!(assisted, (default / 2).max(1));
        prop_assert_eq!(expiry_days_for(default, false), default);
    }

    /// Property: time remaining strictly decreases until expiry
    #[test]
    fn prop_time_remaining_monotonic(record in arb_record(), (t1, t2) in arb_ordered_offsets()) {
        prop_assume!(t1 < t2);
        let r1 = remaining_ms(record.time_remaining(epoch() + Duration::milliseconds(t1)));
        let r2 = remaining_ms(record.time_remaining(epoch() + Duration::milliseconds(t2)));

        match (r1, r2) {
            (Some(a), Some(b)) => prop_assert!(b < a),
            (None, Some(_)) => prop_assert!(false, "expired record became live again"),
            _ => {}
        }
    }

    /// Property: expired exactly at expires_at, never before
    #[test]
    fn prop_expired_iff_past_expires_at(record in arb_record(), offset in 0i64..(366 * DAY_MS)) {
        let now = epoch() + Duration::milliseconds(offset);
        let window = i64::from(record.expiry_days()) * DAY_MS;

        prop_assert_eq!(record.is_expired(now), offset >= window);
        prop_assert_eq!(record.time_remaining(now).is_expired(), offset >= window);
    }

    /// Property: JSON form keeps every field
    #[test]
    fn prop_record_json_preserves_fields(record in arb_record()) {
        let json = serde_json::to_value(record).unwrap();
        prop_assert_eq!(json["expiryDays"].as_u64(), Some(u64::from(record.expiry_days())));
        prop_assert_eq!(json["assisted"].as_bool(), Some(record.assisted()));
        prop_assert_eq!(json["learnedAt"].as_i64(), Some(epoch().timestamp_millis()));
    }

    // ========================================================================
    // Sweep
    // ========================================================================

    /// Property: after a sweep, no expired record remains and a second
    /// sweep changes nothing
    #[test]
    fn prop_sweep_leaves_only_live_records(
        windows in proptest::collection::vec(1u32..=30, 1..20),
        elapsed_days in 0i64..40,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let clock = ManualClock::new(epoch());
            let store = ProgressStore::new(MemoryKvStore::new());
            for (i, days) in windows.iter().enumerate() {
                store
                    .save_record(&format!("c{i}"), &ConceptRecord::new(epoch(), *days, false))
                    .await
                    .unwrap();
            }
            let engine = LearningEngine::with_clock(store, clock.clone(), &TrainerConfig::default());

            clock.advance(Duration::days(elapsed_days));
            let evicted = engine.sweep_expired_ids().await.unwrap();

            let expected = windows.iter().filter(|d| i64::from(**d) <= elapsed_days).count();
            assert_eq!(evicted.len(), expected);
            for (_, record) in engine.learned().await.unwrap() {
                assert!(!record.is_expired(clock.now()));
            }
            assert!(!engine.sweep_expired().await.unwrap());
        });
    }

    /// Property: failures never create records
    #[test]
    fn prop_failures_never_learn(error in "[a-z]{1,20}", output in ".{0,20}", assisted in any::<bool>()) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let engine = LearningEngine::new(ProgressStore::new(MemoryKvStore::new()));
            let failure = ExecutionResult::Failure { error, output };

            let record = engine.record_attempt("c", &failure, "code", assisted).await.unwrap();

            assert!(record.is_none());
            assert!(engine.store().record("c").await.unwrap().is_none());
            assert!(engine.store().solution("c").await.unwrap().is_none());
        });
    }

    // ========================================================================
    // Catalog grouping
    // ========================================================================

    /// Property: grouping never shows learned or filtered-out concepts and
    /// keeps every other one exactly once
    #[test]
    fn prop_group_unlearned_partitions(catalog in arb_catalog(), learned_mask in any::<u32>()) {
        let learned: HashSet<String> = catalog
            .iter()
            .filter(|c| learned_mask & (1 << (c.number % 32)) != 0)
            .map(|c| c.id.clone())
            .collect();
        let filter = ConceptFilter::default();

        let groups = group_unlearned(&catalog, &filter, &learned);

        let shown: Vec<&Concept> = groups.iter().flat_map(|g| &g.concepts).collect();
        let expected = catalog
            .iter()
            .filter(|c| !learned.contains(&c.id) && filter.matches(c))
            .count();
        prop_assert_eq!(shown.len(), expected);
        for group in &groups {
            prop_assert!(!group.concepts.is_empty());
            prop_assert!(group.concepts.windows(2).all(|w| w[0].number < w[1].number));
            prop_assert!(group.concepts.iter().all(|c| c.category == group.category));
        }
        let firsts: Vec<u32> = groups.iter().map(|g| g.concepts[0].number).collect();
        prop_assert!(firsts.windows(2).all(|w| w[0] < w[1]));
    }
}
