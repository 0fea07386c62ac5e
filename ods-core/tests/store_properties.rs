#![expect(clippy::expect_used, reason = "tests use expect for readable failures")]

//! Property-based tests for store and matcher invariants.
//!
//! # Invariants tested
//!
//! - **Index consistency:** after any sequence of inserts and removals every
//!   present entity is reachable through every index and no removed entity is.
//! - **Duplicate rejection:** a rejected insert leaves the store unchanged.
//! - **Insertion order:** iteration follows insertion order.
//! - **Matching determinism:** running the matcher twice yields equal outcomes.
//! - **Total classification:** every entity lands in exactly one bucket.

use std::collections::{BTreeMap, BTreeSet};

use geo::BoundingRect;
use ods_core::test_support::{building_store, square_building};
use ods_core::{AttributeValue, EntityKey, EntityStore, IndexKey, Matcher, REFERENCE_INDEX};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Operation {
    Insert { id: i64, reference: Option<i64> },
    Remove { id: i64 },
}

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        (0_i64..20, proptest::option::of(0_i64..5))
            .prop_map(|(id, reference)| Operation::Insert { id, reference }),
        (0_i64..20).prop_map(|id| Operation::Remove { id }),
    ]
}

fn building(id: i64, reference: Option<i64>) -> ods_core::Entity {
    let offset = i32::try_from(id).map(f64::from).expect("small ids");
    square_building(id, offset * 2.0, 0.0, reference)
}

fn store_from(name: &str, references: &[Option<i64>]) -> EntityStore {
    let mut store = building_store(name);
    for (id, reference) in (0_i64..).zip(references) {
        store.insert(building(id, *reference)).expect("unique ids");
    }
    store
}

fn assert_consistent(store: &EntityStore, model: &BTreeMap<i64, (EntityKey, Option<i64>)>) {
    assert_eq!(store.len(), model.len());
    let spatial = store.spatial_index().expect("spatial index");
    assert_eq!(spatial.len(), model.len());
    for (id, (key, reference)) in model {
        assert_eq!(store.get_by_id(&AttributeValue::from(*id)), Some(*key));
        assert!(spatial.contains(*key));
        let index = store.index(REFERENCE_INDEX).expect("reference index");
        assert_eq!(index.contains(*key), reference.is_some());
        if let Some(value) = reference {
            assert!(index.get_by_key(&IndexKey::single(*value)).contains(key));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: indexes track store membership through arbitrary edits.
    #[test]
    fn indexes_follow_membership(operations in prop::collection::vec(operation(), 1..40)) {
        let mut store = building_store("edits");
        let mut model: BTreeMap<i64, (EntityKey, Option<i64>)> = BTreeMap::new();

        for step in operations {
            match step {
                Operation::Insert { id, reference } => {
                    let result = store.insert(building(id, reference));
                    if model.contains_key(&id) {
                        prop_assert!(result.is_err());
                    } else {
                        let key = result.expect("fresh id accepted");
                        model.insert(id, (key, reference));
                    }
                }
                Operation::Remove { id } => {
                    let removed = model
                        .remove(&id)
                        .and_then(|(key, _)| store.remove(key));
                    if let Some(entity) = removed {
                        let area = entity.geometry().bounding_rect().expect("envelope");
                        let found = store.locate_in_envelope(&area).expect("spatial index");
                        prop_assert!(found.iter().all(|key| store.contains(*key)));
                    }
                }
            }
            assert_consistent(&store, &model);
        }

        let keys: Vec<EntityKey> = store.keys().collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        prop_assert_eq!(keys, sorted);
    }

    /// Property: matching static stores is deterministic.
    #[test]
    fn matching_is_idempotent(
        open in prop::collection::vec(proptest::option::of(0_i64..6), 0..12),
        current in prop::collection::vec(proptest::option::of(0_i64..6), 0..12),
    ) {
        let mut open_data = store_from("open data", &open);
        let mut current_store = store_from("current", &current);

        let first = Matcher::new().run(&mut open_data, &mut current_store).expect("match");
        let second = Matcher::new().run(&mut open_data, &mut current_store).expect("match");
        prop_assert_eq!(&first, &second);

        let mut open_seen = BTreeSet::new();
        let mut current_seen = BTreeSet::new();
        for matched in &first.matches {
            prop_assert!(!matched.open_data.is_empty());
            prop_assert!(!matched.current.is_empty());
            for key in &matched.open_data {
                prop_assert!(open_seen.insert(*key));
            }
            for key in &matched.current {
                prop_assert!(current_seen.insert(*key));
            }
        }
        for key in &first.unmatched_open_data {
            prop_assert!(open_seen.insert(*key));
        }
        for key in first.unmatched_current.iter().chain(&first.unidentified_current) {
            prop_assert!(current_seen.insert(*key));
        }
        prop_assert_eq!(open_seen.len(), open_data.len());
        prop_assert_eq!(current_seen.len(), current_store.len());
    }
}
