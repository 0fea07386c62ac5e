#![expect(
    clippy::expect_used,
    reason = "behaviour tests use expect for readable failures"
)]

//! Behavioural tests for index maintenance in the entity store.

use std::cell::RefCell;
use std::collections::BTreeMap;

use geo::BoundingRect;
use ods_core::test_support::{building_store, square_building};
use ods_core::{
    AttributeValue, EntityKey, EntityStore, IndexKey, PRIMARY_INDEX, REFERENCE_INDEX, StoreError,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

/// World state for entity store scenarios.
struct StoreWorld {
    store: RefCell<EntityStore>,
    keys: RefCell<BTreeMap<i64, EntityKey>>,
    insert_result: RefCell<Option<Result<EntityKey, StoreError>>>,
}

#[fixture]
fn world() -> StoreWorld {
    StoreWorld {
        store: RefCell::new(building_store("buildings")),
        keys: RefCell::new(BTreeMap::new()),
        insert_result: RefCell::new(None),
    }
}

fn key_of(world: &StoreWorld, id: i64) -> EntityKey {
    *world.keys.borrow().get(&id).expect("building inserted")
}

#[given("a building store holding building 1 with reference 100")]
fn given_store(world: &StoreWorld) {
    let key = world
        .store
        .borrow_mut()
        .insert(square_building(1, 0.0, 0.0, Some(100)))
        .expect("first insert succeeds");
    world.keys.borrow_mut().insert(1, key);
}

#[given("building 2 next to building 1 with reference 100")]
fn given_neighbour(world: &StoreWorld) {
    let mut store = world.store.borrow_mut();
    let key = store
        .insert(square_building(2, 1.0, 0.0, Some(100)))
        .expect("second insert succeeds");
    store
        .add_neighbours(key_of(world, 1), key)
        .expect("both buildings present");
    world.keys.borrow_mut().insert(2, key);
}

#[when("I insert another building with id 1 and reference 200")]
fn when_insert_duplicate(world: &StoreWorld) {
    let result = world
        .store
        .borrow_mut()
        .insert(square_building(1, 5.0, 5.0, Some(200)));
    world.insert_result.replace(Some(result));
}

#[when("I remove building 2")]
fn when_remove(world: &StoreWorld) {
    let removed = world.store.borrow_mut().remove(key_of(world, 2));
    assert!(removed.is_some(), "building 2 should have been present");
}

#[then("the insert fails with a duplicate key in the id index")]
fn then_duplicate(world: &StoreWorld) {
    let result = world.insert_result.borrow();
    let err = result
        .as_ref()
        .expect("insert attempted")
        .as_ref()
        .expect_err("duplicate id rejected");
    assert!(
        matches!(err, StoreError::DuplicateKey { index, .. } if index == PRIMARY_INDEX),
        "unexpected error: {err}"
    );
}

#[then("the store holds exactly one building")]
fn then_single_building(world: &StoreWorld) {
    assert_eq!(world.store.borrow().len(), 1);
}

#[then("no building is filed under reference 200")]
fn then_reference_absent(world: &StoreWorld) {
    let store = world.store.borrow();
    let filed = store
        .get_by_key(REFERENCE_INDEX, &IndexKey::single(200_i64))
        .expect("reference index registered");
    assert!(filed.is_empty());
    let spatial = store.spatial_index().expect("spatial index registered");
    assert_eq!(spatial.len(), 1);
}

#[then("building 2 cannot be found by id")]
fn then_missing_by_id(world: &StoreWorld) {
    assert_eq!(
        world.store.borrow().get_by_id(&AttributeValue::from(2_i64)),
        None
    );
}

#[then("only building 1 is filed under reference 100")]
fn then_reference_holds_first(world: &StoreWorld) {
    let store = world.store.borrow();
    let filed = store
        .get_by_key(REFERENCE_INDEX, &IndexKey::single(100_i64))
        .expect("reference index registered");
    assert_eq!(filed, &[key_of(world, 1)]);
}

#[then("the spatial index no longer returns building 2")]
fn then_spatial_forgets(world: &StoreWorld) {
    let store = world.store.borrow();
    let area = square_building(2, 1.0, 0.0, None)
        .geometry()
        .bounding_rect()
        .expect("square has an envelope");
    let found = store.locate_in_envelope(&area).expect("spatial index");
    assert!(!found.contains(&key_of(world, 2)));
}

#[then("building 1 has no neighbours")]
fn then_no_neighbours(world: &StoreWorld) {
    let store = world.store.borrow();
    let building = store.get(key_of(world, 1)).expect("building 1 present");
    assert!(building.neighbours().is_empty());
}

#[scenario(path = "tests/features/entity_store.feature", index = 0)]
fn duplicate_insert_rejected(world: StoreWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/entity_store.feature", index = 1)]
fn removal_clears_indexes(world: StoreWorld) {
    let _ = world;
}
