#![expect(
    clippy::expect_used,
    reason = "behaviour tests use expect for readable failures"
)]

//! Behavioural tests for single download runs.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use geo::{BoundingRect, Polygon, polygon};
use ods_core::test_support::building_store;
use ods_core::{AttributeValue, EntityStore};
use ods_data::test_support::{OffsetTransform, VecFeatureSource, building_row};
use ods_data::{
    AttributeFilter, CancelFlag, DataSource, DownloadPipeline, Host, PipelineError, PipelineState,
    PropertyValue, Status,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

/// World state for download scenarios.
#[derive(Default)]
struct DownloadWorld {
    max_features: Cell<Option<usize>>,
    buildings: Cell<i64>,
    cancel_after: Cell<Option<usize>>,
    fail_after: Cell<Option<usize>>,
    fail_initialise: Cell<bool>,
    repeat_features: Cell<bool>,
    excluded_reference: Cell<Option<i64>>,
    offset: Cell<Option<f64>>,
    fail_projection: Cell<bool>,
    cancel_on_projection: Cell<Option<usize>>,
    store: RefCell<Option<EntityStore>>,
    status: RefCell<Option<Status>>,
}

#[fixture]
fn world() -> DownloadWorld {
    DownloadWorld::default()
}

fn boundary() -> Polygon<f64> {
    polygon![(x: -10.0, y: -10.0), (x: 1000.0, y: -10.0), (x: 1000.0, y: 10.0), (x: -10.0, y: 10.0)]
}

fn with_status<T>(world: &DownloadWorld, check: impl FnOnce(&Status) -> T) -> T {
    let status = world.status.borrow();
    check(status.as_ref().expect("download ran"))
}

fn stored(world: &DownloadWorld) -> usize {
    world.store.borrow().as_ref().map_or(0, EntityStore::len)
}

#[given("a host limited to {count} features")]
fn given_host_limit(world: &DownloadWorld, count: usize) {
    world.max_features.set(Some(count));
}

#[given("a source with {count} buildings")]
fn given_buildings(world: &DownloadWorld, count: i64) {
    world.buildings.set(count);
}

#[given("the source requests cancellation after {count} features")]
fn given_cancel_after(world: &DownloadWorld, count: usize) {
    world.cancel_after.set(Some(count));
}

#[given("the source stream breaks after {count} features")]
fn given_fail_after(world: &DownloadWorld, count: usize) {
    world.fail_after.set(Some(count));
}

#[given("the source cannot be initialised")]
fn given_unavailable(world: &DownloadWorld) {
    world.fail_initialise.set(true);
}

#[given("the source repeats every feature")]
fn given_repeated_features(world: &DownloadWorld) {
    world.repeat_features.set(true);
}

#[given("the data source excludes reference {reference}")]
fn given_excluded_reference(world: &DownloadWorld, reference: i64) {
    world.excluded_reference.set(Some(reference));
}

#[given("the source is offset by {offset} units")]
fn given_offset(world: &DownloadWorld, offset: f64) {
    world.offset.set(Some(offset));
}

#[given("projection into the project system fails")]
fn given_failing_projection(world: &DownloadWorld) {
    world.fail_projection.set(true);
}

#[given("cancellation is requested on projection {call}")]
fn given_cancel_on_projection(world: &DownloadWorld, call: usize) {
    world.cancel_on_projection.set(Some(call));
}

fn data_source(world: &DownloadWorld) -> DataSource {
    let host = Host {
        name: "bag".into(),
        url: "memory".into(),
        max_features: world.max_features.get(),
    };
    let data_source = DataSource::new("bag:pand", host);
    match world.excluded_reference.get() {
        Some(reference) => data_source.with_filter(AttributeFilter::Not {
            filter: Box::new(AttributeFilter::Equals {
                attribute: "identificatie".into(),
                value: PropertyValue::Integer(reference),
            }),
        }),
        None => data_source,
    }
}

fn transform(world: &DownloadWorld, cancel: &CancelFlag) -> OffsetTransform {
    let mut transform = OffsetTransform::new(world.offset.get().unwrap_or_default(), 0.0);
    if world.fail_projection.get() {
        transform = transform.failing();
    }
    if let Some(call) = world.cancel_on_projection.get() {
        transform = transform.cancelling_on(call, cancel.clone());
    }
    transform
}

#[when("the download runs")]
fn when_download_runs(world: &DownloadWorld) {
    let cancel = CancelFlag::new();
    let mut features = building_row(world.buildings.get());
    if world.repeat_features.get() {
        let repeated = features.clone();
        features.extend(repeated);
    }
    let mut source = VecFeatureSource::new("bag:pand", features);
    if let Some(count) = world.cancel_after.get() {
        source = source.cancelling_after(count, cancel.clone());
    }
    if let Some(count) = world.fail_after.get() {
        source = source.failing_after(count);
    }
    if world.fail_initialise.get() {
        source = source.failing_initialise();
    }
    let mut pipeline = DownloadPipeline::new(data_source(world), Box::new(source))
        .with_transform(Arc::new(transform(world, &cancel)))
        .with_cancel_flag(cancel);
    let mut store = building_store("open data");
    let status = pipeline.run(&boundary(), &mut store, None);
    assert_eq!(pipeline.state(), status.state());
    world.store.replace(Some(store));
    world.status.replace(Some(status));
}

#[then("the download is cancelled")]
fn then_cancelled(world: &DownloadWorld) {
    with_status(world, |status| {
        assert_eq!(status.state(), PipelineState::Cancelled);
        assert!(status.cancelled());
        assert!(!status.succeeded());
    });
}

#[then("the download succeeds")]
fn then_succeeds(world: &DownloadWorld) {
    with_status(world, |status| {
        assert!(status.succeeded(), "{status:?}");
        assert!(!status.cancelled());
        assert!(status.exception().is_none());
    });
}

#[then("the download fails with a source error")]
fn then_fails(world: &DownloadWorld) {
    with_status(world, |status| {
        assert_eq!(status.state(), PipelineState::Failed);
        assert!(matches!(status.exception(), Some(PipelineError::Source(_))));
    });
}

#[then("the download fails with a transform error")]
fn then_fails_transform(world: &DownloadWorld) {
    with_status(world, |status| {
        assert_eq!(status.state(), PipelineState::Failed);
        assert!(matches!(status.exception(), Some(PipelineError::Crs(_))));
    });
}

#[then("the download fetched {count} features")]
fn then_fetched(world: &DownloadWorld, count: usize) {
    with_status(world, |status| assert_eq!(status.feature_count(), count));
}

#[then("building {id} is not stored")]
fn then_not_stored(world: &DownloadWorld, id: i64) {
    let store = world.store.borrow();
    let store = store.as_ref().expect("download ran");
    assert_eq!(store.get_by_id(&AttributeValue::Integer(id)), None);
}

#[then("building {id} starts at x {x}")]
fn then_starts_at(world: &DownloadWorld, id: i64, x: f64) {
    let store = world.store.borrow();
    let store = store.as_ref().expect("download ran");
    let key = store
        .get_by_id(&AttributeValue::Integer(id))
        .expect("building stored");
    let rect = store
        .get(key)
        .and_then(|entity| entity.geometry().bounding_rect())
        .expect("building has an extent");
    assert_eq!(rect.min().x, x);
}

#[then("the message asks for a smaller download area")]
fn then_truncation_message(world: &DownloadWorld) {
    with_status(world, |status| {
        assert_eq!(
            status.message(),
            Some("Too many bag:pand objects. Please choose a smaller download area.")
        );
    });
}

#[then("the message reports an empty download area")]
fn then_empty_message(world: &DownloadWorld) {
    with_status(world, |status| {
        assert_eq!(
            status.message(),
            Some("The selected download area contains no bag:pand objects.")
        );
    });
}

#[then("no message is reported")]
fn then_no_message(world: &DownloadWorld) {
    with_status(world, |status| assert_eq!(status.message(), None));
}

#[then("the store is empty")]
fn then_store_empty(world: &DownloadWorld) {
    assert_eq!(stored(world), 0);
}

#[then("the store holds {count} entities")]
fn then_store_holds(world: &DownloadWorld, count: usize) {
    assert_eq!(stored(world), count);
    with_status(world, |status| assert_eq!(status.entity_count(), count));
}

#[scenario(path = "tests/features/download_pipeline.feature", index = 0)]
fn ceiling_cancels(world: DownloadWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/download_pipeline.feature", index = 1)]
fn below_ceiling_completes(world: DownloadWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/download_pipeline.feature", index = 2)]
fn cancellation_during_fetch(world: DownloadWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/download_pipeline.feature", index = 3)]
fn empty_required_source(world: DownloadWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/download_pipeline.feature", index = 4)]
fn unavailable_source(world: DownloadWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/download_pipeline.feature", index = 5)]
fn broken_stream(world: DownloadWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/download_pipeline.feature", index = 6)]
fn attribute_filter(world: DownloadWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/download_pipeline.feature", index = 7)]
fn offset_transform(world: DownloadWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/download_pipeline.feature", index = 8)]
fn failing_transform(world: DownloadWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/download_pipeline.feature", index = 9)]
fn cancellation_during_processing(world: DownloadWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/download_pipeline.feature", index = 10)]
fn repeated_feature_ids(world: DownloadWorld) {
    let _ = world;
}
