//! Download pipeline: prepare, fetch and process one data source.
//!
//! A run drains a [`FeatureSource`] for the download boundary and inserts the
//! mapped entities into a target [`EntityStore`], optionally aligning each new
//! building with its neighbours. Failures are reported through [`Status`]
//! rather than returned, so a failed run never leaves the caller without a
//! status to show.

use std::sync::Arc;

use geo::{Contains, Geometry, Polygon};
use log::{debug, error, info, warn};
use ods_core::{BuildingAligner, EntityStore};

use crate::group::FeatureCollector;
use crate::{
    CoordinateTransform, DataSource, FeatureQuery, FeatureSource, IdentityTransform, RawFeature,
    SourceInfo,
};

mod cancel;
mod concurrent;
mod status;

pub use cancel::CancelFlag;
pub use concurrent::{DownloadJob, run_concurrently};
pub use status::{PipelineError, PipelineState, Status};

/// Downloads one data source into an entity store.
///
/// # Examples
/// ```
/// use geo::polygon;
/// use ods_core::EntityStore;
/// use ods_data::{DataSource, DownloadPipeline, Host, JsonFeatureSource, PipelineState};
///
/// let host = Host { name: "local".into(), url: "missing.json".into(), max_features: None };
/// let source = JsonFeatureSource::new("missing.json");
/// let mut pipeline = DownloadPipeline::new(DataSource::new("bag:pand", host), Box::new(source));
/// let boundary = polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)];
/// let mut store = EntityStore::builder("open data").with_spatial_index().build();
///
/// let status = pipeline.run(&boundary, &mut store, None);
/// assert_eq!(status.state(), PipelineState::Failed);
/// assert!(status.exception().is_some());
/// assert!(store.is_empty());
/// ```
pub struct DownloadPipeline {
    data_source: DataSource,
    source: Box<dyn FeatureSource>,
    transform: Arc<dyn CoordinateTransform>,
    cancel: CancelFlag,
    state: PipelineState,
}

impl std::fmt::Debug for DownloadPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadPipeline")
            .field("feature_type", &self.data_source.feature_type)
            .field("state", &self.state)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Features accepted by the fetch stage.
struct Fetched {
    /// Distinct features accepted, counted before grouping.
    accepted: usize,
    /// Features to process, grouped when the data source asks for it.
    features: Vec<RawFeature>,
}

/// How a cancellable stage ended.
enum Stage<T> {
    Complete(T),
    Cancelled,
}

impl DownloadPipeline {
    /// Pipeline whose source already delivers project coordinates.
    #[must_use]
    pub fn new(data_source: DataSource, source: Box<dyn FeatureSource>) -> Self {
        Self {
            data_source,
            source,
            transform: Arc::new(IdentityTransform),
            cancel: CancelFlag::new(),
            state: PipelineState::Idle,
        }
    }

    /// Use `transform` between the project and source coordinate systems.
    #[must_use]
    pub fn with_transform(mut self, transform: Arc<dyn CoordinateTransform>) -> Self {
        self.transform = transform;
        self
    }

    /// Observe `cancel` instead of a private flag.
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Configured data source.
    #[must_use]
    pub const fn data_source(&self) -> &DataSource {
        &self.data_source
    }

    /// State of the current or last run.
    #[must_use]
    pub const fn state(&self) -> PipelineState {
        self.state
    }

    /// Handle that cancels this pipeline from another thread.
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Request cancellation; observed at the next feature boundary.
    ///
    /// Every run clears the flag as it starts, so a request only affects the
    /// run in progress.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Download features inside `boundary` into `store`.
    ///
    /// `boundary` is in project coordinates. Entities whose geometry leaves
    /// the boundary are marked incomplete. When `aligner` is given it runs
    /// after every insert.
    pub fn run(
        &mut self,
        boundary: &Polygon<f64>,
        store: &mut EntityStore,
        aligner: Option<&BuildingAligner>,
    ) -> Status {
        let mut status = Status::default();
        self.enter(PipelineState::Preparing);
        self.cancel.reset();
        let (info, query) = match self.prepare(boundary) {
            Ok(prepared) => prepared,
            Err(err) => return self.fail(status, err),
        };

        self.enter(PipelineState::Fetching);
        let Fetched { accepted, features } = match self.fetch(&query) {
            Ok(Stage::Complete(fetched)) => fetched,
            Ok(Stage::Cancelled) => return self.cancelled(status),
            Err(err) => return self.fail(status, err),
        };
        status.feature_count = accepted;

        let feature_type = self.data_source.feature_type.clone();
        if features.is_empty() {
            if self.data_source.required {
                status.message = Some(format!(
                    "The selected download area contains no {feature_type} objects."
                ));
            }
            info!("{feature_type} download found no features");
            self.enter(PipelineState::Succeeded);
            status.state = PipelineState::Succeeded;
            return status;
        }
        if self
            .data_source
            .host
            .max_features
            .is_some_and(|max| accepted >= max)
        {
            warn!("{feature_type} download reached the ceiling of {accepted} features");
            status.message = Some(format!(
                "Too many {feature_type} objects. Please choose a smaller download area."
            ));
            return self.cancelled(status);
        }

        self.enter(PipelineState::Processing);
        match self.process(features, &info, boundary, store, aligner, &mut status) {
            Ok(Stage::Complete(())) => {
                self.enter(PipelineState::Succeeded);
                status.state = PipelineState::Succeeded;
                status
            }
            Ok(Stage::Cancelled) => self.cancelled(status),
            Err(err) => self.fail(status, err),
        }
    }

    fn enter(&mut self, state: PipelineState) {
        info!("{} download: {} -> {state}", self.data_source.feature_type, self.state);
        self.state = state;
    }

    fn fail(&mut self, mut status: Status, err: PipelineError) -> Status {
        error!("{} download failed: {err}", self.data_source.feature_type);
        self.enter(PipelineState::Failed);
        status.state = PipelineState::Failed;
        status.exception = Some(err);
        status
    }

    fn cancelled(&mut self, mut status: Status) -> Status {
        self.enter(PipelineState::Cancelled);
        status.state = PipelineState::Cancelled;
        status.cancelled = true;
        status
    }

    fn prepare(&mut self, boundary: &Polygon<f64>) -> Result<(SourceInfo, FeatureQuery), PipelineError> {
        let info = self.source.initialise(&self.data_source.feature_type)?;
        let area = self
            .transform
            .to_source(&Geometry::Polygon(boundary.clone()), &info.crs)?;
        debug!(
            "{} source uses {} with id attribute {}",
            self.data_source.feature_type, info.crs, info.id_attribute
        );
        let query = FeatureQuery {
            area,
            filter: self.data_source.filter.clone(),
            properties: self.data_source.properties.clone(),
            group_by: self.data_source.group_by.clone(),
        };
        Ok((info, query))
    }

    fn fetch(&mut self, query: &FeatureQuery) -> Result<Stage<Fetched>, PipelineError> {
        let feature_type = &self.data_source.feature_type;
        let normalisation = self.data_source.normalisation;
        let mut collector = FeatureCollector::new(query.group_by.clone());
        for candidate in self.source.features(query)? {
            let feature = candidate?;
            if feature.geometry.is_none() {
                warn!("skipping {feature_type} feature {} without geometry", feature.id);
            } else if query.accepts(&feature) {
                collector.push(normalisation.apply(feature));
            }
            if self.cancel.is_cancelled() {
                info!(
                    "{feature_type} download cancelled after {} features",
                    collector.accepted()
                );
                return Ok(Stage::Cancelled);
            }
        }
        Ok(Stage::Complete(Fetched {
            accepted: collector.accepted(),
            features: collector.into_features(),
        }))
    }

    fn process(
        &self,
        features: Vec<RawFeature>,
        info: &SourceInfo,
        boundary: &Polygon<f64>,
        store: &mut EntityStore,
        aligner: Option<&BuildingAligner>,
        status: &mut Status,
    ) -> Result<Stage<()>, PipelineError> {
        let feature_type = &self.data_source.feature_type;
        for mut feature in features {
            if self.cancel.is_cancelled() {
                info!(
                    "{feature_type} download cancelled after {} entities",
                    status.entity_count
                );
                return Ok(Stage::Cancelled);
            }
            if let Some(geometry) = feature.geometry.take() {
                feature.geometry = Some(self.transform.to_project(geometry, &info.crs)?);
            }
            let feature_id = feature.id.clone();
            let mapped = match self.data_source.mapper.map(feature, &info.id_attribute) {
                Ok(mapped) => mapped,
                Err(err) => {
                    warn!("skipping {feature_type} feature {feature_id}: {err}");
                    continue;
                }
            };
            let incomplete = !boundary.contains(mapped.geometry());
            let entity = mapped.with_incomplete(incomplete);
            let (key, replaced) = store.supersede(entity)?;
            if replaced.is_some() {
                debug!("{feature_type} feature {feature_id} superseded a stored entity");
            }
            status.entity_count += 1;
            if let Some(aligner) = aligner {
                let report = aligner.on_entity_added(store, key)?;
                if !report.repaired.is_empty() {
                    debug!(
                        "aligned entity {key} with {} neighbours",
                        report.repaired.len()
                    );
                }
            }
        }
        Ok(Stage::Complete(()))
    }
}
