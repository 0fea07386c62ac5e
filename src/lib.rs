//! Facade crate for the open-data reconciliation engine.
//!
//! This crate re-exports the entity store, matcher and aligner, and exposes
//! the download pipeline behind the `download` feature.

#![forbid(unsafe_code)]

pub use ods_core::{
    ADDRESS_INDEX, AlignError, AlignReport, AttributeValue, BuildingAligner, Entity,
    EntityAttributes, EntityKey, EntityKind, EntityStore, EntityStoreBuilder, IndexKey, Match,
    MatchError, MatchId, MatchOutcome, Matcher, PRIMARY_INDEX, REFERENCE_INDEX, StoreError,
    Uniqueness,
};

#[cfg(feature = "download")]
pub use ods_data::{
    CancelFlag, CoordinateTransform, DataSource, DownloadJob, DownloadPipeline, FeatureSource,
    GroupBy, Host, PipelineError, PipelineState, Status, run_concurrently,
};
