//! Download pipeline feeding open-data and current-map entity stores.
//!
//! A [`DataSource`] names a feature type on a [`Host`] and says how its
//! features are filtered, normalised and mapped. A [`DownloadPipeline`]
//! drains a [`FeatureSource`] for one data source and inserts the resulting
//! entities into an [`ods_core::EntityStore`]. Several pipelines can run at
//! once through [`run_concurrently`], each writing to its own store.
//!
//! Coordinate transformation and feature transport are seams:
//! [`CoordinateTransform`] and [`FeatureSource`] are implemented outside this
//! crate, apart from [`IdentityTransform`] and the file-backed
//! [`JsonFeatureSource`].

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod crs;
mod feature;
mod filter;
mod group;
mod mapping;
mod normalise;
mod pipeline;
mod source;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use crs::{CoordinateTransform, Crs, CrsError, IdentityTransform};
pub use feature::{Properties, PropertyValue, RawFeature};
pub use filter::{AttributeFilter, FeatureQuery};
pub use group::GroupBy;
pub use mapping::{AddressNodeMapper, BuildingMapper, EntityMapper, MappingError};
pub use normalise::Normalisation;
pub use pipeline::{
    CancelFlag, DownloadJob, DownloadPipeline, PipelineError, PipelineState, Status,
    run_concurrently,
};
pub use source::{
    DataSource, FeatureDocument, FeatureSource, FeatureStream, Host, JsonFeatureSource,
    SourceError, SourceInfo,
};
