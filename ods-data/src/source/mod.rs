//! Data source configuration and the feature source seam.

use std::io;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    AttributeFilter, Crs, EntityMapper, FeatureQuery, GroupBy, Normalisation, RawFeature,
};

mod json;

pub use json::{FeatureDocument, JsonFeatureSource};

/// Server publishing one or more feature types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Display name.
    pub name: String,
    /// Endpoint location; a URL or a local path.
    pub url: String,
    /// Largest number of features the host returns for one request.
    ///
    /// A response of this size is treated as truncated.
    #[serde(default)]
    pub max_features: Option<usize>,
}

const fn required_default() -> bool {
    true
}

/// One configured feature type and how it is turned into entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    /// Name of the feature type on the host.
    pub feature_type: String,
    /// Host publishing the feature type.
    pub host: Host,
    /// Whether an empty result deserves an advisory message.
    #[serde(default = "required_default")]
    pub required: bool,
    /// Source-specific attribute filter.
    #[serde(default)]
    pub filter: Option<AttributeFilter>,
    /// Property names to request; `None` requests every property.
    #[serde(default)]
    pub properties: Option<Vec<String>>,
    /// Attributes by which fetched features are merged before mapping.
    #[serde(default)]
    pub group_by: Option<GroupBy>,
    /// Normalisation applied to fetched features.
    #[serde(default)]
    pub normalisation: Normalisation,
    /// Mapper producing entities from features.
    #[serde(default)]
    pub mapper: EntityMapper,
}

impl DataSource {
    /// Required data source with full normalisation and the building mapper.
    #[must_use]
    pub fn new(feature_type: impl Into<String>, host: Host) -> Self {
        Self {
            feature_type: feature_type.into(),
            host,
            required: true,
            filter: None,
            properties: None,
            group_by: None,
            normalisation: Normalisation::default(),
            mapper: EntityMapper::default(),
        }
    }

    /// Set whether the data source is required.
    #[must_use]
    pub const fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Set the attribute filter.
    #[must_use]
    pub fn with_filter(mut self, filter: AttributeFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Merge fetched features sharing the values of `group_by`.
    #[must_use]
    pub fn with_group_by(mut self, group_by: GroupBy) -> Self {
        self.group_by = Some(group_by);
        self
    }

    /// Set the normalisation.
    #[must_use]
    pub const fn with_normalisation(mut self, normalisation: Normalisation) -> Self {
        self.normalisation = normalisation;
        self
    }

    /// Set the entity mapper.
    #[must_use]
    pub fn with_mapper(mut self, mapper: EntityMapper) -> Self {
        self.mapper = mapper;
        self
    }
}

/// Metadata reported by [`FeatureSource::initialise`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Coordinate system of geometries delivered by the source.
    pub crs: Crs,
    /// Property holding the stable feature id.
    pub id_attribute: String,
}

/// Errors raised by feature sources.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SourceError {
    /// The source file could not be opened or read.
    #[error("failed to read feature source {path}: {source}")]
    Read {
        /// File that failed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The source file is not a valid feature document.
    #[error("failed to parse feature source {path}: {source}")]
    Parse {
        /// File that failed.
        path: Utf8PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// The source does not publish the requested feature type.
    #[error("feature type {feature_type} is not available; the source offers {available}")]
    UnknownFeatureType {
        /// Requested feature type.
        feature_type: String,
        /// Feature type the source does offer.
        available: String,
    },
    /// Features were requested before [`FeatureSource::initialise`] succeeded.
    #[error("feature source used before initialisation")]
    NotInitialised,
    /// Streaming features failed mid-way.
    #[error("failed to fetch features: {message}")]
    Fetch {
        /// Description of the failure.
        message: String,
    },
}

/// Lazy sequence of raw features.
pub type FeatureStream<'a> = Box<dyn Iterator<Item = Result<RawFeature, SourceError>> + 'a>;

/// Remote or local provider of raw features.
///
/// Implementations may honour the query's area and filter to reduce
/// transfer; the pipeline applies [`FeatureQuery::accepts`] regardless.
pub trait FeatureSource: Send {
    /// Resolve the feature type and report its metadata.
    ///
    /// # Errors
    /// Returns [`SourceError`] when the source or feature type cannot be
    /// resolved.
    fn initialise(&mut self, feature_type: &str) -> Result<SourceInfo, SourceError>;

    /// Stream candidate features for `query`.
    ///
    /// # Errors
    /// Returns [`SourceError`] when the request cannot be started; failures
    /// while streaming surface as `Err` items.
    fn features(&mut self, query: &FeatureQuery) -> Result<FeatureStream<'_>, SourceError>;
}

impl<S: FeatureSource + ?Sized> FeatureSource for Box<S> {
    fn initialise(&mut self, feature_type: &str) -> Result<SourceInfo, SourceError> {
        (**self).initialise(feature_type)
    }

    fn features(&mut self, query: &FeatureQuery) -> Result<FeatureStream<'_>, SourceError> {
        (**self).features(query)
    }
}
