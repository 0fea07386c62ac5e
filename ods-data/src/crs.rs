//! Coordinate reference system seam.
//!
//! Reprojection itself is an external concern. The pipeline only needs to
//! map the download boundary into the source system and fetched geometries
//! back into the project system, which [`CoordinateTransform`] captures.

use std::fmt;

use geo::Geometry;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a coordinate reference system, such as `EPSG:28992`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Crs(String);

impl Crs {
    /// Wrap a CRS identifier.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised while transforming geometries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CrsError {
    /// No transformation between the two systems is available.
    #[error("no transformation from {from} to {to}")]
    Unsupported {
        /// Source system.
        from: Crs,
        /// Target system.
        to: Crs,
    },
    /// The transformation itself failed.
    #[error("failed to transform geometry to {crs}: {message}")]
    Transform {
        /// Target system.
        crs: Crs,
        /// Description of the failure.
        message: String,
    },
}

/// Maps geometries between the project CRS and a source CRS.
pub trait CoordinateTransform: Send + Sync {
    /// Transform the project-space download boundary into `crs`.
    ///
    /// # Errors
    /// Returns [`CrsError`] when the transformation is unavailable or fails.
    fn to_source(&self, boundary: &Geometry<f64>, crs: &Crs) -> Result<Geometry<f64>, CrsError>;

    /// Transform a geometry delivered in `crs` into the project system.
    ///
    /// # Errors
    /// Returns [`CrsError`] when the transformation is unavailable or fails.
    fn to_project(&self, geometry: Geometry<f64>, crs: &Crs) -> Result<Geometry<f64>, CrsError>;
}

/// Transform for sources already in the project CRS.
///
/// Geometries pass through untouched whatever CRS the source declares.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl CoordinateTransform for IdentityTransform {
    fn to_source(&self, boundary: &Geometry<f64>, _crs: &Crs) -> Result<Geometry<f64>, CrsError> {
        Ok(boundary.clone())
    }

    fn to_project(&self, geometry: Geometry<f64>, _crs: &Crs) -> Result<Geometry<f64>, CrsError> {
        Ok(geometry)
    }
}
