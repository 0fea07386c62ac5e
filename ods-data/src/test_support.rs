//! In-memory feature sources, transforms and feature builders for tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use geo::{Geometry, Translate};
use ods_core::test_support::square;

use crate::{
    CancelFlag, CoordinateTransform, Crs, CrsError, FeatureQuery, FeatureSource, FeatureStream,
    RawFeature, SourceError, SourceInfo,
};

/// Property holding the feature id in [`VecFeatureSource`] features.
pub const ID_ATTRIBUTE: &str = "id";

/// Feature source serving a fixed list of features.
///
/// Behaviour can be scripted to fail initialisation, to fail or panic part-way
/// through the stream, or to request cancellation once a number of features
/// has been delivered.
#[derive(Debug, Clone)]
pub struct VecFeatureSource {
    feature_type: String,
    crs: Crs,
    features: Vec<RawFeature>,
    fail_initialise: bool,
    fail_after: Option<usize>,
    panic_after: Option<usize>,
    cancel_after: Option<(usize, CancelFlag)>,
}

impl VecFeatureSource {
    /// Source of `feature_type` in `EPSG:28992`.
    #[must_use]
    pub fn new(feature_type: impl Into<String>, features: Vec<RawFeature>) -> Self {
        Self {
            feature_type: feature_type.into(),
            crs: Crs::new("EPSG:28992"),
            features,
            fail_initialise: false,
            fail_after: None,
            panic_after: None,
            cancel_after: None,
        }
    }

    /// Make [`FeatureSource::initialise`] fail.
    #[must_use]
    pub const fn failing_initialise(mut self) -> Self {
        self.fail_initialise = true;
        self
    }

    /// Yield an error instead of the feature at position `count`.
    #[must_use]
    pub const fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Panic instead of delivering the feature at position `count`.
    ///
    /// # Panics
    /// The returned source panics while streaming.
    #[must_use]
    pub const fn panicking_after(mut self, count: usize) -> Self {
        self.panic_after = Some(count);
        self
    }

    /// Set `flag` once `count` features have been delivered.
    #[must_use]
    pub fn cancelling_after(mut self, count: usize, flag: CancelFlag) -> Self {
        self.cancel_after = Some((count, flag));
        self
    }
}

impl FeatureSource for VecFeatureSource {
    fn initialise(&mut self, feature_type: &str) -> Result<SourceInfo, SourceError> {
        if self.fail_initialise {
            return Err(SourceError::Fetch {
                message: format!("{feature_type} endpoint unavailable"),
            });
        }
        if feature_type != self.feature_type {
            return Err(SourceError::UnknownFeatureType {
                feature_type: feature_type.to_owned(),
                available: self.feature_type.clone(),
            });
        }
        Ok(SourceInfo {
            crs: self.crs.clone(),
            id_attribute: ID_ATTRIBUTE.to_owned(),
        })
    }

    fn features(&mut self, _query: &FeatureQuery) -> Result<FeatureStream<'_>, SourceError> {
        let fail_after = self.fail_after;
        let panic_after = self.panic_after;
        let cancel_after = self.cancel_after.clone();
        let mut delivered = 0_usize;
        Ok(Box::new(self.features.iter().map(move |feature| {
            assert!(
                panic_after != Some(delivered),
                "feature source crashed after {delivered} features"
            );
            if fail_after == Some(delivered) {
                return Err(SourceError::Fetch {
                    message: format!("connection reset after {delivered} features"),
                });
            }
            delivered += 1;
            if let Some((count, flag)) = &cancel_after {
                if delivered == *count {
                    flag.cancel();
                }
            }
            Ok(feature.clone())
        })))
    }
}

/// Transform translating source geometries by a fixed offset.
///
/// Project coordinates are source coordinates plus `(dx, dy)`. Calls to
/// [`CoordinateTransform::to_project`] are counted across runs, which lets
/// tests fail every projection or cancel a run on a given call.
#[derive(Debug, Default)]
pub struct OffsetTransform {
    dx: f64,
    dy: f64,
    fail_to_project: bool,
    cancel_on: Option<(usize, CancelFlag)>,
    projected: AtomicUsize,
}

impl OffsetTransform {
    /// Transform adding `(dx, dy)` to source coordinates.
    #[must_use]
    pub fn new(dx: f64, dy: f64) -> Self {
        Self {
            dx,
            dy,
            ..Self::default()
        }
    }

    /// Make every [`CoordinateTransform::to_project`] call fail.
    #[must_use]
    pub const fn failing(mut self) -> Self {
        self.fail_to_project = true;
        self
    }

    /// Set `flag` during the `call`-th projection, counting from one.
    #[must_use]
    pub fn cancelling_on(mut self, call: usize, flag: CancelFlag) -> Self {
        self.cancel_on = Some((call, flag));
        self
    }

    /// Number of projections performed so far.
    #[must_use]
    pub fn projected(&self) -> usize {
        self.projected.load(Ordering::SeqCst)
    }
}

impl CoordinateTransform for OffsetTransform {
    fn to_source(&self, boundary: &Geometry<f64>, _crs: &Crs) -> Result<Geometry<f64>, CrsError> {
        Ok(boundary.translate(-self.dx, -self.dy))
    }

    fn to_project(&self, geometry: Geometry<f64>, crs: &Crs) -> Result<Geometry<f64>, CrsError> {
        let call = self.projected.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_to_project {
            return Err(CrsError::Transform {
                crs: crs.clone(),
                message: format!("projection {call} rejected"),
            });
        }
        if let Some((cancel_on, flag)) = &self.cancel_on {
            if *cancel_on == call {
                flag.cancel();
            }
        }
        Ok(geometry.translate(self.dx, self.dy))
    }
}

/// Unit-square building feature at `(min_x, min_y)`.
///
/// The feature carries its id in [`ID_ATTRIBUTE`] and its reference id in
/// `identificatie`, the default building reference attribute.
#[must_use]
pub fn building_feature(id: i64, min_x: f64, min_y: f64, reference: i64) -> RawFeature {
    RawFeature::new(format!("pand.{id}"), square(min_x, min_y, 1.0))
        .with_property(ID_ATTRIBUTE, id)
        .with_property("identificatie", reference)
}

/// `count` building features spaced two units apart along the x axis.
#[must_use]
pub fn building_row(count: i64) -> Vec<RawFeature> {
    (0..count)
        .map(|id| {
            #[expect(
                clippy::cast_precision_loss,
                reason = "test rows are far smaller than 2^52"
            )]
            let min_x = (id * 2) as f64;
            building_feature(id, min_x, 0.0, id)
        })
        .collect()
}
