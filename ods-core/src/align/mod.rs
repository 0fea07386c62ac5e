//! Neighbour discovery and shared-boundary repair for buildings.
//!
//! [`BuildingAligner::on_entity_added`] runs after each insert into a store
//! with a spatial index. It records neighbour relationships with every entity
//! whose envelope lies within the tolerance of the new entity, and snaps the
//! boundaries of complete, nearby polygons onto each other.

use geo::{BoundingRect, Geometry, MultiPolygon, Polygon};
use log::debug;
use thiserror::Error;

use crate::store::expand_rect;
use crate::{EntityKey, EntityStore, StoreError};

mod snap;

/// Errors raised by the aligner.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AlignError {
    /// The tolerance was zero, negative or not finite.
    #[error("alignment tolerance must be a positive finite number, got {tolerance}")]
    InvalidTolerance {
        /// Rejected tolerance.
        tolerance: f64,
    },
    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What one [`BuildingAligner::on_entity_added`] call changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignReport {
    /// Entities newly recorded as neighbours of the added entity.
    pub neighbours_added: Vec<EntityKey>,
    /// Neighbours whose shared boundary with the added entity was repaired.
    pub repaired: Vec<EntityKey>,
}

/// Aligns adjacent building boundaries within a distance tolerance.
///
/// # Examples
/// ```
/// use ods_core::BuildingAligner;
///
/// assert!(BuildingAligner::new(0.1).is_ok());
/// assert!(BuildingAligner::new(0.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildingAligner {
    tolerance: f64,
}

impl BuildingAligner {
    /// Create an aligner.
    ///
    /// # Errors
    /// Returns [`AlignError::InvalidTolerance`] unless `tolerance` is finite
    /// and strictly positive.
    pub fn new(tolerance: f64) -> Result<Self, AlignError> {
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(AlignError::InvalidTolerance { tolerance });
        }
        Ok(Self { tolerance })
    }

    /// Distance tolerance in projected units.
    #[must_use]
    pub const fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Discover neighbours of `key` and repair shared boundaries.
    ///
    /// Pairs that are already neighbours are skipped entirely, so calling
    /// this twice for the same entity changes nothing the second time.
    /// Incomplete entities become neighbours but are never snapped.
    ///
    /// # Errors
    /// Returns [`AlignError::Store`] when `key` is not in the store or the
    /// store has no spatial index.
    pub fn on_entity_added(
        &self,
        store: &mut EntityStore,
        key: EntityKey,
    ) -> Result<AlignReport, AlignError> {
        let entity = store.get(key).ok_or_else(|| StoreError::UnknownEntity {
            store: store.name().to_owned(),
            key,
        })?;
        let mut report = AlignReport::default();
        let Some(rect) = entity.geometry().bounding_rect() else {
            return Ok(report);
        };
        let candidates = store.locate_in_envelope(&expand_rect(&rect, self.tolerance))?;

        for candidate in candidates {
            if candidate == key || !store.add_neighbours(key, candidate)? {
                continue;
            }
            report.neighbours_added.push(candidate);
            if self.repair(store, key, candidate)? {
                report.repaired.push(candidate);
            }
        }

        if !report.neighbours_added.is_empty() {
            debug!(
                "store `{}`: {key} gained {} neighbours, {} boundaries repaired",
                store.name(),
                report.neighbours_added.len(),
                report.repaired.len()
            );
        }
        Ok(report)
    }

    fn repair(
        &self,
        store: &mut EntityStore,
        target: EntityKey,
        reference: EntityKey,
    ) -> Result<bool, AlignError> {
        let Some((target_geometry, reference_geometry)) =
            self.aligned_geometries(store, target, reference)
        else {
            return Ok(false);
        };
        store.replace_geometry(target, target_geometry)?;
        store.replace_geometry(reference, reference_geometry)?;
        Ok(true)
    }

    fn aligned_geometries(
        &self,
        store: &EntityStore,
        target: EntityKey,
        reference: EntityKey,
    ) -> Option<(Geometry<f64>, Geometry<f64>)> {
        let target_entity = store.get(target)?;
        let reference_entity = store.get(reference)?;
        if target_entity.is_incomplete() || reference_entity.is_incomplete() {
            return None;
        }
        let target_polygon = single_outer(target_entity.geometry())?;
        let reference_polygon = single_outer(reference_entity.geometry())?;
        if !snap::polygons_within(target_polygon, reference_polygon, self.tolerance) {
            return None;
        }
        let aligned = snap::align_rings(
            target_polygon.exterior(),
            reference_polygon.exterior(),
            self.tolerance,
        )?;
        Some((
            rebuild(target_entity.geometry(), target_polygon, aligned.target),
            rebuild(reference_entity.geometry(), reference_polygon, aligned.reference),
        ))
    }
}

/// The polygon of a geometry with exactly one outer ring.
fn single_outer(geometry: &Geometry<f64>) -> Option<&Polygon<f64>> {
    match geometry {
        Geometry::Polygon(polygon) => Some(polygon),
        Geometry::MultiPolygon(multi) if multi.0.len() == 1 => multi.0.first(),
        _ => None,
    }
}

fn rebuild(
    original: &Geometry<f64>,
    polygon: &Polygon<f64>,
    exterior: geo::LineString<f64>,
) -> Geometry<f64> {
    let repaired = Polygon::new(exterior, polygon.interiors().to_vec());
    match original {
        Geometry::MultiPolygon(_) => Geometry::MultiPolygon(MultiPolygon::new(vec![repaired])),
        _ => Geometry::Polygon(repaired),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AttributeValue, Entity};
    use geo::{Point, polygon};
    use rstest::rstest;

    #[rstest]
    #[case(0.0)]
    #[case(-1.0)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn rejects_unusable_tolerances(#[case] tolerance: f64) {
        assert!(matches!(
            BuildingAligner::new(tolerance),
            Err(AlignError::InvalidTolerance { .. })
        ));
    }

    #[rstest]
    fn only_single_outer_ring_polygons_are_repaired() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        let single = Geometry::MultiPolygon(MultiPolygon::new(vec![square.clone()]));
        let double = Geometry::MultiPolygon(MultiPolygon::new(vec![square.clone(), square.clone()]));
        assert!(single_outer(&Geometry::Polygon(square)).is_some());
        assert!(single_outer(&single).is_some());
        assert!(single_outer(&double).is_none());
        assert!(single_outer(&Geometry::Point(Point::new(0.0, 0.0))).is_none());
    }

    #[rstest]
    fn unknown_entity_is_reported() {
        let mut store = EntityStore::builder("buildings").with_spatial_index().build();
        let key = store
            .insert(Entity::building(
                AttributeValue::from(1_i64),
                Geometry::Point(Point::new(0.0, 0.0)),
            ))
            .expect("insert");
        store.remove(key);
        let aligner = BuildingAligner::new(0.1).expect("valid tolerance");
        let err = aligner
            .on_entity_added(&mut store, key)
            .expect_err("removed entity");
        assert!(matches!(err, AlignError::Store(StoreError::UnknownEntity { .. })));
    }

    #[rstest]
    fn multipolygon_wrapping_survives_repair() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        let original = Geometry::MultiPolygon(MultiPolygon::new(vec![square.clone()]));
        let rebuilt = rebuild(&original, &square, square.exterior().clone());
        assert_eq!(rebuilt, original);
    }
}
