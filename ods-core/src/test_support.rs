//! Geometry and store builders shared by unit and behaviour tests.

use geo::{Coord, Geometry, LineString, Polygon};

use crate::{AttributeValue, Entity, EntityStore};

/// Axis-aligned square polygon with its lower-left corner at `(min_x, min_y)`.
#[expect(
    clippy::float_arithmetic,
    reason = "corner coordinates are offsets from the origin corner"
)]
#[must_use]
pub fn square(min_x: f64, min_y: f64, side: f64) -> Geometry<f64> {
    let ring = LineString::new(vec![
        Coord { x: min_x, y: min_y },
        Coord {
            x: min_x + side,
            y: min_y,
        },
        Coord {
            x: min_x + side,
            y: min_y + side,
        },
        Coord {
            x: min_x,
            y: min_y + side,
        },
        Coord { x: min_x, y: min_y },
    ]);
    Geometry::Polygon(Polygon::new(ring, Vec::new()))
}

/// Unit-square building with an integer id and optional integer reference id.
#[must_use]
pub fn square_building(id: i64, min_x: f64, min_y: f64, reference_id: Option<i64>) -> Entity {
    let entity = Entity::building(AttributeValue::from(id), square(min_x, min_y, 1.0));
    match reference_id {
        Some(reference) => entity.with_reference_id(AttributeValue::from(reference)),
        None => entity,
    }
}

/// Store with a spatial index and the reference index, as used for buildings.
#[must_use]
pub fn building_store(name: &str) -> EntityStore {
    EntityStore::builder(name)
        .with_spatial_index()
        .with_reference_index()
        .build()
}
