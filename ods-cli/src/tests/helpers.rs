//! Test helpers for writing feature documents to scratch directories.

use camino::Utf8Path;
use geo::{Coord, Geometry, Rect};
use ods_data::{Crs, FeatureDocument, RawFeature};

/// Axis-aligned building footprint.
pub(super) fn footprint(min: (f64, f64), max: (f64, f64)) -> Geometry<f64> {
    let rect = Rect::new(Coord { x: min.0, y: min.1 }, Coord { x: max.0, y: max.1 });
    Geometry::Polygon(rect.to_polygon())
}

/// Building feature with an integer `id` and an optional reference property.
pub(super) fn building(
    id: i64,
    min: (f64, f64),
    max: (f64, f64),
    reference: Option<(&str, i64)>,
) -> RawFeature {
    let feature = RawFeature::new(format!("feature.{id}"), footprint(min, max)).with_property("id", id);
    match reference {
        Some((attribute, value)) => feature.with_property(attribute, value),
        None => feature,
    }
}

/// Serialise a feature document to `path`.
pub(super) fn write_document(path: &Utf8Path, feature_type: &str, features: Vec<RawFeature>) {
    let document = FeatureDocument {
        feature_type: feature_type.to_owned(),
        crs: Crs::new("EPSG:28992"),
        id_attribute: "id".to_owned(),
        features,
    };
    let payload = serde_json::to_vec_pretty(&document).expect("serialise document");
    std::fs::write(path, payload).expect("write document");
}

/// Open-data buildings: 1 and 2 nearly touch, 3 stands apart.
pub(super) fn open_data_buildings() -> Vec<RawFeature> {
    vec![
        building(1, (0.0, 0.0), (1.0, 1.0), Some(("identificatie", 100))),
        building(2, (1.05, 0.0), (2.05, 1.0), Some(("identificatie", 200))),
        building(3, (5.0, 0.0), (6.0, 1.0), Some(("identificatie", 300))),
    ]
}

/// Current-map buildings: two share reference 100, one has none.
pub(super) fn current_buildings() -> Vec<RawFeature> {
    vec![
        building(10, (0.0, 0.0), (0.5, 1.0), Some(("ref:bag", 100))),
        building(11, (0.5, 0.0), (1.0, 1.0), Some(("ref:bag", 100))),
        building(12, (1.05, 0.0), (2.05, 1.0), None),
        building(13, (8.0, 0.0), (9.0, 1.0), Some(("ref:bag", 400))),
    ]
}
