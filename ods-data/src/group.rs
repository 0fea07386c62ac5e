//! Collecting fetched features, with optional merging by attribute values.
//!
//! Some registers deliver one logical object as several records, for example
//! a building split into parts that share its identifier. A [`GroupBy`]
//! names the attributes identifying the object; records sharing their values
//! are merged into the first record of the group.

use std::collections::{BTreeMap, BTreeSet};

use geo::{Geometry, GeometryCollection, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

use crate::RawFeature;

/// Attributes whose values identify the features to merge.
///
/// ```
/// use geo::{Geometry, Point};
/// use ods_data::{GroupBy, RawFeature};
///
/// let group_by = GroupBy::new(["identificatie"]);
/// let part = RawFeature::new("pand.1a", Geometry::Point(Point::new(0.0, 0.0)))
///     .with_property("identificatie", 7_i64);
/// assert!(group_by.key(&part).is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupBy {
    /// Grouping attributes, in key order.
    pub attributes: Vec<String>,
}

impl GroupBy {
    /// Group by `attributes`.
    #[must_use]
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    /// Group key of `feature`.
    ///
    /// `None` when there are no grouping attributes or one of them is absent
    /// or null; such features are never merged.
    #[must_use]
    pub fn key(&self, feature: &RawFeature) -> Option<Vec<String>> {
        if self.attributes.is_empty() {
            return None;
        }
        self.attributes
            .iter()
            .map(|attribute| {
                feature
                    .property(attribute)
                    .filter(|value| !value.is_null())
                    .map(|value| format!("{value:?}"))
            })
            .collect()
    }
}

/// Working collection of one fetch.
///
/// Features are keyed by id, so a repeated id is ignored. With a [`GroupBy`]
/// a feature whose group key was seen before is merged into the earlier one.
#[derive(Debug, Default)]
pub(crate) struct FeatureCollector {
    group_by: Option<GroupBy>,
    ids: BTreeSet<String>,
    groups: BTreeMap<Vec<String>, usize>,
    features: Vec<RawFeature>,
    accepted: usize,
}

impl FeatureCollector {
    pub(crate) fn new(group_by: Option<GroupBy>) -> Self {
        Self {
            group_by,
            ..Self::default()
        }
    }

    /// Add a feature; returns `false` when its id was already collected.
    pub(crate) fn push(&mut self, feature: RawFeature) -> bool {
        if !self.ids.insert(feature.id.clone()) {
            return false;
        }
        self.accepted += 1;
        let key = self.group_by.as_ref().and_then(|group_by| group_by.key(&feature));
        let Some(key) = key else {
            self.features.push(feature);
            return true;
        };
        match self.groups.get(&key).and_then(|&position| self.features.get_mut(position)) {
            Some(first) => merge(first, feature),
            None => {
                self.groups.insert(key, self.features.len());
                self.features.push(feature);
            }
        }
        true
    }

    /// Number of distinct features collected, counted before merging.
    pub(crate) const fn accepted(&self) -> usize {
        self.accepted
    }

    pub(crate) fn into_features(self) -> Vec<RawFeature> {
        self.features
    }
}

/// Fold `part` into `first`: geometries are combined and properties missing
/// from `first` are copied over.
fn merge(first: &mut RawFeature, part: RawFeature) {
    first.geometry = match (first.geometry.take(), part.geometry) {
        (Some(a), Some(b)) => Some(combine(a, b)),
        (a, b) => a.or(b),
    };
    for (name, value) in part.properties {
        first.properties.entry(name).or_insert(value);
    }
}

fn combine(a: Geometry<f64>, b: Geometry<f64>) -> Geometry<f64> {
    match (polygons(&a), polygons(&b)) {
        (Some(mut merged), Some(more)) => {
            merged.extend(more);
            Geometry::MultiPolygon(MultiPolygon::new(merged))
        }
        _ => {
            let mut members = match a {
                Geometry::GeometryCollection(collection) => collection.0,
                other => vec![other],
            };
            members.push(b);
            Geometry::GeometryCollection(GeometryCollection::new_from(members))
        }
    }
}

fn polygons(geometry: &Geometry<f64>) -> Option<Vec<Polygon<f64>>> {
    match geometry {
        Geometry::Polygon(polygon) => Some(vec![polygon.clone()]),
        Geometry::MultiPolygon(multi) => Some(multi.0.clone()),
        _ => None,
    }
}
