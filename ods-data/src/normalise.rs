//! Feature normalisation applied while fetching.

use geo::RemoveRepeatedPoints;
use serde::{Deserialize, Serialize};

use crate::{PropertyValue, RawFeature};

/// How thoroughly fetched features are cleaned up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalisation {
    /// Leave features untouched.
    None,
    /// Trim surrounding whitespace from text properties.
    Trim,
    /// Trim text, turn empty text into null and drop repeated coordinates.
    #[default]
    Full,
}

impl Normalisation {
    /// Normalise a feature.
    ///
    /// # Examples
    /// ```
    /// use geo::{Geometry, Point};
    /// use ods_data::{Normalisation, PropertyValue, RawFeature};
    ///
    /// let raw = RawFeature::new("1", Geometry::Point(Point::new(0.0, 0.0)))
    ///     .with_property("straat", "  Dorpsstraat ")
    ///     .with_property("toevoeging", " ");
    /// let clean = Normalisation::Full.apply(raw);
    /// assert_eq!(clean.property("straat"), Some(&PropertyValue::from("Dorpsstraat")));
    /// assert_eq!(clean.property("toevoeging"), Some(&PropertyValue::Null));
    /// ```
    #[must_use]
    pub fn apply(self, mut feature: RawFeature) -> RawFeature {
        if self == Self::None {
            return feature;
        }
        for value in feature.properties.values_mut() {
            let PropertyValue::Text(text) = value else {
                continue;
            };
            let trimmed = text.trim();
            if self == Self::Full && trimmed.is_empty() {
                *value = PropertyValue::Null;
            } else if trimmed.len() != text.len() {
                *text = trimmed.to_owned();
            }
        }
        if self == Self::Full {
            feature.geometry = feature
                .geometry
                .map(|geometry| geometry.remove_repeated_points());
        }
        feature
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, LineString, line_string};
    use rstest::rstest;

    fn feature() -> RawFeature {
        RawFeature::new(
            "1",
            Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 0.0, y: 0.0), (x: 1.0, y: 1.0)]),
        )
        .with_property("name", " a ")
        .with_property("blank", "")
    }

    #[rstest]
    fn none_is_identity() {
        assert_eq!(Normalisation::None.apply(feature()), feature());
    }

    #[rstest]
    fn trim_keeps_empty_text_and_geometry() {
        let trimmed = Normalisation::Trim.apply(feature());
        assert_eq!(trimmed.property("name"), Some(&PropertyValue::from("a")));
        assert_eq!(trimmed.property("blank"), Some(&PropertyValue::from("")));
        assert_eq!(trimmed.geometry, feature().geometry);
    }

    #[rstest]
    fn full_drops_repeated_coordinates() {
        let full = Normalisation::Full.apply(feature());
        assert_eq!(full.property("blank"), Some(&PropertyValue::Null));
        let Some(Geometry::LineString(line)) = full.geometry else {
            panic!("geometry kept");
        };
        assert_eq!(line, LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]));
    }
}
