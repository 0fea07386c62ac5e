//! Attribute filters and the per-run feature query.

use geo::{Geometry, Intersects};
use serde::{Deserialize, Serialize};

use crate::{GroupBy, Properties, PropertyValue, RawFeature};

/// Source-specific attribute predicate.
///
/// Filters are plain data so they can be deserialised from configuration:
///
/// ```
/// use ods_data::{AttributeFilter, PropertyValue, Properties};
///
/// let filter: AttributeFilter = serde_json::from_str(
///     r#"{"op": "not", "filter": {"op": "equals", "attribute": "status", "value": "Pand gesloopt"}}"#,
/// )
/// .expect("valid filter");
/// let mut properties = Properties::new();
/// properties.insert("status".into(), PropertyValue::from("Pand in gebruik"));
/// assert!(filter.matches(&properties));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AttributeFilter {
    /// The attribute equals `value`.
    Equals {
        /// Property name.
        attribute: String,
        /// Expected value.
        value: PropertyValue,
    },
    /// The attribute equals one of `values`.
    In {
        /// Property name.
        attribute: String,
        /// Accepted values.
        values: Vec<PropertyValue>,
    },
    /// The attribute is absent or null.
    IsNull {
        /// Property name.
        attribute: String,
    },
    /// The inner filter does not hold.
    Not {
        /// Negated filter.
        filter: Box<AttributeFilter>,
    },
    /// Every inner filter holds. An empty list always holds.
    And {
        /// Conjuncts.
        filters: Vec<AttributeFilter>,
    },
    /// At least one inner filter holds. An empty list never holds.
    Or {
        /// Disjuncts.
        filters: Vec<AttributeFilter>,
    },
}

impl AttributeFilter {
    /// Evaluate the filter against feature properties.
    #[must_use]
    pub fn matches(&self, properties: &Properties) -> bool {
        match self {
            Self::Equals { attribute, value } => properties.get(attribute) == Some(value),
            Self::In { attribute, values } => properties
                .get(attribute)
                .is_some_and(|actual| values.contains(actual)),
            Self::IsNull { attribute } => properties
                .get(attribute)
                .is_none_or(PropertyValue::is_null),
            Self::Not { filter } => !filter.matches(properties),
            Self::And { filters } => filters.iter().all(|inner| inner.matches(properties)),
            Self::Or { filters } => filters.iter().any(|inner| inner.matches(properties)),
        }
    }
}

/// Query built by the prepare stage of a download.
///
/// The area is expressed in the coordinate system of the source.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureQuery {
    /// Download area in source coordinates.
    pub area: Geometry<f64>,
    /// Optional attribute filter of the data source.
    pub filter: Option<AttributeFilter>,
    /// Property names to request; `None` requests every property.
    pub properties: Option<Vec<String>>,
    /// Attributes by which fetched features are merged.
    pub group_by: Option<GroupBy>,
}

impl FeatureQuery {
    /// Whether `feature` intersects the area and passes the attribute filter.
    ///
    /// Features without geometry are never accepted.
    #[must_use]
    pub fn accepts(&self, feature: &RawFeature) -> bool {
        let Some(geometry) = &feature.geometry else {
            return false;
        };
        geometry.intersects(&self.area)
            && self
                .filter
                .as_ref()
                .is_none_or(|filter| filter.matches(&feature.properties))
    }
}
