//! Raw features as delivered by a feature source.

use std::collections::BTreeMap;
use std::fmt;

use geo::Geometry;
use serde::{Deserialize, Serialize};

/// Property value of a raw feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Missing or explicitly empty value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Integer(i64),
    /// Floating-point value.
    Float(f64),
    /// Text value.
    Text(String),
}

impl PropertyValue {
    /// Integer payload. Text holding a decimal integer is parsed.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
            Self::Null | Self::Bool(_) | Self::Float(_) => None,
        }
    }

    /// Text payload, if this value is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Whether the value is [`PropertyValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Named feature properties, ordered by name.
pub type Properties = BTreeMap<String, PropertyValue>;

/// A feature before it is mapped to an entity.
///
/// Geometries are in the coordinate system of the source until the pipeline
/// transforms them.
///
/// # Examples
/// ```
/// use geo::{Geometry, Point};
/// use ods_data::{PropertyValue, RawFeature};
///
/// let feature = RawFeature::new("pand.1", Geometry::Point(Point::new(1.0, 2.0)))
///     .with_property("bouwjaar", 1932_i64);
/// assert_eq!(feature.property("bouwjaar"), Some(&PropertyValue::Integer(1932)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFeature {
    /// Source feature id, unique within one response.
    pub id: String,
    /// Feature geometry, if the source supplied one.
    #[serde(default)]
    pub geometry: Option<Geometry<f64>>,
    /// Feature properties.
    #[serde(default)]
    pub properties: Properties,
}

impl RawFeature {
    /// Feature with a geometry and no properties.
    #[must_use]
    pub fn new(id: impl Into<String>, geometry: Geometry<f64>) -> Self {
        Self {
            id: id.into(),
            geometry: Some(geometry),
            properties: Properties::new(),
        }
    }

    /// Add or replace a property.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Look up a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}
