//! Attribute values and the keys built from them.
//!
//! Indexes never inspect entities directly: an extractor turns an entity into
//! an [`IndexKey`], which is an ordered tuple of [`AttributeValue`]s. Keys are
//! totally ordered so key indexes can answer range queries.

use std::fmt;

/// A scalar attribute value used for identifiers and index keys.
///
/// # Examples
/// ```
/// use ods_core::AttributeValue;
///
/// let id = AttributeValue::from(100_i64);
/// assert_eq!(id.as_integer(), Some(100));
/// assert_eq!(AttributeValue::from("pand.1").as_integer(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum AttributeValue {
    /// A signed integer value.
    Integer(i64),
    /// A free-form text value.
    Text(String),
}

impl AttributeValue {
    /// Return the integer payload, if this value is an integer.
    ///
    /// Text is never coerced: a numeric-looking string is still text.
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Text(_) => None,
        }
    }

    /// Return the text payload, if this value is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Integer(_) => None,
            Self::Text(value) => Some(value.as_str()),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Ordered tuple of attribute values identifying an index entry.
///
/// Single-attribute keys hold one value; composite keys, such as
/// postcode plus house number, hold one value per attribute in declaration
/// order.
///
/// # Examples
/// ```
/// use ods_core::{AttributeValue, IndexKey};
///
/// let key = IndexKey::composite([AttributeValue::from("1234AB"), AttributeValue::from(12_i64)]);
/// assert_eq!(key.len(), 2);
/// assert!(IndexKey::single(1_i64) < IndexKey::single(2_i64));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexKey(Vec<AttributeValue>);

impl IndexKey {
    /// Build a single-attribute key.
    pub fn single(value: impl Into<AttributeValue>) -> Self {
        Self(vec![value.into()])
    }

    /// Build a composite key from values in attribute order.
    pub fn composite<I>(values: I) -> Self
    where
        I: IntoIterator<Item = AttributeValue>,
    {
        Self(values.into_iter().collect())
    }

    /// Return the values making up this key.
    #[must_use]
    pub fn values(&self) -> &[AttributeValue] {
        &self.0
    }

    /// Number of attributes in the key.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key has no attributes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<AttributeValue> for IndexKey {
    fn from(value: AttributeValue) -> Self {
        Self(vec![value])
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (position, value) in self.0.iter().enumerate() {
            if position > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}
