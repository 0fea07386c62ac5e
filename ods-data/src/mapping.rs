//! Registry of feature-to-entity mappers, one variant per entity kind.

use geo::Geometry;
use ods_core::{Address, AttributeValue, BuildingAttributes, Entity, EntityAttributes, EntityKind, Tags};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{PropertyValue, RawFeature};

/// Errors raised while mapping a feature.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MappingError {
    /// The feature carries no geometry.
    #[error("feature {feature} has no geometry")]
    MissingGeometry {
        /// Source feature id.
        feature: String,
    },
    /// The geometry type does not suit the entity kind.
    #[error("feature {feature} has a {found} geometry, which cannot become a {kind}")]
    UnexpectedGeometry {
        /// Source feature id.
        feature: String,
        /// Entity kind the mapper produces.
        kind: EntityKind,
        /// Geometry type found on the feature.
        found: &'static str,
    },
}

/// Maps raw features to entities of one kind.
///
/// ```
/// use ods_data::EntityMapper;
///
/// let mapper: EntityMapper = serde_json::from_str(r#"{"kind": "building"}"#).expect("valid mapper");
/// assert_eq!(mapper.kind(), ods_core::EntityKind::Building);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityMapper {
    /// Produces [`EntityKind::Building`] entities.
    Building(BuildingMapper),
    /// Produces [`EntityKind::AddressNode`] entities.
    AddressNode(AddressNodeMapper),
}

impl Default for EntityMapper {
    fn default() -> Self {
        Self::Building(BuildingMapper::default())
    }
}

impl EntityMapper {
    /// Kind of the entities produced.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Building(_) => EntityKind::Building,
            Self::AddressNode(_) => EntityKind::AddressNode,
        }
    }

    /// Map a feature whose geometry is already in the project CRS.
    ///
    /// The primary id is taken from the `id_attribute` property, falling back
    /// to the feature id when the property is absent.
    ///
    /// # Errors
    /// Returns [`MappingError`] when the geometry is missing or unsuitable.
    pub fn map(&self, mut feature: RawFeature, id_attribute: &str) -> Result<Entity, MappingError> {
        let geometry = feature
            .geometry
            .take()
            .ok_or_else(|| MappingError::MissingGeometry {
                feature: feature.id.clone(),
            })?;
        let id = feature
            .property(id_attribute)
            .and_then(attribute_value)
            .unwrap_or_else(|| AttributeValue::from(feature.id.clone()));

        let (attributes, reference_attribute) = match self {
            Self::Building(mapper) => {
                require_geometry(&feature, &geometry, EntityKind::Building)?;
                (
                    EntityAttributes::Building(mapper.attributes(&feature)),
                    mapper.reference_attribute.as_str(),
                )
            }
            Self::AddressNode(mapper) => {
                require_geometry(&feature, &geometry, EntityKind::AddressNode)?;
                (
                    EntityAttributes::AddressNode(mapper.address(&feature)),
                    mapper.reference_attribute.as_str(),
                )
            }
        };

        let mut entity = Entity::new(id, geometry, attributes).with_tags(tags(&feature));
        if let Some(reference) = feature.property(reference_attribute).and_then(attribute_value) {
            entity = entity.with_reference_id(reference);
        }
        Ok(entity)
    }
}

/// Property names read by [`EntityMapper::Building`].
///
/// Defaults follow the Dutch BAG building register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingMapper {
    /// Property holding the reference id shared with the other dataset.
    pub reference_attribute: String,
    /// Property holding the building type.
    pub building_type_attribute: String,
    /// Property holding the construction year or date.
    pub start_date_attribute: String,
    /// Property holding the building status.
    pub status_attribute: String,
    /// Status values meaning the building is under construction.
    pub under_construction_values: Vec<String>,
}

impl Default for BuildingMapper {
    fn default() -> Self {
        Self {
            reference_attribute: "identificatie".into(),
            building_type_attribute: "gebruiksdoel".into(),
            start_date_attribute: "bouwjaar".into(),
            status_attribute: "status".into(),
            under_construction_values: vec!["Bouw gestart".into(), "Bouwvergunning verleend".into()],
        }
    }
}

impl BuildingMapper {
    /// Mapper reading the reference id from `reference_attribute`.
    #[must_use]
    pub fn with_reference_attribute(reference_attribute: impl Into<String>) -> Self {
        Self {
            reference_attribute: reference_attribute.into(),
            ..Self::default()
        }
    }

    fn attributes(&self, feature: &RawFeature) -> BuildingAttributes {
        let status = text(feature, &self.status_attribute);
        BuildingAttributes {
            building_type: text(feature, &self.building_type_attribute),
            start_date: text(feature, &self.start_date_attribute),
            under_construction: status.is_some_and(|value| {
                self.under_construction_values
                    .iter()
                    .any(|candidate| *candidate == value)
            }),
            address: None,
        }
    }
}

/// Property names read by [`EntityMapper::AddressNode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressNodeMapper {
    /// Property holding the reference id shared with the other dataset.
    pub reference_attribute: String,
    /// Property holding the postcode.
    pub postcode_attribute: String,
    /// Property holding the house number.
    pub house_number_attribute: String,
    /// Property holding the house letter.
    pub house_letter_attribute: String,
    /// Property holding the house number suffix.
    pub house_number_suffix_attribute: String,
    /// Property holding the street name.
    pub street_attribute: String,
    /// Property holding the city name.
    pub city_attribute: String,
}

impl Default for AddressNodeMapper {
    fn default() -> Self {
        Self {
            reference_attribute: "identificatie".into(),
            postcode_attribute: "postcode".into(),
            house_number_attribute: "huisnummer".into(),
            house_letter_attribute: "huisletter".into(),
            house_number_suffix_attribute: "huisnummertoevoeging".into(),
            street_attribute: "openbareruimte".into(),
            city_attribute: "woonplaats".into(),
        }
    }
}

impl AddressNodeMapper {
    fn address(&self, feature: &RawFeature) -> Address {
        Address {
            postcode: text(feature, &self.postcode_attribute)
                .map(|postcode| postcode.replace(' ', "")),
            house_number: feature
                .property(&self.house_number_attribute)
                .and_then(PropertyValue::as_integer),
            house_letter: text(feature, &self.house_letter_attribute),
            house_number_suffix: text(feature, &self.house_number_suffix_attribute),
            street: text(feature, &self.street_attribute),
            city: text(feature, &self.city_attribute),
        }
    }
}

fn require_geometry(
    feature: &RawFeature,
    geometry: &Geometry<f64>,
    kind: EntityKind,
) -> Result<(), MappingError> {
    let suitable = match kind {
        EntityKind::Building => {
            matches!(geometry, Geometry::Polygon(_) | Geometry::MultiPolygon(_))
        }
        EntityKind::AddressNode => matches!(geometry, Geometry::Point(_)),
    };
    if suitable {
        return Ok(());
    }
    Err(MappingError::UnexpectedGeometry {
        feature: feature.id.clone(),
        kind,
        found: geometry_name(geometry),
    })
}

const fn geometry_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "point",
        Geometry::Line(_) => "line",
        Geometry::LineString(_) => "line string",
        Geometry::Polygon(_) => "polygon",
        Geometry::MultiPoint(_) => "multi-point",
        Geometry::MultiLineString(_) => "multi-line string",
        Geometry::MultiPolygon(_) => "multi-polygon",
        Geometry::GeometryCollection(_) => "geometry collection",
        Geometry::Rect(_) => "rectangle",
        Geometry::Triangle(_) => "triangle",
    }
}

/// Identifier view of a property: integers stay integers, text stays text.
fn attribute_value(value: &PropertyValue) -> Option<AttributeValue> {
    match value {
        PropertyValue::Integer(number) => Some(AttributeValue::Integer(*number)),
        PropertyValue::Text(text) => Some(
            text.parse::<i64>()
                .map_or_else(|_| AttributeValue::from(text.as_str()), AttributeValue::Integer),
        ),
        PropertyValue::Null | PropertyValue::Bool(_) | PropertyValue::Float(_) => None,
    }
}

fn text(feature: &RawFeature, attribute: &str) -> Option<String> {
    match feature.property(attribute)? {
        PropertyValue::Null => None,
        other => Some(other.to_string()),
    }
}

fn tags(feature: &RawFeature) -> Tags {
    feature
        .properties
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| (name.clone(), value.to_string()))
        .collect()
}
