//! Geometry-bearing domain records tracked by an [`EntityStore`](crate::EntityStore).
//!
//! An [`Entity`] carries its source identity, an optional reference id used
//! to correlate it with the other dataset, a geometry in the project
//! coordinate system and a kind-specific attribute payload. Neighbour sets
//! and match back-references are derived state: they hold store-local
//! [`EntityKey`] and [`MatchId`] handles rather than links to other
//! entities, and only the owning store mutates them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use geo::Geometry;

use crate::{AttributeValue, MatchId};

/// Free-form key/value tags attached to an entity.
pub type Tags = BTreeMap<String, String>;

/// Store-local handle for an entity.
///
/// Keys are allocated in increasing order by [`EntityStore::insert`](crate::EntityStore::insert)
/// and are never reused, so sorting by key yields insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityKey(pub(crate) u64);

impl EntityKey {
    /// Raw numeric value of the key.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Supported entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EntityKind {
    /// A building footprint.
    Building,
    /// An address point.
    AddressNode,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Building => f.write_str("building"),
            Self::AddressNode => f.write_str("address node"),
        }
    }
}

/// Postal address details.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    /// Postal code, e.g. `1234AB`.
    pub postcode: Option<String>,
    /// Numeric part of the house number.
    pub house_number: Option<i64>,
    /// Single-letter house number addition.
    pub house_letter: Option<String>,
    /// Free-form house number suffix.
    pub house_number_suffix: Option<String>,
    /// Street name.
    pub street: Option<String>,
    /// City or town name.
    pub city: Option<String>,
}

/// Attributes specific to buildings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildingAttributes {
    /// Building type as used in OpenStreetMap, e.g. `apartments`.
    pub building_type: Option<String>,
    /// Construction start date as published by the source.
    pub start_date: Option<String>,
    /// Whether the building is still under construction.
    pub under_construction: bool,
    /// Main address of the building, if known.
    pub address: Option<Address>,
}

/// Kind-specific attribute payload.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EntityAttributes {
    /// Payload for [`EntityKind::Building`].
    Building(BuildingAttributes),
    /// Payload for [`EntityKind::AddressNode`].
    AddressNode(Address),
}

impl EntityAttributes {
    /// Kind described by this payload.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Building(_) => EntityKind::Building,
            Self::AddressNode(_) => EntityKind::AddressNode,
        }
    }

    /// Address carried by the payload, if any.
    #[must_use]
    pub const fn address(&self) -> Option<&Address> {
        match self {
            Self::Building(building) => building.address.as_ref(),
            Self::AddressNode(address) => Some(address),
        }
    }
}

/// A geometry-bearing record, e.g. a building.
///
/// # Examples
/// ```
/// use geo::{Geometry, Point};
/// use ods_core::{AttributeValue, Entity, EntityKind};
///
/// let entity = Entity::building(AttributeValue::from("pand.1"), Geometry::Point(Point::new(0.0, 0.0)))
///     .with_reference_id(AttributeValue::from(100_i64));
/// assert_eq!(entity.kind(), EntityKind::Building);
/// assert_eq!(entity.reference_id(), Some(&AttributeValue::from(100_i64)));
/// assert!(entity.neighbours().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: AttributeValue,
    reference_id: Option<AttributeValue>,
    geometry: Geometry<f64>,
    incomplete: bool,
    attributes: EntityAttributes,
    tags: Tags,
    pub(crate) neighbours: BTreeSet<EntityKey>,
    pub(crate) match_id: Option<MatchId>,
}

impl Entity {
    /// Construct an entity with the given primary id, geometry and payload.
    #[must_use]
    pub fn new(id: AttributeValue, geometry: Geometry<f64>, attributes: EntityAttributes) -> Self {
        Self {
            id,
            reference_id: None,
            geometry,
            incomplete: false,
            attributes,
            tags: BTreeMap::new(),
            neighbours: BTreeSet::new(),
            match_id: None,
        }
    }

    /// Construct a building without attributes.
    #[must_use]
    pub fn building(id: AttributeValue, geometry: Geometry<f64>) -> Self {
        Self::new(
            id,
            geometry,
            EntityAttributes::Building(BuildingAttributes::default()),
        )
    }

    /// Set the external reference id.
    #[must_use]
    pub fn with_reference_id(mut self, reference_id: AttributeValue) -> Self {
        self.reference_id = Some(reference_id);
        self
    }

    /// Mark the geometry as clipped by the download boundary.
    #[must_use]
    pub fn with_incomplete(mut self, incomplete: bool) -> Self {
        self.incomplete = incomplete;
        self
    }

    /// Replace the free-form tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Primary id, unique within the owning store.
    #[must_use]
    pub const fn id(&self) -> &AttributeValue {
        &self.id
    }

    /// External reference id shared with the other dataset.
    #[must_use]
    pub const fn reference_id(&self) -> Option<&AttributeValue> {
        self.reference_id.as_ref()
    }

    /// Geometry in the project coordinate system.
    #[must_use]
    pub const fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    /// Whether the geometry may be clipped by the download boundary.
    #[must_use]
    pub const fn is_incomplete(&self) -> bool {
        self.incomplete
    }

    /// Kind of the entity.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.attributes.kind()
    }

    /// Kind-specific attributes.
    #[must_use]
    pub const fn attributes(&self) -> &EntityAttributes {
        &self.attributes
    }

    /// Free-form tags.
    #[must_use]
    pub const fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Spatially adjacent entities in the same store.
    #[must_use]
    pub const fn neighbours(&self) -> &BTreeSet<EntityKey> {
        &self.neighbours
    }

    /// Match this entity participates in, if any.
    #[must_use]
    pub const fn match_id(&self) -> Option<MatchId> {
        self.match_id
    }

    pub(crate) fn set_geometry(&mut self, geometry: Geometry<f64>) {
        self.geometry = geometry;
    }
}
