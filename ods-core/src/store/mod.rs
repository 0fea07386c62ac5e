//! In-memory entity store with pluggable secondary indexes.
//!
//! An [`EntityStore`] owns the entities of one dataset together with every
//! index registered on it: the primary unique index on [`Entity::id`], any
//! number of [`KeyIndex`]es and at most one [`SpatialIndex`]. Index
//! maintenance happens synchronously inside [`EntityStore::insert`] and
//! [`EntityStore::remove`], so an entity is never visible through one index
//! while absent from another.
//!
//! The store is not internally synchronised. A single writer owns it while
//! entities are being added; shared references may be handed out once the
//! writer is done.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use geo::{BoundingRect, Geometry, Intersects, Rect};
use log::debug;
use thiserror::Error;

use crate::{AttributeValue, Entity, EntityKey, IndexKey, MatchId};

mod key_index;
mod spatial_index;

pub use key_index::{KeyExtractor, KeyIndex, Uniqueness};
pub use spatial_index::{SpatialIndex, expand_rect};

/// Name of the primary unique index on [`Entity::id`].
pub const PRIMARY_INDEX: &str = "id";
/// Name of the non-unique index on integer reference ids.
pub const REFERENCE_INDEX: &str = "reference_id";
/// Name of the composite postcode plus house number index.
pub const ADDRESS_INDEX: &str = "postcode_house_number";

/// Errors raised by [`EntityStore`] operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A unique index already holds an entity with the same key.
    #[error("duplicate key {key} in unique index `{index}` of store `{store}`")]
    DuplicateKey {
        /// Store that rejected the insert.
        store: String,
        /// Name of the unique index that detected the clash.
        index: String,
        /// Clashing key value.
        key: IndexKey,
    },
    /// No index with the requested name is registered.
    #[error("store `{store}` has no index named `{index}`")]
    UnknownIndex {
        /// Store that was queried.
        store: String,
        /// Requested index name.
        index: String,
    },
    /// The operation requires a spatial index, but none is registered.
    #[error("store `{store}` has no spatial index")]
    MissingSpatialIndex {
        /// Store that was queried.
        store: String,
    },
    /// The key does not identify an entity of this store.
    #[error("entity {key} is not in store `{store}`")]
    UnknownEntity {
        /// Store that was queried.
        store: String,
        /// Missing key.
        key: EntityKey,
    },
}

fn primary_key(entity: &Entity) -> Option<IndexKey> {
    Some(IndexKey::from(entity.id().clone()))
}

fn reference_key(entity: &Entity) -> Option<IndexKey> {
    entity
        .reference_id()
        .and_then(AttributeValue::as_integer)
        .map(IndexKey::single)
}

fn address_key(entity: &Entity) -> Option<IndexKey> {
    let address = entity.attributes().address()?;
    let postcode = address.postcode.clone()?;
    let house_number = address.house_number?;
    Some(IndexKey::composite([
        AttributeValue::from(postcode),
        AttributeValue::from(house_number),
    ]))
}

/// Configures the indexes of a new [`EntityStore`].
///
/// # Examples
/// ```
/// use ods_core::{EntityStore, REFERENCE_INDEX};
///
/// let store = EntityStore::builder("buildings")
///     .with_spatial_index()
///     .with_reference_index()
///     .build();
/// assert!(store.spatial_index().is_some());
/// assert!(store.index(REFERENCE_INDEX).is_ok());
/// ```
#[derive(Debug)]
pub struct EntityStoreBuilder {
    name: String,
    indexes: Vec<KeyIndex>,
    spatial: bool,
}

impl EntityStoreBuilder {
    /// Register the spatial index.
    #[must_use]
    pub const fn with_spatial_index(mut self) -> Self {
        self.spatial = true;
        self
    }

    /// Register the non-unique [`REFERENCE_INDEX`] used by the matcher.
    ///
    /// Only integer reference ids are indexed.
    #[must_use]
    pub fn with_reference_index(self) -> Self {
        self.with_index(REFERENCE_INDEX, Uniqueness::NonUnique, reference_key)
    }

    /// Register the composite [`ADDRESS_INDEX`] on postcode and house number.
    #[must_use]
    pub fn with_address_index(self) -> Self {
        self.with_index(ADDRESS_INDEX, Uniqueness::NonUnique, address_key)
    }

    /// Register a custom key index, replacing any index of the same name.
    #[must_use]
    pub fn with_index(
        mut self,
        name: impl Into<String>,
        uniqueness: Uniqueness,
        extractor: KeyExtractor,
    ) -> Self {
        let index = KeyIndex::new(name, uniqueness, extractor);
        self.indexes.retain(|existing| existing.name() != index.name());
        self.indexes.push(index);
        self
    }

    /// Create the empty store.
    #[must_use]
    pub fn build(self) -> EntityStore {
        EntityStore {
            primary: KeyIndex::new(PRIMARY_INDEX, Uniqueness::Unique, primary_key),
            indexes: self.indexes,
            spatial: self.spatial.then(SpatialIndex::new),
            entities: BTreeMap::new(),
            next_key: 0,
            name: self.name,
        }
    }
}

/// Set of entities of one dataset plus the indexes over them.
#[derive(Debug)]
pub struct EntityStore {
    name: String,
    entities: BTreeMap<EntityKey, Entity>,
    next_key: u64,
    primary: KeyIndex,
    indexes: Vec<KeyIndex>,
    spatial: Option<SpatialIndex>,
}

impl EntityStore {
    /// Start configuring a store. The name appears in diagnostics.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> EntityStoreBuilder {
        EntityStoreBuilder {
            name: name.into(),
            indexes: Vec::new(),
            spatial: false,
        }
    }

    /// Diagnostic name of the store.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of entities present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityKey, &Entity)> + '_ {
        self.entities.iter().map(|(key, entity)| (*key, entity))
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.entities.keys().copied()
    }

    /// Look up an entity by key.
    #[must_use]
    pub fn get(&self, key: EntityKey) -> Option<&Entity> {
        self.entities.get(&key)
    }

    /// Whether `key` identifies an entity of this store.
    #[must_use]
    pub fn contains(&self, key: EntityKey) -> bool {
        self.entities.contains_key(&key)
    }

    /// Add an entity to the store and every registered index.
    ///
    /// Every unique index is consulted before anything is mutated, so a
    /// rejected insert leaves the store unchanged. Derived state carried by
    /// the incoming entity (neighbours, match) is discarded.
    ///
    /// # Errors
    /// Returns [`StoreError::DuplicateKey`] when a unique index already holds
    /// the entity's key.
    pub fn insert(&mut self, mut entity: Entity) -> Result<EntityKey, StoreError> {
        self.check_unique(&entity, None)?;

        entity.neighbours.clear();
        entity.match_id = None;

        let key = EntityKey(self.next_key);
        self.next_key += 1;

        self.primary.insert(key, &entity);
        for index in &mut self.indexes {
            index.insert(key, &entity);
        }
        if let Some(spatial) = &mut self.spatial {
            spatial.insert(key, entity.geometry());
        }
        debug!("store `{}`: inserted {} as {key}", self.name, entity.id());
        self.entities.insert(key, entity);
        Ok(key)
    }

    /// Insert `entity`, replacing a stored entity with the same id.
    ///
    /// Unique indexes are checked as if the replaced entity were already
    /// gone, and nothing is removed unless the insert will succeed. Returns
    /// the new key and the replaced entity, if any.
    ///
    /// # Errors
    /// Returns [`StoreError::DuplicateKey`] when a unique index holds the
    /// entity's key for a different entity; the store is unchanged.
    pub fn supersede(&mut self, entity: Entity) -> Result<(EntityKey, Option<Entity>), StoreError> {
        let existing = self.get_by_id(entity.id());
        self.check_unique(&entity, existing)?;
        let replaced = existing.and_then(|key| self.remove(key));
        let key = self.insert(entity)?;
        Ok((key, replaced))
    }

    fn check_unique(&self, entity: &Entity, excluded: Option<EntityKey>) -> Result<(), StoreError> {
        for index in std::iter::once(&self.primary).chain(self.indexes.iter()) {
            if let Some(key) = index.conflict_excluding(entity, excluded) {
                return Err(StoreError::DuplicateKey {
                    store: self.name.clone(),
                    index: index.name().to_owned(),
                    key,
                });
            }
        }
        Ok(())
    }

    /// Remove an entity from the store and every index.
    ///
    /// Removing an absent key is a no-op returning `None`. The removed
    /// entity is also dropped from the neighbour sets of its neighbours.
    pub fn remove(&mut self, key: EntityKey) -> Option<Entity> {
        let entity = self.entities.remove(&key)?;
        self.primary.remove(key, &entity);
        for index in &mut self.indexes {
            index.remove(key, &entity);
        }
        if let Some(spatial) = &mut self.spatial {
            spatial.remove(key, entity.geometry());
        }
        for neighbour in &entity.neighbours {
            if let Some(other) = self.entities.get_mut(neighbour) {
                other.neighbours.remove(&key);
            }
        }
        debug!("store `{}`: removed {} ({key})", self.name, entity.id());
        Some(entity)
    }

    /// Look up an entity through the primary unique index.
    #[must_use]
    pub fn get_by_id(&self, id: &AttributeValue) -> Option<EntityKey> {
        self.primary.get_by_id(&IndexKey::from(id.clone()))
    }

    /// Return the named key index. [`PRIMARY_INDEX`] names the primary index.
    ///
    /// # Errors
    /// Returns [`StoreError::UnknownIndex`] when no such index is registered.
    pub fn index(&self, name: &str) -> Result<&KeyIndex, StoreError> {
        std::iter::once(&self.primary)
            .chain(self.indexes.iter())
            .find(|index| index.name() == name)
            .ok_or_else(|| StoreError::UnknownIndex {
                store: self.name.clone(),
                index: name.to_owned(),
            })
    }

    /// Entities filed under `key` in the named index, in insertion order.
    ///
    /// # Errors
    /// Returns [`StoreError::UnknownIndex`] when no such index is registered.
    pub fn get_by_key(&self, index: &str, key: &IndexKey) -> Result<&[EntityKey], StoreError> {
        Ok(self.index(index)?.get_by_key(key))
    }

    /// Entities whose key in the named index lies within `range`.
    ///
    /// # Errors
    /// Returns [`StoreError::UnknownIndex`] when no such index is registered.
    pub fn range(
        &self,
        index: &str,
        range: RangeInclusive<IndexKey>,
    ) -> Result<Vec<EntityKey>, StoreError> {
        Ok(self.index(index)?.range(range))
    }

    /// The spatial index, when one is registered.
    #[must_use]
    pub const fn spatial_index(&self) -> Option<&SpatialIndex> {
        self.spatial.as_ref()
    }

    /// Entities whose envelope intersects `rect`, ordered by key.
    ///
    /// # Errors
    /// Returns [`StoreError::MissingSpatialIndex`] without a spatial index.
    pub fn locate_in_envelope(&self, rect: &Rect<f64>) -> Result<Vec<EntityKey>, StoreError> {
        Ok(self.require_spatial()?.locate_in_envelope(rect))
    }

    /// Entities whose geometry intersects `geometry`, ordered by key.
    ///
    /// The index has no notion of "self": when `geometry` belongs to a stored
    /// entity, that entity is part of the result.
    ///
    /// # Errors
    /// Returns [`StoreError::MissingSpatialIndex`] without a spatial index.
    pub fn intersecting(&self, geometry: &Geometry<f64>) -> Result<Vec<EntityKey>, StoreError> {
        let spatial = self.require_spatial()?;
        let Some(rect) = geometry.bounding_rect() else {
            return Ok(Vec::new());
        };
        Ok(spatial
            .locate_in_envelope(&rect)
            .into_iter()
            .filter(|key| {
                self.entities
                    .get(key)
                    .is_some_and(|candidate| candidate.geometry().intersects(geometry))
            })
            .collect())
    }

    /// Replace an entity's geometry, keeping the spatial index consistent.
    ///
    /// Key extractors must not depend on geometry; key indexes are left as is.
    ///
    /// # Errors
    /// Returns [`StoreError::UnknownEntity`] when `key` is absent.
    pub fn replace_geometry(
        &mut self,
        key: EntityKey,
        geometry: Geometry<f64>,
    ) -> Result<(), StoreError> {
        let entity = self
            .entities
            .get_mut(&key)
            .ok_or_else(|| StoreError::UnknownEntity {
                store: self.name.clone(),
                key,
            })?;
        if let Some(spatial) = &mut self.spatial {
            spatial.remove(key, entity.geometry());
            spatial.insert(key, &geometry);
        }
        entity.set_geometry(geometry);
        Ok(())
    }

    /// Record a symmetric neighbour relationship.
    ///
    /// Returns `false` when the pair was already related or `a == b`.
    ///
    /// # Errors
    /// Returns [`StoreError::UnknownEntity`] when either key is absent.
    pub fn add_neighbours(&mut self, a: EntityKey, b: EntityKey) -> Result<bool, StoreError> {
        for key in [a, b] {
            if !self.entities.contains_key(&key) {
                return Err(StoreError::UnknownEntity {
                    store: self.name.clone(),
                    key,
                });
            }
        }
        if a == b {
            return Ok(false);
        }
        let mut added = false;
        if let Some(entity) = self.entities.get_mut(&a) {
            added = entity.neighbours.insert(b);
        }
        if let Some(entity) = self.entities.get_mut(&b) {
            added |= entity.neighbours.insert(a);
        }
        Ok(added)
    }

    /// Reset every match back-reference.
    pub fn clear_matches(&mut self) {
        for entity in self.entities.values_mut() {
            entity.match_id = None;
        }
    }

    pub(crate) fn set_match(&mut self, key: EntityKey, match_id: MatchId) {
        if let Some(entity) = self.entities.get_mut(&key) {
            entity.match_id = Some(match_id);
        }
    }

    fn require_spatial(&self) -> Result<&SpatialIndex, StoreError> {
        self.spatial
            .as_ref()
            .ok_or_else(|| StoreError::MissingSpatialIndex {
                store: self.name.clone(),
            })
    }
}
