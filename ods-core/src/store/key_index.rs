//! Attribute-keyed indexes over store entities.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::{Entity, EntityKey, IndexKey};

/// Derives the index key for an entity; `None` keeps the entity out of the index.
pub type KeyExtractor = fn(&Entity) -> Option<IndexKey>;

/// Whether a key index admits more than one entity per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uniqueness {
    /// At most one entity per key; inserts of a second entity fail.
    Unique,
    /// Any number of entities per key, kept in insertion order.
    NonUnique,
}

/// Index mapping attribute keys to the entities currently holding them.
///
/// Entries for one key are ordered by [`EntityKey`], which is insertion order
/// for the owning store. Keys are kept in a `BTreeMap` so range lookups are
/// supported for both single and composite keys.
#[derive(Debug, Clone)]
pub struct KeyIndex {
    name: String,
    uniqueness: Uniqueness,
    extractor: KeyExtractor,
    entries: BTreeMap<IndexKey, Vec<EntityKey>>,
}

impl KeyIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new(name: impl Into<String>, uniqueness: Uniqueness, extractor: KeyExtractor) -> Self {
        Self {
            name: name.into(),
            uniqueness,
            extractor,
            entries: BTreeMap::new(),
        }
    }

    /// Name used to look the index up on its store.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uniqueness policy of the index.
    #[must_use]
    pub const fn uniqueness(&self) -> Uniqueness {
        self.uniqueness
    }

    /// Key this index would file the entity under.
    #[must_use]
    pub fn key_for(&self, entity: &Entity) -> Option<IndexKey> {
        (self.extractor)(entity)
    }

    /// Return the key that would clash if `entity` were inserted.
    ///
    /// Always `None` for non-unique indexes.
    #[must_use]
    pub fn conflicting_key(&self, entity: &Entity) -> Option<IndexKey> {
        self.conflict_excluding(entity, None)
    }

    /// Like [`KeyIndex::conflicting_key`], ignoring entries held by `excluded`.
    pub(crate) fn conflict_excluding(
        &self,
        entity: &Entity,
        excluded: Option<EntityKey>,
    ) -> Option<IndexKey> {
        if self.uniqueness == Uniqueness::NonUnique {
            return None;
        }
        self.key_for(entity).filter(|key| {
            self.entries
                .get(key)
                .is_some_and(|keys| keys.iter().any(|held| Some(*held) != excluded))
        })
    }

    pub(crate) fn insert(&mut self, key: EntityKey, entity: &Entity) {
        let Some(index_key) = self.key_for(entity) else {
            return;
        };
        let keys = self.entries.entry(index_key).or_default();
        // Store keys grow monotonically, so pushing preserves ordering.
        keys.push(key);
    }

    pub(crate) fn remove(&mut self, key: EntityKey, entity: &Entity) {
        let Some(index_key) = self.key_for(entity) else {
            return;
        };
        if let Some(keys) = self.entries.get_mut(&index_key) {
            keys.retain(|candidate| *candidate != key);
            if keys.is_empty() {
                self.entries.remove(&index_key);
            }
        }
    }

    /// Single entity filed under `key`, for unique lookups.
    ///
    /// On a non-unique index this returns the first entity inserted.
    #[must_use]
    pub fn get_by_id(&self, key: &IndexKey) -> Option<EntityKey> {
        self.entries
            .get(key)
            .and_then(|keys| keys.first().copied())
    }

    /// All entities filed under `key`, in insertion order.
    #[must_use]
    pub fn get_by_key(&self, key: &IndexKey) -> &[EntityKey] {
        self.entries.get(key).map_or(&[], Vec::as_slice)
    }

    /// All entities whose key lies in `range`, ordered by key then insertion.
    #[must_use]
    pub fn range(&self, range: RangeInclusive<IndexKey>) -> Vec<EntityKey> {
        if range.start() > range.end() {
            return Vec::new();
        }
        self.entries
            .range(range)
            .flat_map(|(_, keys)| keys.iter().copied())
            .collect()
    }

    /// Whether `key` is filed under any index key.
    #[must_use]
    pub fn contains(&self, key: EntityKey) -> bool {
        self.entries.values().any(|keys| keys.contains(&key))
    }

    /// Number of distinct index keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AttributeValue;
    use geo::{Geometry, Point};
    use rstest::{fixture, rstest};

    fn by_reference(entity: &Entity) -> Option<IndexKey> {
        entity.reference_id().cloned().map(IndexKey::from)
    }

    fn entity(id: i64, reference: Option<i64>) -> Entity {
        let base = Entity::building(
            AttributeValue::from(id),
            Geometry::Point(Point::new(0.0, 0.0)),
        );
        match reference {
            Some(value) => base.with_reference_id(AttributeValue::from(value)),
            None => base,
        }
    }

    #[fixture]
    fn multi_index() -> KeyIndex {
        KeyIndex::new("reference", Uniqueness::NonUnique, by_reference)
    }

    #[rstest]
    fn keeps_insertion_order_per_key(mut multi_index: KeyIndex) {
        multi_index.insert(EntityKey(0), &entity(1, Some(100)));
        multi_index.insert(EntityKey(1), &entity(2, Some(100)));
        assert_eq!(
            multi_index.get_by_key(&IndexKey::single(100_i64)),
            &[EntityKey(0), EntityKey(1)]
        );
        assert_eq!(
            multi_index.get_by_id(&IndexKey::single(100_i64)),
            Some(EntityKey(0))
        );
    }

    #[rstest]
    fn skips_entities_without_a_key(mut multi_index: KeyIndex) {
        multi_index.insert(EntityKey(0), &entity(1, None));
        assert_eq!(multi_index.key_count(), 0);
        assert!(!multi_index.contains(EntityKey(0)));
    }

    #[rstest]
    fn remove_drops_empty_keys(mut multi_index: KeyIndex) {
        let item = entity(1, Some(5));
        multi_index.insert(EntityKey(3), &item);
        multi_index.remove(EntityKey(3), &item);
        assert_eq!(multi_index.key_count(), 0);
        assert!(multi_index.get_by_key(&IndexKey::single(5_i64)).is_empty());
    }

    #[rstest]
    fn range_spans_inclusive_bounds(mut multi_index: KeyIndex) {
        for (position, reference) in [10_i64, 20, 30, 40].into_iter().enumerate() {
            let key = EntityKey(u64::try_from(position).expect("small position"));
            multi_index.insert(key, &entity(reference, Some(reference)));
        }
        let found = multi_index.range(IndexKey::single(20_i64)..=IndexKey::single(30_i64));
        assert_eq!(found, vec![EntityKey(1), EntityKey(2)]);
        let inverted = multi_index.range(IndexKey::single(30_i64)..=IndexKey::single(20_i64));
        assert!(inverted.is_empty());
    }

    #[rstest]
    fn unique_index_reports_conflicts() {
        let mut index = KeyIndex::new("reference", Uniqueness::Unique, by_reference);
        index.insert(EntityKey(0), &entity(1, Some(7)));
        assert_eq!(
            index.conflicting_key(&entity(2, Some(7))),
            Some(IndexKey::single(7_i64))
        );
        assert_eq!(index.conflicting_key(&entity(3, Some(8))), None);
    }
}
