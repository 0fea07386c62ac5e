//! R\*-tree index over entity envelopes.
//!
//! The tree only holds bounding envelopes; callers that need exact
//! intersection semantics refine the candidates against the entity
//! geometries, as [`EntityStore::intersecting`](crate::EntityStore::intersecting) does.

use geo::{BoundingRect, Coord, Geometry, Rect};
use rstar::{AABB, RTree, RTreeObject};

use crate::EntityKey;

/// Entry stored inside the R\*-tree.
#[derive(Debug, Clone, PartialEq)]
struct IndexedEnvelope {
    key: EntityKey,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Geometry-keyed index over the entities of one store.
///
/// # Examples
/// ```
/// use geo::{Coord, Rect};
/// use ods_core::SpatialIndex;
///
/// let index = SpatialIndex::new();
/// let area = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 });
/// assert!(index.locate_in_envelope(&area).is_empty());
/// ```
#[derive(Debug, Default)]
pub struct SpatialIndex {
    tree: RTree<IndexedEnvelope>,
}

impl SpatialIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether no entity is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Whether `key` is indexed.
    #[must_use]
    pub fn contains(&self, key: EntityKey) -> bool {
        self.tree.iter().any(|entry| entry.key == key)
    }

    /// Entities whose envelope intersects `rect`, ordered by key.
    ///
    /// Boundary contact counts as intersection.
    #[must_use]
    pub fn locate_in_envelope(&self, rect: &Rect<f64>) -> Vec<EntityKey> {
        let envelope = aabb_from_rect(rect);
        let mut keys: Vec<EntityKey> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.key)
            .collect();
        // The tree yields entries in node order; sort for reproducible results.
        keys.sort_unstable();
        keys
    }

    pub(crate) fn insert(&mut self, key: EntityKey, geometry: &Geometry<f64>) {
        if let Some(envelope) = envelope_of(geometry) {
            self.tree.insert(IndexedEnvelope { key, envelope });
        }
    }

    pub(crate) fn remove(&mut self, key: EntityKey, geometry: &Geometry<f64>) {
        if let Some(envelope) = envelope_of(geometry) {
            let _removed = self.tree.remove(&IndexedEnvelope { key, envelope });
        }
    }
}

fn envelope_of(geometry: &Geometry<f64>) -> Option<AABB<[f64; 2]>> {
    geometry.bounding_rect().map(|rect| aabb_from_rect(&rect))
}

fn aabb_from_rect(rect: &Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

/// Grow `rect` by `margin` on every side.
#[expect(
    clippy::float_arithmetic,
    reason = "envelope widening works directly on projected coordinates"
)]
#[must_use]
pub fn expand_rect(rect: &Rect<f64>, margin: f64) -> Rect<f64> {
    Rect::new(
        Coord {
            x: rect.min().x - margin,
            y: rect.min().y - margin,
        },
        Coord {
            x: rect.max().x + margin,
            y: rect.max().y + margin,
        },
    )
}
