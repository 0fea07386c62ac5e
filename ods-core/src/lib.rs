//! Core reconciliation engine for open data buildings.
//!
//! The crate holds no I/O. It provides the in-memory [`EntityStore`] with its
//! key and spatial indexes, the [`Matcher`] that pairs open data entities with
//! current entities by reference id, and the [`BuildingAligner`] that records
//! neighbours and repairs shared building boundaries.
//!
//! # Examples
//!
//! ```
//! use geo::{Geometry, Point};
//! use ods_core::{AttributeValue, Entity, EntityStore};
//!
//! let mut store = EntityStore::builder("buildings").with_spatial_index().build();
//! let key = store
//!     .insert(Entity::building(AttributeValue::from(1_i64), Geometry::Point(Point::new(0.0, 0.0))))
//!     .expect("unique id");
//! assert_eq!(store.get_by_id(&AttributeValue::from(1_i64)), Some(key));
//! ```

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod align;
mod entity;
mod matcher;
mod store;
mod value;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use align::{AlignError, AlignReport, BuildingAligner};
pub use entity::{
    Address, BuildingAttributes, Entity, EntityAttributes, EntityKey, EntityKind, Tags,
};
pub use matcher::{Match, MatchError, MatchId, MatchOutcome, Matcher};
pub use store::{
    ADDRESS_INDEX, EntityStore, EntityStoreBuilder, KeyExtractor, KeyIndex, PRIMARY_INDEX,
    REFERENCE_INDEX, SpatialIndex, StoreError, Uniqueness, expand_rect,
};
pub use value::{AttributeValue, IndexKey};
