//! Reference-id reconciliation between an open data store and a current store.
//!
//! The [`Matcher`] pairs entities that carry the same integer reference id.
//! Every entity of either store ends up in exactly one bucket of the
//! [`MatchOutcome`]: a [`Match`], the unmatched open data list, the unmatched
//! current list, or the unidentified current list.

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, error, info};
use thiserror::Error;

use crate::store::REFERENCE_INDEX;
use crate::{AttributeValue, Entity, EntityKey, EntityStore, IndexKey, StoreError};

/// Identifier of a [`Match`] within one [`MatchOutcome`].
///
/// Ids are allocated sequentially in creation order, starting at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchId(u64);

impl MatchId {
    /// Raw numeric value of the id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "match {}", self.0)
    }
}

/// Entities of both stores sharing one reference id.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Match {
    /// Identifier of this match.
    pub id: MatchId,
    /// Reference id shared by every member.
    pub reference_id: i64,
    /// Current-side members, in insertion order.
    pub current: Vec<EntityKey>,
    /// Open-data-side members, in insertion order.
    pub open_data: Vec<EntityKey>,
}

/// Result of one [`Matcher::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MatchOutcome {
    /// Matches in creation order.
    pub matches: Vec<Match>,
    /// Open data entities without a current counterpart.
    pub unmatched_open_data: Vec<EntityKey>,
    /// Current entities with a reference id but no open data counterpart.
    pub unmatched_current: Vec<EntityKey>,
    /// Current entities without a usable reference id.
    pub unidentified_current: Vec<EntityKey>,
}

impl MatchOutcome {
    /// Look up a match by id.
    #[must_use]
    pub fn get(&self, id: MatchId) -> Option<&Match> {
        usize::try_from(id.0)
            .ok()
            .and_then(|position| self.matches.get(position))
    }

    /// Look up the match for a reference id.
    #[must_use]
    pub fn match_for_reference(&self, reference_id: i64) -> Option<&Match> {
        self.matches
            .iter()
            .find(|candidate| candidate.reference_id == reference_id)
    }
}

/// Errors raised while matching.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MatchError {
    /// A store lacks the reference id index the matcher looks entities up by.
    #[error("store `{store}` has no `reference_id` index")]
    MissingReferenceIndex {
        /// Store missing the index.
        store: String,
    },
    /// An entity was about to join a second match.
    #[error("entity {id} ({key}) in store `{store}` is attached to {existing}, cannot attach to {conflicting}")]
    AlreadyAttached {
        /// Store owning the entity.
        store: String,
        /// Store key of the offending entity.
        key: EntityKey,
        /// Primary id of the offending entity.
        id: AttributeValue,
        /// Match the entity already belongs to.
        existing: MatchId,
        /// Match the entity was about to join.
        conflicting: MatchId,
    },
    /// A store lookup failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Pairs open data entities with current entities by reference id.
///
/// # Examples
/// ```
/// use geo::{Geometry, Point};
/// use ods_core::{AttributeValue, Entity, EntityStore, Matcher};
///
/// let mut open_data = EntityStore::builder("open data").with_reference_index().build();
/// let mut current = EntityStore::builder("current").with_reference_index().build();
/// let point = Geometry::Point(Point::new(0.0, 0.0));
/// open_data
///     .insert(Entity::building("a1".into(), point.clone()).with_reference_id(100_i64.into()))
///     .expect("insert");
/// current
///     .insert(Entity::building("b1".into(), point).with_reference_id(100_i64.into()))
///     .expect("insert");
///
/// let outcome = Matcher::new().run(&mut open_data, &mut current).expect("match");
/// assert_eq!(outcome.matches.len(), 1);
/// assert!(outcome.match_for_reference(100).is_some());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Matcher;

impl Matcher {
    /// Create a matcher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Match every entity of `open_data` against `current`.
    ///
    /// Stale match back-references in both stores are cleared first, so two
    /// runs over unchanged stores yield identical outcomes.
    ///
    /// # Errors
    /// Returns [`MatchError::MissingReferenceIndex`] when either store lacks
    /// the reference index, and [`MatchError::AlreadyAttached`] when an
    /// entity would join two matches. The run aborts on the first error.
    pub fn run(
        &self,
        open_data: &mut EntityStore,
        current: &mut EntityStore,
    ) -> Result<MatchOutcome, MatchError> {
        require_reference_index(open_data)?;
        require_reference_index(current)?;
        open_data.clear_matches();
        current.clear_matches();

        let mut run = MatchRun::default();

        let open_keys: Vec<EntityKey> = open_data.keys().collect();
        for key in open_keys {
            let Some(reference_id) = integer_reference(open_data, key) else {
                run.outcome.unmatched_open_data.push(key);
                continue;
            };
            if let Some(&position) = run.by_reference.get(&reference_id) {
                if let Some(existing) = run.outcome.matches.get_mut(position) {
                    attach(open_data, key, existing.id, &mut existing.open_data)?;
                }
                continue;
            }
            let current_keys = lookup(current, reference_id)?;
            if current_keys.is_empty() {
                run.outcome.unmatched_open_data.push(key);
                continue;
            }
            let mut created = run.start(reference_id);
            for current_key in current_keys {
                attach(current, current_key, created.id, &mut created.current)?;
            }
            attach(open_data, key, created.id, &mut created.open_data)?;
            run.finish(created);
        }

        let current_keys: Vec<EntityKey> = current.keys().collect();
        for key in current_keys {
            let Some(reference_id) = integer_reference(current, key) else {
                run.outcome.unidentified_current.push(key);
                continue;
            };
            if run.by_reference.contains_key(&reference_id) {
                continue;
            }
            let open_keys = lookup(open_data, reference_id)?;
            if open_keys.is_empty() {
                run.outcome.unmatched_current.push(key);
                continue;
            }
            let mut created = run.start(reference_id);
            for current_key in lookup(current, reference_id)? {
                attach(current, current_key, created.id, &mut created.current)?;
            }
            for open_key in open_keys {
                attach(open_data, open_key, created.id, &mut created.open_data)?;
            }
            run.finish(created);
        }

        info!(
            "matched {} reference ids; {} open data and {} current entities unmatched, {} unidentified",
            run.outcome.matches.len(),
            run.outcome.unmatched_open_data.len(),
            run.outcome.unmatched_current.len(),
            run.outcome.unidentified_current.len(),
        );
        Ok(run.outcome)
    }
}

#[derive(Debug, Default)]
struct MatchRun {
    outcome: MatchOutcome,
    by_reference: BTreeMap<i64, usize>,
}

impl MatchRun {
    fn start(&self, reference_id: i64) -> Match {
        let next = u64::try_from(self.outcome.matches.len()).unwrap_or(u64::MAX);
        Match {
            id: MatchId(next),
            reference_id,
            current: Vec::new(),
            open_data: Vec::new(),
        }
    }

    fn finish(&mut self, created: Match) {
        debug!(
            "{} for reference id {}: {} current, {} open data",
            created.id,
            created.reference_id,
            created.current.len(),
            created.open_data.len()
        );
        self.by_reference
            .insert(created.reference_id, self.outcome.matches.len());
        self.outcome.matches.push(created);
    }
}

fn require_reference_index(store: &EntityStore) -> Result<(), MatchError> {
    store
        .index(REFERENCE_INDEX)
        .map(|_| ())
        .map_err(|_| MatchError::MissingReferenceIndex {
            store: store.name().to_owned(),
        })
}

fn integer_reference(store: &EntityStore, key: EntityKey) -> Option<i64> {
    store
        .get(key)
        .and_then(Entity::reference_id)
        .and_then(AttributeValue::as_integer)
}

fn lookup(store: &EntityStore, reference_id: i64) -> Result<Vec<EntityKey>, MatchError> {
    Ok(store
        .get_by_key(REFERENCE_INDEX, &IndexKey::single(reference_id))?
        .to_vec())
}

fn attach(
    store: &mut EntityStore,
    key: EntityKey,
    match_id: MatchId,
    members: &mut Vec<EntityKey>,
) -> Result<(), MatchError> {
    let Some(entity) = store.get(key) else {
        return Ok(());
    };
    match entity.match_id() {
        Some(existing) if existing == match_id => return Ok(()),
        Some(existing) => {
            let err = MatchError::AlreadyAttached {
                store: store.name().to_owned(),
                key,
                id: entity.id().clone(),
                existing,
                conflicting: match_id,
            };
            error!("{err}");
            return Err(err);
        }
        None => {}
    }
    store.set_match(key, match_id);
    members.push(key);
    Ok(())
}
