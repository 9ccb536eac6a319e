//! Rolling per-entity state over a time-ordered snapshot arena.
//!
//! The arena holds every qualifying snapshot sorted by timestamp. Each entity
//! gets an index list of the snapshots that mention it and a cursor into
//! that list; cursors only move forward, so replaying the whole calendar is
//! a single ordered scan.

use crate::domain::{EntityId, EntityReading, EntitySnapshot};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

/// Effective state of one entity as of the last cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityState<'a> {
    /// No snapshot before the cutoff mentions the entity.
    Unseen,
    Reporting(&'a EntityReading),
    /// The latest snapshot carries the null placeholder.
    Stopped { since: NaiveDate },
}

impl<'a> EntityState<'a> {
    /// The reading, if the entity reports with at least one unit.
    pub fn observed(&self) -> Option<&'a EntityReading> {
        match self {
            EntityState::Reporting(r) if r.unit_count() > 0 => Some(r),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct EntityCursor {
    /// Arena indices of snapshots mentioning the entity, ascending.
    indices: Vec<usize>,
    /// Number of indices already consumed.
    consumed: usize,
}

impl EntityCursor {
    fn current(&self) -> Option<usize> {
        self.consumed.checked_sub(1).map(|k| self.indices[k])
    }
}

#[derive(Debug, Clone)]
pub struct RollingState {
    arena: Vec<EntitySnapshot>,
    cursors: BTreeMap<EntityId, EntityCursor>,
}

impl RollingState {
    /// `arena` must be sorted by timestamp.
    pub fn new(arena: Vec<EntitySnapshot>) -> Self {
        debug_assert!(arena.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        let mut cursors: BTreeMap<EntityId, EntityCursor> = BTreeMap::new();
        for (index, snapshot) in arena.iter().enumerate() {
            for entity in snapshot.readings.keys() {
                cursors.entry(entity.clone()).or_default().indices.push(index);
            }
        }
        Self { arena, cursors }
    }

    pub fn arena(&self) -> &[EntitySnapshot] {
        &self.arena
    }

    /// Entities mentioned anywhere in the arena, in key order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityId> {
        self.cursors.keys()
    }

    /// Consume, per entity, every snapshot strictly before `cutoff`.
    pub fn advance_to(&mut self, cutoff: NaiveDateTime) {
        let arena = &self.arena;
        for cursor in self.cursors.values_mut() {
            while cursor.consumed < cursor.indices.len()
                && arena[cursor.indices[cursor.consumed]].timestamp < cutoff
            {
                cursor.consumed += 1;
            }
        }
    }

    /// Timestamp of the snapshot the entity's state reflects.
    pub fn as_of(&self, entity: &str) -> Option<NaiveDateTime> {
        let index = self.cursors.get(entity)?.current()?;
        Some(self.arena[index].timestamp)
    }

    pub fn state(&self, entity: &str) -> EntityState<'_> {
        let Some(index) = self.cursors.get(entity).and_then(EntityCursor::current) else {
            return EntityState::Unseen;
        };
        let snapshot = &self.arena[index];
        match snapshot.readings.get(entity) {
            Some(Some(reading)) => EntityState::Reporting(reading),
            Some(None) => EntityState::Stopped {
                since: snapshot.date(),
            },
            // indices only hold snapshots mentioning the entity
            None => EntityState::Unseen,
        }
    }
}
