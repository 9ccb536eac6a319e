//! History replay state machine.
//!
//! `Idle` → `Replaying` → `Done`, one calendar day per step. Each day is
//! evaluated at a fixed end-of-day cutoff: every entity's effective reading is
//! the latest qualifying snapshot strictly before that instant. The day's
//! global spread row and per-entity summary rows are offered to change-only
//! streams. Once the calendar is exhausted, entities that stopped reporting
//! get their terminal null row.

use super::overrides::Overrides;
use super::state::{EntityState, RollingState};
use super::stats::{metric_stats, spread};
use crate::domain::{
    ChangeStream, EntityId, EntitySnapshot, EntitySummary, EntityValues, SpreadValues,
};
use chrono::{Days, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Identifiers of log entries known to hold corrupted readings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadSnapshotSet(BTreeSet<String>);

impl BadSnapshotSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.0.insert(id.into())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.0.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for BadSnapshotSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayConfig {
    /// Only snapshots carrying this tag are replayed.
    pub authoritative_tag: String,
    /// End-of-day evaluation instant.
    pub cutoff: NaiveTime,
    pub bad_snapshots: BadSnapshotSet,
    pub overrides: Overrides,
    /// Last calendar day to evaluate; defaults to the last snapshot's day.
    pub through: Option<NaiveDate>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            authoritative_tag: "auto.prices.update".into(),
            cutoff: NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN),
            bad_snapshots: BadSnapshotSet::new(),
            overrides: Overrides::none(),
            through: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayPhase {
    Idle,
    /// `next` is the next calendar day to evaluate.
    Replaying { next: NaiveDate },
    Done,
}

/// Emitted streams plus bookkeeping of what was filtered out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayOutput {
    pub spread: ChangeStream<SpreadValues>,
    pub entities: BTreeMap<EntityId, ChangeStream<EntityValues>>,
    pub days: usize,
    pub non_authoritative: usize,
    pub bad: usize,
}

pub struct HistoryReplayer {
    config: ReplayConfig,
    state: RollingState,
    /// Entities evaluated each day: every logged entity plus bootstrapped ones.
    entities: BTreeSet<EntityId>,
    phase: ReplayPhase,
    first_day: Option<NaiveDate>,
    last_day: Option<NaiveDate>,
    output: ReplayOutput,
}

impl HistoryReplayer {
    pub fn new(snapshots: Vec<EntitySnapshot>, config: ReplayConfig) -> Self {
        let mut output = ReplayOutput::default();
        let mut arena = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            if snapshot.tag != config.authoritative_tag {
                output.non_authoritative += 1;
            } else if config.bad_snapshots.contains(&snapshot.id) {
                output.bad += 1;
            } else {
                arena.push(snapshot);
            }
        }
        // stable: equal timestamps keep log order
        arena.sort_by_key(|s| s.timestamp);

        let first_logged = arena.first().map(EntitySnapshot::date);
        let first_day = match (first_logged, config.overrides.earliest_bootstrap()) {
            (Some(logged), Some(boot)) => Some(logged.min(boot)),
            (logged, _) => logged,
        };
        let last_day = config.through.or(arena.last().map(EntitySnapshot::date));

        let state = RollingState::new(arena);
        let mut entities: BTreeSet<EntityId> = state.entities().cloned().collect();
        if first_day.is_some() {
            entities.extend(config.overrides.bootstrap.iter().map(|b| b.entity.clone()));
        }

        debug!(
            snapshots = state.arena().len(),
            non_authoritative = output.non_authoritative,
            bad = output.bad,
            "replay arena built"
        );

        Self {
            config,
            state,
            entities,
            phase: ReplayPhase::Idle,
            first_day,
            last_day,
            output,
        }
    }

    pub fn phase(&self) -> ReplayPhase {
        self.phase
    }

    /// Advance the state machine by one calendar day.
    ///
    /// Returns the day evaluated, or `None` once replay is done.
    pub fn step(&mut self) -> Option<NaiveDate> {
        let day = match self.phase {
            ReplayPhase::Idle => match self.first_day {
                Some(first) => first,
                None => {
                    self.finish();
                    return None;
                }
            },
            ReplayPhase::Replaying { next } => next,
            ReplayPhase::Done => return None,
        };
        if self.last_day.map_or(true, |last| day > last) {
            self.finish();
            return None;
        }

        self.evaluate(day);
        self.output.days += 1;
        self.phase = match day.checked_add_days(Days::new(1)) {
            Some(next) => ReplayPhase::Replaying { next },
            None => {
                self.finish();
                ReplayPhase::Done
            }
        };
        Some(day)
    }

    /// Replay every remaining day and hand over the streams.
    pub fn run(mut self) -> ReplayOutput {
        while self.step().is_some() {}
        info!(
            days = self.output.days,
            spread_rows = self.output.spread.len(),
            entities = self.output.entities.len(),
            "replay finished"
        );
        self.output
    }

    fn evaluate(&mut self, day: NaiveDate) {
        self.state.advance_to(day.and_time(self.config.cutoff));

        let mut primary = Vec::new();
        let mut secondary = Vec::new();

        for entity in &self.entities {
            let entity_state = self.state.state(entity);
            if let Some(reading) = entity_state.observed() {
                let p: Vec<f64> = reading.primary_values().collect();
                let s: Vec<f64> = reading.secondary_values().collect();
                primary.extend_from_slice(&p);
                secondary.extend_from_slice(&s);

                let summary = EntitySummary {
                    primary: metric_stats(&p),
                    secondary: metric_stats(&s),
                    unit_count: reading.unit_count(),
                };
                self.output
                    .entities
                    .entry(entity.clone())
                    .or_default()
                    .offer(day, Some(summary));
            } else if matches!(entity_state, EntityState::Unseen) {
                if let Some(boot) = self.config.overrides.bootstrap_for(entity, day) {
                    primary.push(boot.primary);
                    secondary.push(boot.secondary);
                }
            }
        }

        let values = SpreadValues {
            primary: spread(primary),
            secondary: spread(secondary),
        };
        if values.primary.is_some() || values.secondary.is_some() {
            self.output.spread.offer(day, values);
        }
    }

    /// Transition to `Done`, closing streams of entities that stopped reporting.
    fn finish(&mut self) {
        self.phase = ReplayPhase::Done;
        for entity in &self.entities {
            let EntityState::Stopped { since } = self.state.state(entity) else {
                continue;
            };
            let Some(stream) = self.output.entities.get_mut(entity) else {
                continue;
            };
            let date = self.config.overrides.terminal_date(entity).unwrap_or(since);
            if stream.last().is_some_and(|last| last.date >= date) {
                warn!(entity = %entity, %date, "terminal row not after last emitted row, skipped");
                continue;
            }
            stream.offer(date, None);
        }
    }
}

/// Replay a snapshot log under `config`.
pub fn replay(snapshots: Vec<EntitySnapshot>, config: ReplayConfig) -> ReplayOutput {
    HistoryReplayer::new(snapshots, config).run()
}
