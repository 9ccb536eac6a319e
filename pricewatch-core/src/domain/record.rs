//! Change-only output records.
//!
//! A `ChangeStream` accepts a candidate row per evaluation day and keeps it
//! only when its values differ field-wise from the last kept row, so no two
//! consecutive records of one stream are identical.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An emitted output row: a date plus the stream's value columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord<T> {
    pub date: NaiveDate,
    pub values: T,
}

/// Append-only, change-only sequence of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeStream<T> {
    records: Vec<ChangeRecord<T>>,
}

impl<T> Default for ChangeStream<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<T: PartialEq> ChangeStream<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the row unless it repeats the previous row's values.
    ///
    /// Returns `true` if the row was kept.
    pub fn offer(&mut self, date: NaiveDate, values: T) -> bool {
        if let Some(last) = self.records.last() {
            if last.values == values {
                return false;
            }
        }
        self.records.push(ChangeRecord { date, values });
        true
    }

    pub fn records(&self) -> &[ChangeRecord<T>] {
        &self.records
    }

    pub fn last(&self) -> Option<&ChangeRecord<T>> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Low / high / difference of one metric across all entities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spread {
    pub low: f64,
    pub high: f64,
    pub spread: f64,
}

/// Value columns of the global spread stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpreadValues {
    pub primary: Option<Spread>,
    pub secondary: Option<Spread>,
}

/// Summary statistics of one metric within one entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub low: f64,
    pub high: f64,
    pub mean: f64,
    pub mode: f64,
}

/// Value columns of a per-entity stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub primary: Option<MetricStats>,
    pub secondary: Option<MetricStats>,
    pub unit_count: usize,
}

/// Per-entity row values; `None` is the terminal closing marker.
pub type EntityValues = Option<EntitySummary>;
