//! Store contract for reconciled series, plus an in-memory implementation.
//!
//! The store only answers watermark and membership queries and accepts
//! date-keyed upserts. Upserting a row whose date is already stored replaces
//! the value; the merger normally filters such rows out beforehand.

use super::merge::UpsertSet;
use crate::domain::{DatedValue, Series, SeriesId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Parquet error: {0}")]
    Parquet(String),

    #[error("corrupt partition for series '{series}': {reason}")]
    Corrupt { series: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Watermark and size of one stored series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesStatus {
    pub id: SeriesId,
    pub first_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
    pub row_count: usize,
}

pub trait Store {
    /// Last date holding a value, or `None` for an unknown/empty series.
    fn latest_date(&self, id: &SeriesId) -> Result<Option<NaiveDate>, StoreError>;

    /// Every stored date of a series.
    fn dates(&self, id: &SeriesId) -> Result<BTreeSet<NaiveDate>, StoreError> {
        Ok(self.load(id)?.dates())
    }

    /// Full series, ascending. Unknown series load as empty.
    fn load(&self, id: &SeriesId) -> Result<Series, StoreError>;

    /// Insert or replace rows by date. Atomic per call. Returns rows written.
    fn upsert(&mut self, id: &SeriesId, rows: &[DatedValue]) -> Result<usize, StoreError>;

    /// Ids of all series holding at least one row, sorted.
    fn series_ids(&self) -> Result<Vec<SeriesId>, StoreError>;

    /// Write both halves of an upsert set to their own series.
    fn upsert_set(
        &mut self,
        primary: &SeriesId,
        fallback: &SeriesId,
        set: &UpsertSet,
    ) -> Result<usize, StoreError> {
        let mut written = 0;
        if !set.primary.is_empty() {
            written += self.upsert(primary, &set.primary)?;
        }
        if !set.fallback.is_empty() {
            written += self.upsert(fallback, &set.fallback)?;
        }
        Ok(written)
    }

    fn status(&self, id: &SeriesId) -> Result<SeriesStatus, StoreError> {
        let series = self.load(id)?;
        Ok(SeriesStatus {
            id: id.clone(),
            first_date: series.first().map(|p| p.date),
            latest_date: series.latest_date(),
            row_count: series.len(),
        })
    }
}

/// Store held entirely in memory. Used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    series: BTreeMap<SeriesId, BTreeMap<NaiveDate, f64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a series, replacing whatever was stored under `id`.
    pub fn with_series(mut self, id: impl Into<SeriesId>, series: &Series) -> Self {
        self.series.insert(
            id.into(),
            series.iter().map(|p| (p.date, p.value)).collect(),
        );
        self
    }
}

impl Store for MemoryStore {
    fn latest_date(&self, id: &SeriesId) -> Result<Option<NaiveDate>, StoreError> {
        Ok(self
            .series
            .get(id)
            .and_then(|rows| rows.keys().next_back().copied()))
    }

    fn dates(&self, id: &SeriesId) -> Result<BTreeSet<NaiveDate>, StoreError> {
        Ok(self
            .series
            .get(id)
            .map(|rows| rows.keys().copied().collect())
            .unwrap_or_default())
    }

    fn load(&self, id: &SeriesId) -> Result<Series, StoreError> {
        Ok(self
            .series
            .get(id)
            .map(|rows| Series::from_map(rows.clone()))
            .unwrap_or_default())
    }

    fn upsert(&mut self, id: &SeriesId, rows: &[DatedValue]) -> Result<usize, StoreError> {
        let entry = self.series.entry(id.clone()).or_default();
        for row in rows {
            entry.insert(row.date, row.value);
        }
        Ok(rows.len())
    }

    fn series_ids(&self) -> Result<Vec<SeriesId>, StoreError> {
        Ok(self
            .series
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(id, _)| id.clone())
            .collect())
    }
}
