//! Primary/fallback source merging.
//!
//! A primary and a fallback source are merged into two *parallel* upsert
//! sets; their values are never mixed within one row. The fallback only
//! matters downstream, where `fill_beyond` appends fallback values dated
//! after the primary series ends.

use super::watermark::FetchRange;
use crate::domain::{DatedValue, Series};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("source '{source_name}' returned no rows for [{start}, {end})")]
    EmptySource {
        source_name: String,
        start: NaiveDate,
        end: NaiveDate,
    },
}

/// What one source returned, plus the context needed to merge it.
#[derive(Debug, Clone, Copy)]
pub struct SourceBatch<'a> {
    /// Source name, for error reporting.
    pub source: &'a str,
    /// Range that was requested from the source.
    pub requested: FetchRange,
    /// The rows the source returned.
    pub series: &'a Series,
    /// Dates already persisted for this source's series.
    pub existing: &'a BTreeSet<NaiveDate>,
}

/// New rows to persist, per series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertSet {
    pub primary: Vec<DatedValue>,
    pub fallback: Vec<DatedValue>,
}

impl UpsertSet {
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.fallback.is_empty()
    }

    pub fn len(&self) -> usize {
        self.primary.len() + self.fallback.len()
    }
}

/// Merges source batches into upsert sets, never persisting `today`.
#[derive(Debug, Clone, Copy)]
pub struct SourceMerger {
    today: NaiveDate,
}

impl SourceMerger {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    /// Merge a primary batch and an optional fallback batch.
    ///
    /// Both batches are validated before anything is returned, so a failing
    /// fallback never leaves a half-built upsert set behind.
    pub fn merge(
        &self,
        primary: SourceBatch<'_>,
        fallback: Option<SourceBatch<'_>>,
    ) -> Result<UpsertSet, MergeError> {
        let primary_rows = self.new_rows(primary)?;
        let fallback_rows = match fallback {
            Some(batch) => self.new_rows(batch)?,
            None => Vec::new(),
        };
        Ok(UpsertSet {
            primary: primary_rows,
            fallback: fallback_rows,
        })
    }

    /// Rows of one batch that are neither today's nor already persisted.
    pub fn new_rows(&self, batch: SourceBatch<'_>) -> Result<Vec<DatedValue>, MergeError> {
        if batch.series.is_empty() && !batch.requested.is_empty() {
            return Err(MergeError::EmptySource {
                source_name: batch.source.to_string(),
                start: batch.requested.start,
                end: batch.requested.end,
            });
        }
        let rows: Vec<DatedValue> = batch
            .series
            .iter()
            .filter(|p| p.date != self.today && !batch.existing.contains(&p.date))
            .copied()
            .collect();
        debug!(
            source = batch.source,
            returned = batch.series.len(),
            new = rows.len(),
            "merged source batch"
        );
        Ok(rows)
    }
}

/// Primary values, followed by fallback values dated after the primary ends.
pub fn fill_beyond(primary: &Series, fallback: &Series) -> Series {
    let tail = match primary.latest_date() {
        Some(last) => fallback.after(last),
        None => fallback.points(),
    };
    let mut points = primary.points().to_vec();
    points.extend_from_slice(tail);
    // Primary is ascending and the tail is strictly after its last date.
    Series::from_sorted_unchecked(points)
}
