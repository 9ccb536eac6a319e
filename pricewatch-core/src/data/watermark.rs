//! Watermark planning: how much of a source still needs fetching.
//!
//! Given the last stored date of a series and the current day, the planner
//! either skips the fetch (data is current through yesterday, and today's
//! value may still be incomplete) or returns the range to request. The range
//! starts at the watermark itself; re-requesting that day is harmless because
//! merging is keyed by date.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("clock skew: last stored date {last_stored} is after {as_of}")]
    ClockSkew {
        last_stored: NaiveDate,
        as_of: NaiveDate,
    },
}

/// Half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FetchRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

/// Outcome of planning one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchPlan {
    /// Store is current through yesterday.
    Skip,
    /// Request this range from the source.
    Fetch(FetchRange),
}

impl FetchPlan {
    pub fn is_skip(&self) -> bool {
        matches!(self, FetchPlan::Skip)
    }

    pub fn range(&self) -> Option<FetchRange> {
        match self {
            FetchPlan::Skip => None,
            FetchPlan::Fetch(range) => Some(*range),
        }
    }
}

/// Planner for one source, parameterized by the source's earliest date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkPlanner {
    earliest: NaiveDate,
}

impl WatermarkPlanner {
    pub fn new(earliest: NaiveDate) -> Self {
        Self { earliest }
    }

    pub fn earliest(&self) -> NaiveDate {
        self.earliest
    }

    /// Plan the fetch for a series whose watermark is `last_stored`.
    pub fn plan(
        &self,
        last_stored: Option<NaiveDate>,
        as_of: NaiveDate,
    ) -> Result<FetchPlan, PlanError> {
        let Some(last) = last_stored else {
            return Ok(FetchPlan::Fetch(FetchRange::new(self.earliest, as_of)));
        };
        if as_of < last {
            return Err(PlanError::ClockSkew {
                last_stored: last,
                as_of,
            });
        }
        if as_of.checked_sub_days(Days::new(1)) == Some(last) {
            return Ok(FetchPlan::Skip);
        }
        Ok(FetchPlan::Fetch(FetchRange::new(last, as_of)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn empty_store_requests_full_history() {
        let planner = WatermarkPlanner::new(d("1987-05-20"));
        let plan = planner.plan(None, d("2023-05-11")).unwrap();
        assert_eq!(
            plan,
            FetchPlan::Fetch(FetchRange::new(d("1987-05-20"), d("2023-05-11")))
        );
    }

    #[test]
    fn current_through_yesterday_skips() {
        let planner = WatermarkPlanner::new(d("1987-05-20"));
        let plan = planner.plan(Some(d("2023-05-10")), d("2023-05-11")).unwrap();
        assert!(plan.is_skip());
    }

    #[test]
    fn stale_watermark_rerequests_last_day() {
        let planner = WatermarkPlanner::new(d("1987-05-20"));
        let plan = planner.plan(Some(d("2023-05-05")), d("2023-05-11")).unwrap();
        let range = plan.range().unwrap();
        assert_eq!(range.start, d("2023-05-05"));
        assert_eq!(range.end, d("2023-05-11"));
        assert!(range.contains(d("2023-05-05")));
        assert!(!range.contains(d("2023-05-11")));
    }

    #[test]
    fn watermark_on_as_of_yields_empty_range() {
        let planner = WatermarkPlanner::new(d("1987-05-20"));
        let plan = planner.plan(Some(d("2023-05-11")), d("2023-05-11")).unwrap();
        assert!(plan.range().unwrap().is_empty());
    }

    #[test]
    fn future_watermark_is_clock_skew() {
        let planner = WatermarkPlanner::new(d("1987-05-20"));
        let err = planner.plan(Some(d("2023-05-12")), d("2023-05-11")).unwrap_err();
        assert_eq!(
            err,
            PlanError::ClockSkew {
                last_stored: d("2023-05-12"),
                as_of: d("2023-05-11"),
            }
        );
    }
}
