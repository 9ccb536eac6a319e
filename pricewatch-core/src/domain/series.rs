//! Date-keyed value series.
//!
//! A `Series` is an ascending, gap-tolerant sequence of `DatedValue`s with at
//! most one value per calendar day. Missing days are simply absent.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// One observation on a calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatedValue {
    pub date: NaiveDate,
    pub value: f64,
}

impl DatedValue {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Identifier of a stored series (e.g. `crude_oil_barrel_usd`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesId(String);

impl SeriesId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SeriesId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SeriesId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Construction errors for `Series`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("series is not ascending: {next} follows {prev}")]
    Unordered { prev: NaiveDate, next: NaiveDate },

    #[error("duplicate date {0} in series")]
    DuplicateDate(NaiveDate),
}

/// Ascending, duplicate-free sequence of dated values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    points: Vec<DatedValue>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from points that must already be strictly ascending by date.
    pub fn from_points(points: Vec<DatedValue>) -> Result<Self, SeriesError> {
        for pair in points.windows(2) {
            let (prev, next) = (pair[0].date, pair[1].date);
            if prev == next {
                return Err(SeriesError::DuplicateDate(next));
            }
            if prev > next {
                return Err(SeriesError::Unordered { prev, next });
            }
        }
        Ok(Self { points })
    }

    /// Caller guarantees strict ascending order.
    pub(crate) fn from_sorted_unchecked(points: Vec<DatedValue>) -> Self {
        debug_assert!(points.windows(2).all(|w| w[0].date < w[1].date));
        Self { points }
    }

    /// Build from points in any order. Rejects two values on the same day.
    pub fn from_unsorted(mut points: Vec<DatedValue>) -> Result<Self, SeriesError> {
        points.sort_by_key(|p| p.date);
        Self::from_points(points)
    }

    /// Build from a date-keyed map; uniqueness and order come for free.
    pub fn from_map(map: BTreeMap<NaiveDate, f64>) -> Self {
        Self {
            points: map
                .into_iter()
                .map(|(date, value)| DatedValue { date, value })
                .collect(),
        }
    }

    pub fn points(&self) -> &[DatedValue] {
        &self.points
    }

    pub fn into_points(self) -> Vec<DatedValue> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DatedValue> {
        self.points.iter()
    }

    pub fn first(&self) -> Option<&DatedValue> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&DatedValue> {
        self.points.last()
    }

    /// The watermark: the latest date holding a value.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.points[i].value)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.get(date).is_some()
    }

    pub fn dates(&self) -> BTreeSet<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    /// Points strictly after `date`.
    pub fn after(&self, date: NaiveDate) -> &[DatedValue] {
        let start = self.points.partition_point(|p| p.date <= date);
        &self.points[start..]
    }

    /// Copy of the series without the given day.
    pub fn without(&self, date: NaiveDate) -> Series {
        Series {
            points: self.points.iter().copied().filter(|p| p.date != date).collect(),
        }
    }

    /// Copy of the series restricted to `[start, end)`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Series {
        Series {
            points: self
                .points
                .iter()
                .copied()
                .filter(|p| p.date >= start && p.date < end)
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a DatedValue;
    type IntoIter = std::slice::Iter<'a, DatedValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_dp(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn from_points_rejects_duplicates_and_disorder() {
        let dup = vec![
            DatedValue::new(d("2024-01-02"), 1.0),
            DatedValue::new(d("2024-01-02"), 2.0),
        ];
        assert_eq!(
            Series::from_points(dup),
            Err(SeriesError::DuplicateDate(d("2024-01-02")))
        );

        let unordered = vec![
            DatedValue::new(d("2024-01-03"), 1.0),
            DatedValue::new(d("2024-01-02"), 2.0),
        ];
        assert!(matches!(
            Series::from_points(unordered),
            Err(SeriesError::Unordered { .. })
        ));
    }

    #[test]
    fn from_unsorted_sorts() {
        let s = Series::from_unsorted(vec![
            DatedValue::new(d("2024-01-05"), 5.0),
            DatedValue::new(d("2024-01-01"), 1.0),
        ])
        .unwrap();
        assert_eq!(s.first().unwrap().date, d("2024-01-01"));
        assert_eq!(s.latest_date(), Some(d("2024-01-05")));
    }

    #[test]
    fn lookup_and_slicing() {
        let mut map = BTreeMap::new();
        map.insert(d("2024-01-01"), 1.0);
        map.insert(d("2024-01-03"), 3.0);
        map.insert(d("2024-01-07"), 7.0);
        let s = Series::from_map(map);

        assert_eq!(s.get(d("2024-01-03")), Some(3.0));
        assert_eq!(s.get(d("2024-01-02")), None);
        assert_eq!(s.after(d("2024-01-03")).len(), 1);
        assert_eq!(s.after(d("2023-12-31")).len(), 3);
        assert_eq!(s.without(d("2024-01-07")).len(), 2);
        assert_eq!(s.between(d("2024-01-01"), d("2024-01-07")).len(), 2);
    }

    #[test]
    fn round_dp_is_half_away_from_zero() {
        assert_eq!(round_dp(11.0 / 3.0, 4), 3.6667);
        assert_eq!(round_dp(0.25, 1), 0.3);
        assert_eq!(round_dp(-0.25, 1), -0.3);
        assert_eq!(round_dp(12.344, 2), 12.34);
    }
}
