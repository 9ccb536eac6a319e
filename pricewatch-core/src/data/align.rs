//! Two-series time alignment.
//!
//! Pairs two independently dated, ascending series in a single forward pass
//! (two cursors, O(|A| + |B|)) and combines the paired values. A series with
//! no newer point holds its last value while the other one advances, and
//! each emitted point is dated at the later of the two paired dates, the day
//! on which both values are known.

use crate::domain::{round_dp, DatedValue, Series};
use chrono::NaiveDate;
use thiserror::Error;

/// Failure of a combine function on one pair of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CombineError {
    #[error("division by zero")]
    DivisionByZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AlignError {
    #[error("division by zero at {date}: denominator series is 0")]
    DivisionByZero { date: NaiveDate },
}

/// Align `a` with `b`, combining each paired `(a, b)` value.
///
/// Cursor rules, applied until either cursor runs off its series:
/// - If one side is behind and its next point is still not later than the
///   other side's current date, advance it without emitting (catch-up).
/// - Otherwise emit `combine(a, b)` dated `max(a.date, b.date)`.
/// - Then advance `j` if `a` is at its last point, else `i` if `b` is at its
///   last point, else `i` when `A[i+1]` is strictly earlier than `B[j+1]`,
///   otherwise `j`.
///
/// The catch-up also applies to `b`, which goes beyond an `a`-only
/// catch-up. It only fires while `b` starts before `a`, and there it changes
/// the output. Leading `b` points dated before `a[0]` collapse into a single
/// point on `a[0]`'s date that pairs `a[0]` with the last of them. An
/// `a`-only catch-up would emit one point per leading `b` point, all dated
/// `a[0]`. Inputs where `b` does not start first align identically.
pub fn align<F>(a: &Series, b: &Series, mut combine: F) -> Result<Series, AlignError>
where
    F: FnMut(f64, f64) -> Result<f64, CombineError>,
{
    let (a, b) = (a.points(), b.points());
    let (mut i, mut j) = (0usize, 0usize);
    let mut out: Vec<DatedValue> = Vec::with_capacity(a.len().max(b.len()));

    while i < a.len() && j < b.len() {
        let (pa, pb) = (a[i], b[j]);

        if pa.date < pb.date && i + 1 < a.len() && a[i + 1].date <= pb.date {
            i += 1;
            continue;
        }
        if pb.date < pa.date && j + 1 < b.len() && b[j + 1].date <= pa.date {
            j += 1;
            continue;
        }

        let date = pa.date.max(pb.date);
        let value = combine(pa.value, pb.value).map_err(|e| match e {
            CombineError::DivisionByZero => AlignError::DivisionByZero { date },
        })?;
        out.push(DatedValue { date, value });

        if i + 1 >= a.len() {
            j += 1;
        } else if j + 1 >= b.len() {
            i += 1;
        } else if a[i + 1].date < b[j + 1].date {
            i += 1;
        } else {
            j += 1;
        }
    }

    Ok(Series::from_sorted_unchecked(out))
}

/// `a / b` rounded half away from zero to `decimals` places.
///
/// Inputs are used as stored; no precision is recovered.
pub fn ratio(decimals: u32) -> impl Fn(f64, f64) -> Result<f64, CombineError> {
    move |a, b| {
        if b == 0.0 {
            return Err(CombineError::DivisionByZero);
        }
        Ok(round_dp(a / b, decimals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn series(points: &[(&str, f64)]) -> Series {
        Series::from_points(
            points
                .iter()
                .map(|(date, v)| DatedValue::new(d(date), *v))
                .collect(),
        )
        .unwrap()
    }

    fn pairs(s: &Series) -> Vec<(NaiveDate, f64)> {
        s.iter().map(|p| (p.date, p.value)).collect()
    }

    #[test]
    fn ratio_rounds_to_four_places() {
        assert_eq!(ratio(4)(11.0, 3.0), Ok(3.6667));
        assert_eq!(ratio(4)(1.0, 0.0), Err(CombineError::DivisionByZero));
    }

    #[test]
    fn dense_a_catches_up_to_b() {
        let a = series(&[
            ("2020-01-01", 10.0),
            ("2020-01-02", 12.0),
            ("2020-01-03", 14.0),
            ("2020-01-06", 16.0),
        ]);
        let b = series(&[("2020-01-03", 2.0), ("2020-01-07", 4.0)]);

        let out = align(&a, &b, ratio(4)).unwrap();
        assert_eq!(
            pairs(&out),
            vec![
                (d("2020-01-03"), 7.0),
                (d("2020-01-06"), 8.0),
                (d("2020-01-07"), 4.0),
            ]
        );
    }

    #[test]
    fn a_value_is_held_until_its_next_point() {
        let a = series(&[("2020-01-01", 10.0), ("2020-01-05", 20.0)]);
        let b = series(&[("2020-01-03", 5.0)]);

        let out = align(&a, &b, ratio(4)).unwrap();
        // 10 is held through 01-03; b's single point is then held for 01-05.
        assert_eq!(
            pairs(&out),
            vec![(d("2020-01-03"), 2.0), (d("2020-01-05"), 4.0)]
        );
    }

    #[test]
    fn b_value_is_held_while_a_advances() {
        let a = series(&[
            ("2020-01-02", 10.0),
            ("2020-01-03", 11.0),
            ("2020-01-04", 12.0),
        ]);
        let b = series(&[("2020-01-01", 2.0)]);

        let out = align(&a, &b, |x, y| Ok(x - y)).unwrap();
        assert_eq!(
            pairs(&out),
            vec![
                (d("2020-01-02"), 8.0),
                (d("2020-01-03"), 9.0),
                (d("2020-01-04"), 10.0),
            ]
        );
    }

    #[test]
    fn equal_next_dates_emit_once() {
        let a = series(&[("2020-01-01", 1.0), ("2020-01-03", 3.0), ("2020-01-05", 5.0)]);
        let b = series(&[("2020-01-02", 1.0), ("2020-01-03", 1.0), ("2020-01-06", 1.0)]);

        let out = align(&a, &b, ratio(4)).unwrap();
        let dates: Vec<_> = out.iter().map(|p| p.date).collect();
        assert_eq!(
            dates,
            vec![d("2020-01-02"), d("2020-01-03"), d("2020-01-05"), d("2020-01-06")]
        );
        assert_eq!(out.get(d("2020-01-03")), Some(3.0));
    }

    #[test]
    fn leading_b_points_collapse_onto_first_a_date() {
        let a = series(&[("2020-01-05", 10.0)]);
        let b = series(&[("2020-01-01", 1.0), ("2020-01-02", 2.0), ("2020-01-03", 5.0)]);

        let out = align(&a, &b, ratio(4)).unwrap();
        assert_eq!(pairs(&out), vec![(d("2020-01-05"), 2.0)]);
    }

    #[test]
    fn zero_denominator_reports_the_date() {
        let a = series(&[("2020-01-01", 1.0), ("2020-01-02", 1.0)]);
        let b = series(&[("2020-01-01", 1.0), ("2020-01-02", 0.0)]);

        let err = align(&a, &b, ratio(4)).unwrap_err();
        assert_eq!(err, AlignError::DivisionByZero { date: d("2020-01-02") });
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let a = series(&[("2020-01-01", 1.0)]);
        let out = align(&a, &Series::new(), ratio(4)).unwrap();
        assert!(out.is_empty());
    }
}
