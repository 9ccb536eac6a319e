//! Per-day aggregate statistics over unit readings.

use crate::domain::{round_dp, MetricStats, Spread};

/// Lowest and highest value, plus their difference rounded to 1 decimal.
pub fn spread(values: impl IntoIterator<Item = f64>) -> Option<Spread> {
    let mut iter = values.into_iter();
    let first = iter.next()?;
    let (low, high) = iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
    Some(Spread {
        low,
        high,
        spread: round_dp(high - low, 1),
    })
}

/// Most frequent value. Ties go to the value encountered first.
pub fn mode(values: &[f64]) -> Option<f64> {
    // (value, count) in first-encounter order
    let mut counts: Vec<(f64, usize)> = Vec::new();
    for &v in values {
        match counts.iter_mut().find(|(seen, _)| *seen == v) {
            Some((_, n)) => *n += 1,
            None => counts.push((v, 1)),
        }
    }
    let mut best: Option<(f64, usize)> = None;
    for (v, n) in counts {
        if best.map_or(true, |(_, m)| n > m) {
            best = Some((v, n));
        }
    }
    best.map(|(v, _)| v)
}

/// Low, high, mean (1 decimal) and mode of a metric; `None` when no unit
/// reported it.
pub fn metric_stats(values: &[f64]) -> Option<MetricStats> {
    let range = spread(values.iter().copied())?;
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Some(MetricStats {
        low: range.low,
        high: range.high,
        mean: round_dp(mean, 1),
        mode: mode(values)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_tie_goes_to_first_encountered() {
        assert_eq!(mode(&[1.0, 2.0, 1.0, 2.0]), Some(1.0));
        assert_eq!(mode(&[2.0, 1.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(mode(&[3.0, 1.0, 1.0]), Some(1.0));
        assert_eq!(mode(&[]), None);
    }

    #[test]
    fn stats_round_mean_only() {
        let stats = metric_stats(&[199.9, 201.9, 199.9]).unwrap();
        assert_eq!(stats.low, 199.9);
        assert_eq!(stats.high, 201.9);
        assert_eq!(stats.mean, 200.6);
        assert_eq!(stats.mode, 199.9);
        assert_eq!(metric_stats(&[]), None);
    }

    #[test]
    fn spread_difference_is_rounded() {
        let s = spread([189.9, 205.4, 195.0]).unwrap();
        assert_eq!(s.low, 189.9);
        assert_eq!(s.high, 205.4);
        assert_eq!(s.spread, 15.5);
        assert_eq!(spread(std::iter::empty()), None);
    }
}
