//! Unit and currency conversion of commodity prices.
//!
//! Crude oil is quoted in USD per barrel; the derived stream is ISK per
//! litre, using the latest exchange rate published on or before each price
//! date.

use crate::domain::{round_dp, DatedValue, Series};
use chrono::NaiveDate;
use thiserror::Error;

/// Litres in one US oil barrel.
pub const LITRES_PER_BARREL: f64 = 158.987294928;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("no exchange rate on or before {date}")]
    NoRateAsOf { date: NaiveDate },
}

/// The rate used for conversion on each published day: sell when the bank
/// published a non-zero sell rate, otherwise the mean rate.
pub fn effective_rates(sell: &Series, mean: &Series) -> Series {
    let points = mean
        .iter()
        .map(|p| match sell.get(p.date) {
            Some(s) if s != 0.0 => DatedValue::new(p.date, s),
            _ => *p,
        })
        .collect();
    Series::from_sorted_unchecked(points)
}

/// Convert a USD/barrel series into ISK/litre, rounded to 2 decimals.
///
/// `rates` is walked with one forward cursor, so the whole conversion is a
/// single pass over both series.
pub fn barrel_usd_to_litre_isk(
    prices: &Series,
    rates: &Series,
    litres_per_barrel: f64,
) -> Result<Series, ConvertError> {
    let rates = rates.points();
    let mut cursor = 0usize;
    let mut out = Vec::with_capacity(prices.len());

    for p in prices {
        while cursor < rates.len() && rates[cursor].date <= p.date {
            cursor += 1;
        }
        // cursor now points one past the latest rate on or before p.date
        let Some(rate) = cursor.checked_sub(1).map(|k| rates[k].value) else {
            return Err(ConvertError::NoRateAsOf { date: p.date });
        };
        out.push(DatedValue::new(
            p.date,
            round_dp(p.value * rate / litres_per_barrel, 2),
        ));
    }

    Ok(Series::from_sorted_unchecked(out))
}
