//! Source adapter traits and structured error types.
//!
//! Adapters turn an external source (bank rate tables, commodity feeds,
//! retail price exports) into date-keyed data. The reconciliation engine only
//! sees these traits, so adapters can be swapped or mocked in tests.

use super::watermark::FetchRange;
use crate::domain::Series;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Structured error types for adapter operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("source '{source_name}' unreachable: {reason}")]
    Unreachable { source_name: String, reason: String },

    #[error("response format changed in '{source_name}': {reason}")]
    ResponseFormatChanged { source_name: String, reason: String },

    #[error("malformed row {row} in '{source_name}': {reason}")]
    MalformedRow {
        source_name: String,
        row: usize,
        reason: String,
    },

    #[error("duplicate date {date} returned by '{source_name}'")]
    DuplicateDate { source_name: String, date: NaiveDate },

    #[error("I/O error reading '{source_name}': {reason}")]
    Io { source_name: String, reason: String },
}

/// Exchange rate of the home currency against one foreign currency.
///
/// Some sources only publish the mid rate; buy and sell are then absent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    pub buy: Option<f64>,
    pub sell: Option<f64>,
    pub mean: f64,
}

impl RateQuote {
    pub fn mean_only(mean: f64) -> Self {
        Self {
            buy: None,
            sell: None,
            mean,
        }
    }
}

/// Rates per day, per lower-case currency code.
pub type RateTable = BTreeMap<NaiveDate, BTreeMap<String, RateQuote>>;

/// A single-valued daily series source (commodity price, retail price).
///
/// Implementations must fail on transport errors instead of returning
/// partial data.
pub trait SeriesSource {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch all values dated inside `range`.
    fn fetch(&self, range: FetchRange) -> Result<Series, DataError>;
}

/// A multi-currency exchange rate source.
pub trait RateSource {
    fn name(&self) -> &str;

    fn fetch(&self, range: FetchRange) -> Result<RateTable, DataError>;
}
