//! Canonical stored-series identifiers and output stream names.

use pricewatch_core::domain::SeriesId;

pub const CRUDE_PRIMARY: &str = "crude_oil_barrel_usd";
pub const CRUDE_FALLBACK: &str = "crude_oil_barrel_usd_fallback";
pub const FUEL_PETROL: &str = "fuel_petrol_iceland_liter_isk";
pub const FUEL_DIESEL: &str = "fuel_diesel_iceland_liter_isk";

/// Output stream names that are not also stored series.
pub const CRUDE_LITRES_ISK: &str = "crude_oil_litres_isk";
pub const CRUDE_RATIO: &str = "crude_ratio";
pub const FUEL_SPREAD: &str = "fuel_price_spread";

/// Extension of every output stream file.
pub const STREAM_EXTENSION: &str = "csv.txt";

/// One column of an exchange rate quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RateField {
    Buy,
    Sell,
    Mean,
}

impl RateField {
    pub const ALL: [RateField; 3] = [RateField::Buy, RateField::Sell, RateField::Mean];

    pub fn as_str(&self) -> &'static str {
        match self {
            RateField::Buy => "buy",
            RateField::Sell => "sell",
            RateField::Mean => "mean",
        }
    }
}

pub fn series(name: &str) -> SeriesId {
    SeriesId::new(name)
}

/// Stored series of one currency's rate column, e.g. `currency_rate_isk_usd_mean`.
pub fn rate_series(code: &str, field: RateField) -> SeriesId {
    SeriesId::new(format!("{}_{}", currency_stream(code), field.as_str()))
}

/// Output stream of one currency, e.g. `currency_rate_isk_usd`.
pub fn currency_stream(code: &str) -> String {
    format!("currency_rate_isk_{}", code.to_ascii_lowercase())
}

/// Currency code of a stored rate series id, e.g. `usd` for
/// `currency_rate_isk_usd_mean`.
pub fn rate_currency(id: &SeriesId) -> Option<&str> {
    let rest = id.as_str().strip_prefix("currency_rate_isk_")?;
    let (code, field) = rest.rsplit_once('_')?;
    RateField::ALL
        .iter()
        .any(|f| f.as_str() == field)
        .then_some(code)
        .filter(|code| !code.is_empty())
}

/// Output stream of one replayed entity, e.g. `fuel_price_ao`.
pub fn entity_stream(entity: &str) -> String {
    format!("fuel_price_{entity}")
}
