//! Offline source adapters reading delimited files.
//!
//! `CsvSeriesSource` reads `date,value` rows; `CsvRateSource` reads
//! `date,code,buy,sell,mean` rows where buy and sell may be empty. Both
//! return only the rows inside the requested range, and fail on the first
//! malformed row instead of returning partial data.

use super::provider::{DataError, RateQuote, RateSource, RateTable, SeriesSource};
use super::watermark::FetchRange;
use crate::domain::Series;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct ValueRow {
    date: NaiveDate,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct RateRow {
    date: NaiveDate,
    code: String,
    buy: Option<f64>,
    sell: Option<f64>,
    mean: f64,
}

fn open_reader(name: &str, path: &Path) -> Result<csv::Reader<std::fs::File>, DataError> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| DataError::Unreachable {
            source_name: name.to_string(),
            reason: format!("{}: {e}", path.display()),
        })
}

/// Row number as shown in the file: header is row 1.
fn row_number(index: usize) -> usize {
    index + 2
}

/// Single-valued daily series stored as `date,value`.
#[derive(Debug, Clone)]
pub struct CsvSeriesSource {
    name: String,
    path: PathBuf,
}

impl CsvSeriesSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SeriesSource for CsvSeriesSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, range: FetchRange) -> Result<Series, DataError> {
        let mut reader = open_reader(&self.name, &self.path)?;
        let mut rows: BTreeMap<NaiveDate, f64> = BTreeMap::new();

        for (index, record) in reader.deserialize::<ValueRow>().enumerate() {
            let row = record.map_err(|e| DataError::MalformedRow {
                source_name: self.name.clone(),
                row: row_number(index),
                reason: e.to_string(),
            })?;
            if !range.contains(row.date) {
                continue;
            }
            match rows.entry(row.date) {
                Entry::Occupied(_) => {
                    return Err(DataError::DuplicateDate {
                        source_name: self.name.clone(),
                        date: row.date,
                    })
                }
                Entry::Vacant(slot) => {
                    slot.insert(row.value);
                }
            }
        }

        Ok(Series::from_map(rows))
    }
}

/// Multi-currency rate table stored as `date,code,buy,sell,mean`.
#[derive(Debug, Clone)]
pub struct CsvRateSource {
    name: String,
    path: PathBuf,
}

impl CsvRateSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

impl RateSource for CsvRateSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, range: FetchRange) -> Result<RateTable, DataError> {
        let mut reader = open_reader(&self.name, &self.path)?;
        let mut table = RateTable::new();

        for (index, record) in reader.deserialize::<RateRow>().enumerate() {
            let row = record.map_err(|e| DataError::MalformedRow {
                source_name: self.name.clone(),
                row: row_number(index),
                reason: e.to_string(),
            })?;
            if !range.contains(row.date) {
                continue;
            }
            let code = row.code.to_lowercase();
            if code.is_empty() {
                return Err(DataError::MalformedRow {
                    source_name: self.name.clone(),
                    row: row_number(index),
                    reason: "empty currency code".into(),
                });
            }
            let quote = RateQuote {
                buy: row.buy,
                sell: row.sell,
                mean: row.mean,
            };
            if table.entry(row.date).or_default().insert(code, quote).is_some() {
                return Err(DataError::DuplicateDate {
                    source_name: self.name.clone(),
                    date: row.date,
                });
            }
        }

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DatedValue;
    use std::io::Write;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn series_source_filters_to_range() {
        let file = write_file("date,value\n2023-05-08,79.0\n2023-05-09,80.1\n2023-05-10,81.0\n2023-05-11,82.4\n");
        let source = CsvSeriesSource::new("crude", file.path());

        let series = source
            .fetch(FetchRange::new(d("2023-05-09"), d("2023-05-11")))
            .unwrap();
        assert_eq!(
            series.points(),
            &[
                DatedValue::new(d("2023-05-09"), 80.1),
                DatedValue::new(d("2023-05-10"), 81.0),
            ]
        );
    }

    #[test]
    fn series_source_rejects_bad_rows() {
        let file = write_file("date,value\n2023-05-08,79.0\n2023-05-09,n/a\n");
        let source = CsvSeriesSource::new("crude", file.path());
        let err = source
            .fetch(FetchRange::new(d("2023-01-01"), d("2024-01-01")))
            .unwrap_err();
        assert!(matches!(err, DataError::MalformedRow { row: 3, .. }));
    }

    #[test]
    fn series_source_rejects_duplicate_dates() {
        let file = write_file("date,value\n2023-05-08,79.0\n2023-05-08,79.5\n");
        let source = CsvSeriesSource::new("crude", file.path());
        let err = source
            .fetch(FetchRange::new(d("2023-01-01"), d("2024-01-01")))
            .unwrap_err();
        assert!(matches!(err, DataError::DuplicateDate { .. }));
    }

    #[test]
    fn missing_file_is_unreachable() {
        let source = CsvSeriesSource::new("crude", "/nonexistent/crude.csv");
        let err = source
            .fetch(FetchRange::new(d("2023-01-01"), d("2024-01-01")))
            .unwrap_err();
        assert!(matches!(err, DataError::Unreachable { .. }));
    }

    #[test]
    fn rate_source_reads_optional_buy_sell() {
        let file = write_file(
            "date,code,buy,sell,mean\n\
             2023-05-09,USD,136.9,137.3,137.1\n\
             2023-05-09,xdr,,,183.2\n\
             2023-05-10,usd,137.0,137.4,137.2\n",
        );
        let source = CsvRateSource::new("rates", file.path());
        let table = source
            .fetch(FetchRange::new(d("2023-05-09"), d("2023-05-10")))
            .unwrap();

        assert_eq!(table.len(), 1);
        let day = &table[&d("2023-05-09")];
        assert_eq!(day["usd"].sell, Some(137.3));
        assert_eq!(day["xdr"], RateQuote::mean_only(183.2));
    }
}
