//! Parquet-backed series store with Hive-style partitioning.
//!
//! Layout: `{store_dir}/series={ID}/{year}.parquet`
//!
//! - Upserts rewrite only the year partitions they touch.
//! - Every touched partition is written to `.tmp` first; the renames happen
//!   only once all of them were written, so a failure while writing leaves
//!   the previous partitions in place.
//! - Renames are per file. If one fails after earlier ones succeeded, the
//!   call returns an error with those earlier partitions already swapped in
//!   and the sidecar rebuilt from what is on disk. Each partition is either
//!   fully old or fully new, never torn.
//! - A `meta.json` sidecar per series records the date range, row count
//!   and a BLAKE3 hash of the content, and answers watermark queries.
//! - Corrupt partitions found on load are quarantined
//!   (`{year}.parquet.quarantined`) and skipped, and the sidecar is rebuilt
//!   from the remaining partitions so the watermark never claims dates the
//!   store no longer holds.

use super::store::{SeriesStatus, Store, StoreError};
use crate::domain::{DatedValue, Series, SeriesId};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Metadata sidecar for a stored series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesMeta {
    pub series: String,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub row_count: usize,
    pub data_hash: String,
}

pub struct ParquetStore {
    store_dir: PathBuf,
}

impl ParquetStore {
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
        }
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// `{store_dir}/series={ID}/`
    fn series_dir(&self, id: &SeriesId) -> PathBuf {
        self.store_dir.join(format!("series={id}"))
    }

    fn year_path(&self, id: &SeriesId, year: i32) -> PathBuf {
        self.series_dir(id).join(format!("{year}.parquet"))
    }

    fn meta_path(&self, id: &SeriesId) -> PathBuf {
        self.series_dir(id).join("meta.json")
    }

    pub fn get_meta(&self, id: &SeriesId) -> Option<SeriesMeta> {
        let content = fs::read_to_string(self.meta_path(id)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Rewrite the sidecar from `series`; an empty series has none.
    fn write_meta(&self, id: &SeriesId, series: &Series) -> Result<(), StoreError> {
        let path = self.meta_path(id);
        let (Some(first), Some(last)) = (series.first(), series.last()) else {
            return match fs::remove_file(&path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(io_err(&path, e)),
                _ => Ok(()),
            };
        };
        let bytes = serde_json::to_vec(series.points())
            .map_err(|e| StoreError::Serialization(format!("hash input: {e}")))?;
        let meta = SeriesMeta {
            series: id.to_string(),
            first_date: first.date,
            last_date: last.date,
            row_count: series.len(),
            data_hash: blake3::hash(&bytes).to_hex().to_string(),
        };
        let json = serde_json::to_string_pretty(&meta)
            .map_err(|e| StoreError::Serialization(format!("meta: {e}")))?;
        fs::write(&path, json).map_err(|e| io_err(&path, e))
    }

    /// Existing rows of one year partition, or empty if it does not exist.
    fn read_partition(
        &self,
        id: &SeriesId,
        year: i32,
    ) -> Result<BTreeMap<NaiveDate, f64>, StoreError> {
        let path = self.year_path(id, year);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let rows = load_and_validate_parquet(&path).map_err(|e| StoreError::Corrupt {
            series: id.to_string(),
            reason: format!("{}: {e}", path.display()),
        })?;
        Ok(rows.into_iter().map(|p| (p.date, p.value)).collect())
    }
}

impl Store for ParquetStore {
    fn latest_date(&self, id: &SeriesId) -> Result<Option<NaiveDate>, StoreError> {
        if let Some(meta) = self.get_meta(id) {
            return Ok(Some(meta.last_date));
        }
        Ok(self.load(id)?.latest_date())
    }

    fn load(&self, id: &SeriesId) -> Result<Series, StoreError> {
        let dir = self.series_dir(id);
        if !dir.exists() {
            return Ok(Series::new());
        }

        let mut rows = BTreeMap::new();
        let mut quarantined = 0usize;
        let entries = fs::read_dir(&dir).map_err(|e| io_err(&dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| io_err(&dir, e))?.path();
            // meta.json, .tmp and .quarantined files are not partitions
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }
            match load_and_validate_parquet(&path) {
                Ok(points) => rows.extend(points.into_iter().map(|p| (p.date, p.value))),
                Err(e) => {
                    let quarantine = path.with_extension("parquet.quarantined");
                    warn!(path = %path.display(), error = %e, "quarantining corrupt partition");
                    let _ = fs::rename(&path, &quarantine);
                    quarantined += 1;
                }
            }
        }
        let series = Series::from_map(rows);
        if quarantined > 0 {
            self.write_meta(id, &series)?;
        }
        Ok(series)
    }

    fn upsert(&mut self, id: &SeriesId, rows: &[DatedValue]) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let dir = self.series_dir(id);
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

        let mut by_year: BTreeMap<i32, Vec<DatedValue>> = BTreeMap::new();
        for row in rows {
            by_year.entry(row.date.year()).or_default().push(*row);
        }

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(by_year.len());
        for (year, new_rows) in &by_year {
            let mut merged = match self.read_partition(id, *year) {
                Ok(existing) => existing,
                Err(e) => {
                    discard(&staged);
                    return Err(e);
                }
            };
            for row in new_rows {
                merged.insert(row.date, row.value);
            }

            let path = self.year_path(id, *year);
            let tmp_path = path.with_extension("parquet.tmp");
            let written = points_to_dataframe(&merged).and_then(|df| write_parquet(df, &tmp_path));
            if let Err(e) = written {
                let _ = fs::remove_file(&tmp_path);
                discard(&staged);
                return Err(e);
            }
            staged.push((tmp_path, path));
        }

        for (n, (tmp_path, path)) in staged.iter().enumerate() {
            if let Err(e) = fs::rename(tmp_path, path) {
                discard(&staged[n..]);
                warn!(series = %id, renamed = n, "partition rename failed, rebuilding meta");
                let _ = self.load(id).and_then(|s| self.write_meta(id, &s));
                return Err(io_err(path, e));
            }
        }
        let series = self.load(id)?;
        self.write_meta(id, &series)?;

        debug!(series = %id, rows = rows.len(), partitions = staged.len(), "upserted");
        Ok(rows.len())
    }

    fn series_ids(&self) -> Result<Vec<SeriesId>, StoreError> {
        if !self.store_dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.store_dir).map_err(|e| io_err(&self.store_dir, e))?;
        let mut ids = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&self.store_dir, e))?;
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(|n| n.strip_prefix("series=")) {
                ids.insert(SeriesId::from(id));
            }
        }
        Ok(ids.into_iter().collect())
    }

    fn status(&self, id: &SeriesId) -> Result<SeriesStatus, StoreError> {
        match self.get_meta(id) {
            Some(meta) => Ok(SeriesStatus {
                id: id.clone(),
                first_date: Some(meta.first_date),
                latest_date: Some(meta.last_date),
                row_count: meta.row_count,
            }),
            None => {
                let series = self.load(id)?;
                Ok(SeriesStatus {
                    id: id.clone(),
                    first_date: series.first().map(|p| p.date),
                    latest_date: series.latest_date(),
                    row_count: series.len(),
                })
            }
        }
    }
}

fn io_err(path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (tmp_path, _) in staged {
        let _ = fs::remove_file(tmp_path);
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn points_to_dataframe(rows: &BTreeMap<NaiveDate, f64>) -> Result<DataFrame, StoreError> {
    let dates: Vec<i32> = rows
        .keys()
        .map(|d| (*d - epoch()).num_days() as i32)
        .collect();
    let values: Vec<f64> = rows.values().copied().collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| StoreError::Parquet(format!("date cast: {e}")))?,
        Column::new("value".into(), values),
    ])
    .map_err(|e| StoreError::Parquet(format!("dataframe creation: {e}")))
}

fn write_parquet(mut df: DataFrame, path: &Path) -> Result<(), StoreError> {
    let file = fs::File::create(path).map_err(|e| io_err(path, e))?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .map_err(|e| StoreError::Parquet(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<DatedValue>, StoreError> {
    let file = fs::File::open(path).map_err(|e| io_err(path, e))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| StoreError::Parquet(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(StoreError::Parquet("empty partition".into()));
    }

    let map_err = |e: PolarsError| StoreError::Parquet(format!("column read: {e}"));
    let date_ca = df
        .column("date")
        .map_err(map_err)?
        .date()
        .map_err(|e| StoreError::Parquet(format!("date column type: {e}")))?;
    let value_ca = df
        .column("value")
        .map_err(map_err)?
        .f64()
        .map_err(|e| StoreError::Parquet(format!("value column type: {e}")))?;

    let mut points = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let days = date_ca
            .get(i)
            .ok_or_else(|| StoreError::Parquet(format!("null date at row {i}")))?;
        let value = value_ca
            .get(i)
            .ok_or_else(|| StoreError::Parquet(format!("null value at row {i}")))?;
        points.push(DatedValue::new(
            epoch() + chrono::Duration::days(days as i64),
            value,
        ));
    }
    Ok(points)
}
