//! Output stream export (CSV).
//!
//! Each stream is one `<name>.csv.txt` file: one header row, one row per
//! record, dates as `YYYY-MM-DD`. Files are replaced atomically, and a file
//! whose content would not change is left untouched.

use anyhow::{Context, Result};
use pricewatch_core::domain::Series;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::catalog::STREAM_EXTENSION;

/// A fully formatted output stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamTable {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl StreamTable {
    pub fn new(name: impl Into<String>, header: &[&str]) -> Self {
        Self {
            name: name.into(),
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Two-column `date,<column>` stream of a series.
    pub fn from_series(
        name: impl Into<String>,
        column: &str,
        series: &Series,
        format: impl Fn(f64) -> String,
    ) -> Self {
        let mut table = Self::new(name, &["date", column]);
        for point in series.iter() {
            table.push(vec![point.date.to_string(), format(point.value)]);
        }
        table
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, STREAM_EXTENSION)
    }

    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(vec![]);
        writer
            .write_record(&self.header)
            .with_context(|| format!("Failed to write header of {}", self.name))?;
        for row in &self.rows {
            writer
                .write_record(row)
                .with_context(|| format!("Failed to write row of {}", self.name))?;
        }
        writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush {}: {e}", self.name))
    }
}

/// Shortest round-trip form, always with a fractional part (`80.0`, `70.45`).
pub fn format_value(value: f64) -> String {
    format!("{value:?}")
}

/// Fixed number of decimals (`0.3300`).
pub fn format_fixed(value: f64, decimals: usize) -> String {
    format!("{value:.decimals$}")
}

/// Empty cell for a missing value.
pub fn format_optional(value: Option<f64>) -> String {
    value.map(format_value).unwrap_or_default()
}

/// Empty cell for a missing or zero value.
pub fn format_nonzero(value: Option<f64>) -> String {
    format_optional(value.filter(|v| *v != 0.0))
}

/// Which stream files an export touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportReport {
    pub changed: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
}

/// Write every stream into `output_dir`.
pub fn write_streams(output_dir: &Path, streams: &[StreamTable]) -> Result<ExportReport> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let mut report = ExportReport::default();
    for stream in streams {
        let path = output_dir.join(stream.file_name());
        let content = stream.to_csv()?;
        if write_if_changed(&path, &content)? {
            info!(path = %path.display(), rows = stream.rows.len(), "stream written");
            report.changed.push(path);
        } else {
            debug!(path = %path.display(), "stream unchanged");
            report.unchanged.push(path);
        }
    }
    Ok(report)
}

/// Atomically replace `path` with `content` unless it already holds it.
///
/// Returns whether the file was written.
pub fn write_if_changed(path: &Path, content: &[u8]) -> Result<bool> {
    if let Ok(existing) = std::fs::read(path) {
        if blake3::hash(&existing) == blake3::hash(content) {
            return Ok(false);
        }
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(true)
}
