//! Derive pipeline: stored series and the history log → output streams.
//!
//! Streams produced:
//! - `crude_oil_barrel_usd`: primary rows, then fallback rows after the
//!   primary's last date
//! - `crude_oil_litres_isk`: the same rows converted with the reference rate
//! - `currency_rate_isk_<code>`: buy / sell / mean per stored currency
//! - `fuel_petrol_iceland_liter_isk`, `fuel_diesel_iceland_liter_isk`
//! - `crude_ratio`: crude ISK/litre aligned against petrol
//! - `fuel_price_spread` and `fuel_price_<entity>` from the replayed log

use crate::catalog::{
    self, RateField, CRUDE_FALLBACK, CRUDE_LITRES_ISK, CRUDE_PRIMARY, CRUDE_RATIO, FUEL_DIESEL,
    FUEL_PETROL, FUEL_SPREAD,
};
use crate::config::PipelineConfig;
use crate::export::{
    format_fixed, format_nonzero, format_value, write_streams, ExportReport, StreamTable,
};
use crate::manifest::{write_manifest, PublishManifest};
use crate::RunError;
use chrono::{Days, NaiveDate, NaiveDateTime};
use pricewatch_core::data::{
    align, barrel_usd_to_litre_isk, effective_rates, fill_beyond, ratio, Store,
};
use pricewatch_core::domain::{EntitySummary, MetricStats, Series, Spread};
use pricewatch_core::replay::{replay, HistoryLog, MetricKeys, ReplayOutput};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct DeriveReport {
    pub streams: usize,
    pub export: ExportReport,
    pub manifest: PublishManifest,
}

/// Build every stream, export it and record the changed files.
///
/// `now` only stamps the manifest message.
pub fn run_derive<S: Store>(
    store: &S,
    config: &PipelineConfig,
    today: NaiveDate,
    now: NaiveDateTime,
) -> anyhow::Result<DeriveReport> {
    let streams = build_streams(store, config, today)?;
    let export = write_streams(&config.paths.output_dir, &streams)?;
    let manifest = PublishManifest::new(now, export.changed.clone());
    write_manifest(&config.paths.manifest, &manifest)?;
    info!(
        changed = export.changed.len(),
        unchanged = export.unchanged.len(),
        manifest = %config.paths.manifest.display(),
        "derive finished"
    );
    Ok(DeriveReport {
        streams: streams.len(),
        export,
        manifest,
    })
}

pub fn build_streams<S: Store>(
    store: &S,
    config: &PipelineConfig,
    today: NaiveDate,
) -> Result<Vec<StreamTable>, RunError> {
    let mut streams = Vec::new();

    let crude_isk = crude_streams(store, config, &mut streams)?;
    currency_streams(store, config, &mut streams)?;

    let petrol = store.load(&catalog::series(FUEL_PETROL))?;
    let diesel = store.load(&catalog::series(FUEL_DIESEL))?;
    for (name, series) in [(FUEL_PETROL, &petrol), (FUEL_DIESEL, &diesel)] {
        if series.is_empty() {
            debug!(stream = name, "no stored rows");
            continue;
        }
        streams.push(StreamTable::from_series(name, "price", series, format_value));
    }

    match crude_isk {
        Some(crude_isk) if !petrol.is_empty() => {
            let precision = config.derive.ratio_precision;
            let ratios = align(&crude_isk, &petrol, ratio(precision))?;
            streams.push(StreamTable::from_series(
                CRUDE_RATIO,
                "ratio",
                &ratios,
                |v| format_fixed(v, precision as usize),
            ));
        }
        _ => debug!(stream = CRUDE_RATIO, "inputs missing"),
    }

    if let Some(path) = &config.replay.log {
        let keys = config.replay.metric_keys();
        let through = today.checked_sub_days(Days::new(1));
        let output = replay_log(path, config, &keys, through)?;
        streams.extend(replay_streams(&output, &keys));
    }

    info!(streams = streams.len(), "streams derived");
    Ok(streams)
}

/// Crude USD and ISK streams; returns the ISK series for the ratio.
fn crude_streams<S: Store>(
    store: &S,
    config: &PipelineConfig,
    streams: &mut Vec<StreamTable>,
) -> Result<Option<Series>, RunError> {
    let primary = store.load(&catalog::series(CRUDE_PRIMARY))?;
    let fallback = store.load(&catalog::series(CRUDE_FALLBACK))?;
    let usd = fill_beyond(&primary, &fallback);
    if usd.is_empty() {
        debug!(stream = CRUDE_PRIMARY, "no stored rows");
        return Ok(None);
    }
    debug!(
        primary = primary.len(),
        filler = usd.len() - primary.len(),
        "crude rows"
    );
    streams.push(StreamTable::from_series(CRUDE_PRIMARY, "price", &usd, format_value));

    let reference = &config.rates.reference;
    let sell = store.load(&catalog::rate_series(reference, RateField::Sell))?;
    let mean = store.load(&catalog::rate_series(reference, RateField::Mean))?;
    if mean.is_empty() {
        warn!(currency = %reference, "no stored exchange rates, skipping {}", CRUDE_LITRES_ISK);
        return Ok(None);
    }
    let rates = effective_rates(&sell, &mean);
    let isk = barrel_usd_to_litre_isk(&usd, &rates, config.crude.litres_per_barrel)?;
    streams.push(StreamTable::from_series(CRUDE_LITRES_ISK, "price", &isk, format_value));
    Ok(Some(isk))
}

fn currency_streams<S: Store>(
    store: &S,
    config: &PipelineConfig,
    streams: &mut Vec<StreamTable>,
) -> Result<(), RunError> {
    let mut codes: BTreeSet<String> = config
        .rates
        .currencies
        .iter()
        .map(|code| code.to_ascii_lowercase())
        .collect();
    for id in store.series_ids()? {
        if let Some(code) = catalog::rate_currency(&id) {
            codes.insert(code.to_string());
        }
    }

    for code in &codes {
        let [buy, sell, mean] =
            RateField::ALL.map(|field| store.load(&catalog::rate_series(code, field)));
        let (buy, sell, mean) = (buy?, sell?, mean?);

        let dates: BTreeSet<NaiveDate> = [&buy, &sell, &mean]
            .into_iter()
            .flat_map(|s| s.iter().map(|p| p.date))
            .collect();
        if dates.is_empty() {
            debug!(currency = %code, "no stored rates");
            continue;
        }

        let mut table =
            StreamTable::new(catalog::currency_stream(code), &["date", "buy", "sell", "mean"]);
        for date in dates {
            table.push(vec![
                date.to_string(),
                format_nonzero(buy.get(date)),
                format_nonzero(sell.get(date)),
                format_nonzero(mean.get(date)),
            ]);
        }
        streams.push(table);
    }
    Ok(())
}

fn replay_log(
    path: &Path,
    config: &PipelineConfig,
    keys: &MetricKeys,
    through: Option<NaiveDate>,
) -> Result<ReplayOutput, RunError> {
    let text = std::fs::read_to_string(path).map_err(|e| RunError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let log = HistoryLog::parse(&text, keys)?;
    if !log.malformed.is_empty() {
        warn!(skipped = log.malformed.len(), "history log has malformed entries");
    }
    let output = replay(log.snapshots, config.replay.replay_config(through)?);
    info!(
        days = output.days,
        entities = output.entities.len(),
        bad = output.bad,
        "history replayed"
    );
    Ok(output)
}

/// Global spread stream plus one stream per entity.
pub fn replay_streams(output: &ReplayOutput, keys: &MetricKeys) -> Vec<StreamTable> {
    let mut streams = Vec::with_capacity(output.entities.len() + 1);

    let mut spread = StreamTable {
        name: FUEL_SPREAD.to_string(),
        header: header(keys, &["low", "high", "spread"], None),
        rows: Vec::new(),
    };
    for record in output.spread.records() {
        let mut row = vec![record.date.to_string()];
        row.extend(spread_cells(record.values.primary));
        row.extend(spread_cells(record.values.secondary));
        spread.push(row);
    }
    streams.push(spread);

    for (entity, stream) in &output.entities {
        let mut table = StreamTable {
            name: catalog::entity_stream(entity),
            header: header(keys, &["low", "high", "mean", "mode"], Some("units")),
            rows: Vec::new(),
        };
        for record in stream.records() {
            let mut row = vec![record.date.to_string()];
            row.extend(summary_cells(record.values.as_ref()));
            table.push(row);
        }
        streams.push(table);
    }
    streams
}

/// `date,<primary>_<col>..,<secondary>_<col>..[,trailer]`
fn header(keys: &MetricKeys, columns: &[&str], trailer: Option<&str>) -> Vec<String> {
    let mut header = vec!["date".to_string()];
    for metric in [&keys.primary, &keys.secondary] {
        header.extend(columns.iter().map(|c| format!("{metric}_{c}")));
    }
    header.extend(trailer.map(str::to_string));
    header
}

fn spread_cells(spread: Option<Spread>) -> [String; 3] {
    match spread {
        Some(s) => [s.low, s.high, s.spread].map(format_value),
        None => Default::default(),
    }
}

fn stats_cells(stats: Option<MetricStats>) -> [String; 4] {
    match stats {
        Some(s) => [s.low, s.high, s.mean, s.mode].map(format_value),
        None => Default::default(),
    }
}

/// Terminal rows (`None`) render as empty cells.
fn summary_cells(summary: Option<&EntitySummary>) -> Vec<String> {
    let mut cells = Vec::with_capacity(9);
    cells.extend(stats_cells(summary.and_then(|s| s.primary)));
    cells.extend(stats_cells(summary.and_then(|s| s.secondary)));
    cells.push(summary.map(|s| s.unit_count.to_string()).unwrap_or_default());
    cells
}
