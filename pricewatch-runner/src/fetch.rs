//! Fetch pipeline: watermark planner → source adapter → merger → store.
//!
//! Every source group is planned and merged first; rows are only written
//! once all groups produced a valid upsert set, so a failing source never
//! leaves the store half-updated by this run.

use crate::catalog::{self, RateField, CRUDE_FALLBACK, CRUDE_PRIMARY, FUEL_DIESEL, FUEL_PETROL};
use crate::config::{CrudeConfig, FuelConfig, PipelineConfig, RatesConfig};
use crate::RunError;
use chrono::NaiveDate;
use pricewatch_core::data::{
    CsvRateSource, CsvSeriesSource, FetchRange, MergeError, RateSource, RateTable, SeriesSource,
    SourceBatch, SourceMerger, Store, StoreError, UpsertSet, WatermarkPlanner,
};
use pricewatch_core::domain::{DatedValue, Series, SeriesId};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// Configured source adapters. A missing adapter disables its group.
#[derive(Default)]
pub struct FetchSources {
    pub crude_primary: Option<Box<dyn SeriesSource>>,
    pub crude_fallback: Option<Box<dyn SeriesSource>>,
    pub rates: Option<Box<dyn RateSource>>,
    pub petrol: Option<Box<dyn SeriesSource>>,
    pub diesel: Option<Box<dyn SeriesSource>>,
}

impl FetchSources {
    /// CSV import adapters for every path set in the configuration.
    pub fn from_config(config: &PipelineConfig) -> Self {
        fn csv(name: &str, path: &Option<PathBuf>) -> Option<Box<dyn SeriesSource>> {
            path.as_ref()
                .map(|p| Box::new(CsvSeriesSource::new(name, p.clone())) as Box<dyn SeriesSource>)
        }

        Self {
            crude_primary: csv(CRUDE_PRIMARY, &config.crude.primary),
            crude_fallback: csv(CRUDE_FALLBACK, &config.crude.fallback),
            rates: config
                .rates
                .source
                .as_ref()
                .map(|p| Box::new(CsvRateSource::new("currency_rates", p.clone())) as Box<dyn RateSource>),
            petrol: csv(FUEL_PETROL, &config.fuel.petrol),
            diesel: csv(FUEL_DIESEL, &config.fuel.diesel),
        }
    }
}

/// What happened to one source group.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// No adapter configured.
    Disabled,
    /// Store is current through yesterday.
    Skipped,
    /// Range requested and number of new rows staged.
    Fetched { range: FetchRange, staged: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupReport {
    pub group: &'static str,
    pub outcome: FetchOutcome,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchReport {
    pub groups: Vec<GroupReport>,
    pub rows_written: usize,
}

impl FetchReport {
    pub fn outcome(&self, group: &str) -> Option<&FetchOutcome> {
        self.groups
            .iter()
            .find(|g| g.group == group)
            .map(|g| &g.outcome)
    }
}

/// Rows validated and waiting to be written.
#[derive(Debug, Clone, PartialEq)]
enum StagedWrite {
    Merged {
        primary: SeriesId,
        fallback: SeriesId,
        set: UpsertSet,
    },
    Rows {
        id: SeriesId,
        rows: Vec<DatedValue>,
    },
}

impl StagedWrite {
    fn commit<S: Store>(&self, store: &mut S) -> Result<usize, StoreError> {
        match self {
            StagedWrite::Merged {
                primary,
                fallback,
                set,
            } => store.upsert_set(primary, fallback, set),
            StagedWrite::Rows { id, rows } if rows.is_empty() => {
                debug!(series = %id, "nothing new");
                Ok(0)
            }
            StagedWrite::Rows { id, rows } => store.upsert(id, rows),
        }
    }
}

/// Bring every configured source group up to date, as of `today`.
pub fn fetch_all<S: Store>(
    store: &mut S,
    sources: &FetchSources,
    config: &PipelineConfig,
    today: NaiveDate,
) -> Result<FetchReport, RunError> {
    let merger = SourceMerger::new(today);
    let mut staged = Vec::new();

    let groups = vec![
        GroupReport {
            group: "crude",
            outcome: stage_crude(&*store, sources, &config.crude, merger, today, &mut staged)?,
        },
        GroupReport {
            group: "rates",
            outcome: stage_rates(&*store, sources, &config.rates, merger, today, &mut staged)?,
        },
        GroupReport {
            group: "fuel",
            outcome: stage_fuel(&*store, sources, &config.fuel, merger, today, &mut staged)?,
        },
    ];

    let mut rows_written = 0;
    for write in &staged {
        rows_written += write.commit(store)?;
    }
    info!(rows = rows_written, writes = staged.len(), "fetch committed");

    Ok(FetchReport {
        groups,
        rows_written,
    })
}

fn stage_crude<S: Store>(
    store: &S,
    sources: &FetchSources,
    config: &CrudeConfig,
    merger: SourceMerger,
    today: NaiveDate,
    staged: &mut Vec<StagedWrite>,
) -> Result<FetchOutcome, RunError> {
    let Some(primary) = sources.crude_primary.as_deref() else {
        debug!("crude source not configured");
        return Ok(FetchOutcome::Disabled);
    };
    let primary_id = catalog::series(CRUDE_PRIMARY);
    let fallback_id = catalog::series(CRUDE_FALLBACK);

    let watermark = store.latest_date(&primary_id)?;
    let plan = WatermarkPlanner::new(config.earliest).plan(watermark, today)?;
    // A current primary also skips the fallback.
    let Some(range) = plan.range() else {
        info!(series = %primary_id, watermark = ?watermark, "current through yesterday, skipping");
        return Ok(FetchOutcome::Skipped);
    };

    info!(series = %primary_id, start = %range.start, end = %range.end, "fetching");
    let fetched = primary.fetch(range)?;
    let existing = store.dates(&primary_id)?;

    let fallback = match sources.crude_fallback.as_deref() {
        Some(source) => {
            let fb_watermark = store.latest_date(&fallback_id)?;
            match WatermarkPlanner::new(config.fallback_earliest)
                .plan(fb_watermark, today)?
                .range()
            {
                Some(fb_range) => {
                    info!(series = %fallback_id, start = %fb_range.start, end = %fb_range.end, "fetching");
                    Some((source, fb_range, source.fetch(fb_range)?, store.dates(&fallback_id)?))
                }
                None => None,
            }
        }
        None => None,
    };

    let set = merger.merge(
        SourceBatch {
            source: primary.name(),
            requested: range,
            series: &fetched,
            existing: &existing,
        },
        fallback
            .as_ref()
            .map(|(source, requested, series, existing)| SourceBatch {
                source: source.name(),
                requested: *requested,
                series,
                existing,
            }),
    )?;

    let count = set.len();
    staged.push(StagedWrite::Merged {
        primary: primary_id,
        fallback: fallback_id,
        set,
    });
    Ok(FetchOutcome::Fetched {
        range,
        staged: count,
    })
}

fn stage_rates<S: Store>(
    store: &S,
    sources: &FetchSources,
    config: &RatesConfig,
    merger: SourceMerger,
    today: NaiveDate,
    staged: &mut Vec<StagedWrite>,
) -> Result<FetchOutcome, RunError> {
    let Some(source) = sources.rates.as_deref() else {
        debug!("rate source not configured");
        return Ok(FetchOutcome::Disabled);
    };

    let mut tracked: Vec<SeriesId> = config
        .currencies
        .iter()
        .map(|code| catalog::rate_series(code, RateField::Mean))
        .collect();
    if tracked.is_empty() {
        tracked.push(catalog::rate_series(&config.reference, RateField::Mean));
    }
    let watermark = oldest_watermark(store, &tracked)?;
    let plan = WatermarkPlanner::new(config.earliest).plan(watermark, today)?;
    let Some(range) = plan.range() else {
        info!(currencies = tracked.len(), watermark = ?watermark, "rates current through yesterday, skipping");
        return Ok(FetchOutcome::Skipped);
    };

    info!(start = %range.start, end = %range.end, "fetching rates");
    let table = source.fetch(range)?;
    if table.is_empty() && !range.is_empty() {
        return Err(MergeError::EmptySource {
            source_name: source.name().to_string(),
            start: range.start,
            end: range.end,
        }
        .into());
    }

    let mut count = 0;
    for ((code, field), series) in split_rate_table(&table) {
        let id = catalog::rate_series(&code, field);
        let existing = store.dates(&id)?;
        let rows = merger.new_rows(SourceBatch {
            source: source.name(),
            requested: range,
            series: &series,
            existing: &existing,
        })?;
        count += rows.len();
        staged.push(StagedWrite::Rows { id, rows });
    }

    Ok(FetchOutcome::Fetched {
        range,
        staged: count,
    })
}

fn stage_fuel<S: Store>(
    store: &S,
    sources: &FetchSources,
    config: &FuelConfig,
    merger: SourceMerger,
    today: NaiveDate,
    staged: &mut Vec<StagedWrite>,
) -> Result<FetchOutcome, RunError> {
    let grades: Vec<(&dyn SeriesSource, SeriesId)> = [
        (sources.petrol.as_deref(), FUEL_PETROL),
        (sources.diesel.as_deref(), FUEL_DIESEL),
    ]
    .into_iter()
    .filter_map(|(source, id)| source.map(|s| (s, catalog::series(id))))
    .collect();
    if grades.is_empty() {
        debug!("fuel sources not configured");
        return Ok(FetchOutcome::Disabled);
    }

    let ids: Vec<SeriesId> = grades.iter().map(|(_, id)| id.clone()).collect();
    let watermark = oldest_watermark(store, &ids)?;
    let plan = WatermarkPlanner::new(config.earliest).plan(watermark, today)?;
    let Some(range) = plan.range() else {
        info!(watermark = ?watermark, "fuel current through yesterday, skipping");
        return Ok(FetchOutcome::Skipped);
    };

    let mut count = 0;
    for (source, id) in grades {
        info!(series = %id, start = %range.start, end = %range.end, "fetching");
        let fetched = source.fetch(range)?;
        let existing = store.dates(&id)?;
        let rows = merger.new_rows(SourceBatch {
            source: source.name(),
            requested: range,
            series: &fetched,
            existing: &existing,
        })?;
        count += rows.len();
        staged.push(StagedWrite::Rows { id, rows });
    }

    Ok(FetchOutcome::Fetched {
        range,
        staged: count,
    })
}

/// Oldest watermark of a group; `None` if any member has no data yet.
fn oldest_watermark<S: Store>(
    store: &S,
    ids: &[SeriesId],
) -> Result<Option<NaiveDate>, StoreError> {
    let mut oldest: Option<NaiveDate> = None;
    for id in ids {
        match store.latest_date(id)? {
            None => return Ok(None),
            Some(date) => oldest = Some(oldest.map_or(date, |o| o.min(date))),
        }
    }
    Ok(oldest)
}

/// Split a rate table into one series per currency and column.
///
/// Buy and sell series only exist where the source supplied them.
fn split_rate_table(table: &RateTable) -> BTreeMap<(String, RateField), Series> {
    let mut columns: BTreeMap<(String, RateField), BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    for (date, quotes) in table {
        for (code, quote) in quotes {
            let code = code.to_ascii_lowercase();
            for (field, value) in [
                (RateField::Buy, quote.buy),
                (RateField::Sell, quote.sell),
                (RateField::Mean, Some(quote.mean)),
            ] {
                if let Some(value) = value {
                    columns
                        .entry((code.clone(), field))
                        .or_default()
                        .insert(*date, value);
                }
            }
        }
    }
    columns
        .into_iter()
        .map(|(key, values)| (key, Series::from_map(values)))
        .collect()
}
