//! Pricewatch CLI: fetch, derive and status commands.
//!
//! Commands:
//! - `fetch`: bring every configured source up to date in the store
//! - `derive`: rebuild the output streams and the publish manifest
//! - `run`: `fetch` followed by `derive`
//! - `status`: latest stored date and row count per series

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use pricewatch_core::data::{ParquetStore, Store};
use pricewatch_runner::{fetch_all, run_derive, FetchOutcome, FetchSources, PipelineConfig};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Config file looked up when `--config` is not given.
const DEFAULT_CONFIG: &str = "pricewatch.toml";

#[derive(Parser)]
#[command(
    name = "pricewatch",
    about = "Pricewatch CLI: incremental price series reconciliation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML config file. Defaults to ./pricewatch.toml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Treat this date (YYYY-MM-DD) as today. Defaults to the local date.
    #[arg(long, global = true)]
    today: Option<NaiveDate>,

    /// Debug-level logging.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new rows from every configured source into the store.
    Fetch,
    /// Write output streams and the publish manifest from stored data.
    Derive,
    /// Fetch, then derive.
    Run,
    /// Report latest stored date and row count per series.
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let now = chrono::Local::now().naive_local();
    let (today, now) = match cli.today {
        Some(today) => (today, today.and_time(now.time())),
        None => (now.date(), now),
    };

    match cli.command {
        Commands::Fetch => run_fetch(&config, today),
        Commands::Derive => run_derive_cmd(&config, today, now),
        Commands::Run => {
            run_fetch(&config, today)?;
            run_derive_cmd(&config, today, now)
        }
        Commands::Status => run_status(&config.paths.store_dir),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    if let Some(path) = path {
        return PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }
    let default = Path::new(DEFAULT_CONFIG);
    if default.exists() {
        return PipelineConfig::from_file(default)
            .with_context(|| format!("Failed to load config {}", default.display()));
    }
    warn!(path = DEFAULT_CONFIG, "config file not found, using defaults");
    Ok(PipelineConfig::default())
}

fn run_fetch(config: &PipelineConfig, today: NaiveDate) -> Result<()> {
    let mut store = ParquetStore::new(config.paths.store_dir.clone());
    let sources = FetchSources::from_config(config);
    let report = fetch_all(&mut store, &sources, config, today).context("Fetch failed")?;

    for group in &report.groups {
        match &group.outcome {
            FetchOutcome::Disabled => println!("{:<6} not configured", group.group),
            FetchOutcome::Skipped => println!("{:<6} current through yesterday", group.group),
            FetchOutcome::Fetched { range, staged } => println!(
                "{:<6} requested {} .. {}, {staged} new rows",
                group.group, range.start, range.end
            ),
        }
    }
    println!("Rows written: {}", report.rows_written);
    Ok(())
}

fn run_derive_cmd(config: &PipelineConfig, today: NaiveDate, now: NaiveDateTime) -> Result<()> {
    let store = ParquetStore::new(config.paths.store_dir.clone());
    let report = run_derive(&store, config, today, now).context("Derive failed")?;

    println!("Streams: {}", report.streams);
    if report.manifest.is_empty() {
        println!("No stream changed");
    } else {
        println!("Changed:");
        for path in &report.manifest.changed {
            println!("  {}", path.display());
        }
    }
    info!(message = %report.manifest.message, "manifest written");
    Ok(())
}

fn run_status(store_dir: &Path) -> Result<()> {
    if !store_dir.exists() {
        println!("Store directory does not exist: {}", store_dir.display());
        return Ok(());
    }

    let store = ParquetStore::new(store_dir);
    let ids = store.series_ids()?;
    if ids.is_empty() {
        println!("Store is empty: {}", store_dir.display());
        return Ok(());
    }

    println!("Store: {}", store_dir.display());
    println!("Series: {}", ids.len());
    println!();
    println!("{:<40} {:<12} {:<12} {:>8}", "Series", "First", "Latest", "Rows");
    println!("{}", "-".repeat(75));
    for id in &ids {
        let status = store.status(id)?;
        let date = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
        println!(
            "{:<40} {:<12} {:<12} {:>8}",
            id.as_str(),
            date(status.first_date),
            date(status.latest_date),
            status.row_count
        );
    }
    Ok(())
}
