//! Derive pipeline end to end: stored series and a history log into files.

use chrono::{NaiveDate, NaiveDateTime};
use pricewatch_core::data::MemoryStore;
use pricewatch_core::domain::{DatedValue, Series};
use pricewatch_runner::{read_manifest, run_derive, PipelineConfig};
use std::path::Path;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn series(points: &[(&str, f64)]) -> Series {
    Series::from_points(
        points
            .iter()
            .map(|(date, value)| DatedValue::new(d(date), *value))
            .collect(),
    )
    .unwrap()
}

fn now() -> NaiveDateTime {
    d("2023-05-11").and_hms_opt(6, 15, 0).unwrap()
}

fn read(dir: &Path, name: &str) -> String {
    std::fs::read_to_string(dir.join(format!("{name}.csv.txt"))).unwrap()
}

fn config_in(root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.paths.output_dir = root.join("data");
    config.paths.manifest = root.join("data/publish.json");
    config.rates.currencies = vec!["usd".into()];
    config.replay.historical_overrides = false;
    config
}

fn store() -> MemoryStore {
    MemoryStore::new()
        .with_series(
            "crude_oil_barrel_usd",
            &series(&[("2023-05-08", 80.0), ("2023-05-09", 81.0)]),
        )
        .with_series(
            "crude_oil_barrel_usd_fallback",
            &series(&[("2023-05-09", 99.0), ("2023-05-10", 82.5)]),
        )
        .with_series(
            "currency_rate_isk_usd_buy",
            &series(&[("2023-05-05", 139.0)]),
        )
        .with_series(
            "currency_rate_isk_usd_sell",
            &series(&[("2023-05-05", 140.0)]),
        )
        .with_series(
            "currency_rate_isk_usd_mean",
            &series(&[("2023-05-05", 139.5), ("2023-05-09", 138.0)]),
        )
        .with_series(
            "fuel_petrol_iceland_liter_isk",
            &series(&[("2023-05-07", 300.0), ("2023-05-10", 310.0)]),
        )
}

#[test]
fn stored_series_become_streams() {
    let root = tempfile::tempdir().unwrap();
    let config = config_in(root.path());
    let out = config.paths.output_dir.clone();

    let report = run_derive(&store(), &config, d("2023-05-11"), now()).unwrap();
    assert_eq!(report.streams, 5);
    assert_eq!(report.export.changed.len(), 5);

    // fallback fills in after the primary's last date only
    assert_eq!(
        read(&out, "crude_oil_barrel_usd"),
        "date,price\n2023-05-08,80.0\n2023-05-09,81.0\n2023-05-10,82.5\n"
    );
    // sell rate while published, mean afterwards
    assert_eq!(
        read(&out, "crude_oil_litres_isk"),
        "date,price\n2023-05-08,70.45\n2023-05-09,70.31\n2023-05-10,71.61\n"
    );
    assert_eq!(
        read(&out, "currency_rate_isk_usd"),
        "date,buy,sell,mean\n2023-05-05,139.0,140.0,139.5\n2023-05-09,,,138.0\n"
    );
    assert_eq!(
        read(&out, "fuel_petrol_iceland_liter_isk"),
        "date,price\n2023-05-07,300.0\n2023-05-10,310.0\n"
    );
    assert_eq!(
        read(&out, "crude_ratio"),
        "date,ratio\n2023-05-08,0.2348\n2023-05-09,0.2344\n2023-05-10,0.2310\n"
    );
    assert!(!out.join("fuel_diesel_iceland_liter_isk.csv.txt").exists());

    let manifest = read_manifest(&config.paths.manifest).unwrap();
    assert_eq!(manifest.message, "auto.data.update.2023-05-11T06:15");
    assert_eq!(manifest.changed.len(), 5);
}

#[test]
fn second_run_changes_nothing() {
    let root = tempfile::tempdir().unwrap();
    let config = config_in(root.path());

    run_derive(&store(), &config, d("2023-05-11"), now()).unwrap();
    let report = run_derive(&store(), &config, d("2023-05-11"), now()).unwrap();

    assert!(report.export.changed.is_empty());
    assert_eq!(report.export.unchanged.len(), 5);
    assert!(read_manifest(&config.paths.manifest).unwrap().is_empty());
}

const LOG: &str = r#"[
  {"id": "c1", "timestamp": "2021-03-01T09:00:00", "tag": "auto.prices.update",
   "entities": {
     "ao": [{"unit": "ao_000", "bensin95": 230.9, "diesel": 225.9}],
     "n1": [{"unit": "n1_000", "bensin95": 241.9, "diesel": 236.9}]}},
  {"id": "c2", "timestamp": "2021-03-02T10:00:00", "tag": "auto.prices.update",
   "entities": {"n1": [{"unit": "n1_000", "bensin95": 239.9, "diesel": 236.9}]}}
]"#;

#[test]
fn history_log_becomes_spread_and_entity_streams() {
    let root = tempfile::tempdir().unwrap();
    let log_path = root.path().join("history.json");
    std::fs::write(&log_path, LOG).unwrap();
    let mut config = config_in(root.path());
    config.replay.log = Some(log_path);

    run_derive(&MemoryStore::new(), &config, d("2021-03-04"), now()).unwrap();
    let out = &config.paths.output_dir;

    assert_eq!(
        read(out, "fuel_price_spread"),
        "date,bensin95_low,bensin95_high,bensin95_spread,diesel_low,diesel_high,diesel_spread\n\
         2021-03-01,230.9,241.9,11.0,225.9,236.9,11.0\n\
         2021-03-02,230.9,239.9,9.0,225.9,236.9,11.0\n"
    );
    assert_eq!(
        read(out, "fuel_price_n1"),
        "date,bensin95_low,bensin95_high,bensin95_mean,bensin95_mode,\
         diesel_low,diesel_high,diesel_mean,diesel_mode,units\n\
         2021-03-01,241.9,241.9,241.9,241.9,236.9,236.9,236.9,236.9,1\n\
         2021-03-02,239.9,239.9,239.9,239.9,236.9,236.9,236.9,236.9,1\n"
    );
    assert_eq!(read(out, "fuel_price_ao").lines().count(), 2);
}

#[test]
fn missing_history_log_is_an_error() {
    let root = tempfile::tempdir().unwrap();
    let mut config = config_in(root.path());
    config.replay.log = Some(root.path().join("absent.json"));

    let err = run_derive(&MemoryStore::new(), &config, d("2021-03-04"), now()).unwrap_err();
    assert!(err.to_string().contains("absent.json"));
}

#[test]
fn untracked_stored_currencies_are_exported() {
    let root = tempfile::tempdir().unwrap();
    let config = config_in(root.path());
    let store = store().with_series(
        "currency_rate_isk_xdr_mean",
        &series(&[("2023-05-09", 183.1)]),
    );

    let report = run_derive(&store, &config, d("2023-05-11"), now()).unwrap();

    assert_eq!(report.streams, 6);
    assert_eq!(
        read(&config.paths.output_dir, "currency_rate_isk_xdr"),
        "date,buy,sell,mean\n2023-05-09,,,183.1\n"
    );
}
