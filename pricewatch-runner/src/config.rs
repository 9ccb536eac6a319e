//! Pipeline configuration, loaded from TOML.
//!
//! Every section has defaults, so an empty file (or no file at all) is a
//! valid configuration. Source paths left unset disable that source.

use chrono::{NaiveDate, NaiveTime};
use pricewatch_core::data::LITRES_PER_BARREL;
use pricewatch_core::replay::{BadSnapshotSet, MetricKeys, Overrides, ReplayConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("invalid config: {0}")]
    Parse(String),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

/// Currencies written to output streams.
pub const TRACKED_CURRENCIES: [&str; 34] = [
    "aud", "bgn", "brl", "cad", "chf", "cny", "czk", "dkk", "eur", "gbp", "hkd", "hrk", "huf",
    "ils", "inr", "jmd", "jpy", "krw", "mxn", "ngn", "nok", "nzd", "pln", "rub", "sar", "sek",
    "sgd", "srd", "thb", "try", "twd", "usd", "xdr", "zar",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub crude: CrudeConfig,
    pub rates: RatesConfig,
    pub fuel: FuelConfig,
    pub replay: ReplaySection,
    pub derive: DeriveConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root of the Parquet series store.
    pub store_dir: PathBuf,
    /// Directory receiving the `<stream>.csv.txt` files.
    pub output_dir: PathBuf,
    /// Publish manifest for the external committer.
    pub manifest: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("store"),
            output_dir: PathBuf::from("data"),
            manifest: PathBuf::from("data/publish.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrudeConfig {
    /// `date,value` file of the primary USD/barrel source.
    pub primary: Option<PathBuf>,
    /// `date,value` file of the fallback USD/barrel source.
    pub fallback: Option<PathBuf>,
    pub earliest: NaiveDate,
    pub fallback_earliest: NaiveDate,
    pub litres_per_barrel: f64,
}

impl Default for CrudeConfig {
    fn default() -> Self {
        Self {
            primary: None,
            fallback: None,
            earliest: ymd(1987, 5, 20),
            fallback_earliest: ymd(1987, 5, 20),
            litres_per_barrel: LITRES_PER_BARREL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    /// `date,code,buy,sell,mean` file.
    pub source: Option<PathBuf>,
    pub earliest: NaiveDate,
    pub currencies: Vec<String>,
    /// Currency used to convert commodity prices.
    pub reference: String,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            source: None,
            earliest: ymd(1981, 1, 1),
            currencies: TRACKED_CURRENCIES.iter().map(|c| c.to_string()).collect(),
            reference: "usd".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuelConfig {
    pub petrol: Option<PathBuf>,
    pub diesel: Option<PathBuf>,
    pub earliest: NaiveDate,
}

impl Default for FuelConfig {
    fn default() -> Self {
        Self {
            petrol: None,
            diesel: None,
            earliest: ymd(1996, 9, 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySection {
    /// JSON history log; replay is skipped when unset.
    pub log: Option<PathBuf>,
    pub authoritative_tag: String,
    /// End-of-day cutoff, `HH:MM`.
    pub cutoff: String,
    pub primary_metric: String,
    pub secondary_metric: String,
    pub bad_snapshots: Vec<String>,
    pub historical_overrides: bool,
}

impl Default for ReplaySection {
    fn default() -> Self {
        let keys = MetricKeys::default();
        Self {
            log: None,
            authoritative_tag: "auto.prices.update".into(),
            cutoff: "23:59".into(),
            primary_metric: keys.primary,
            secondary_metric: keys.secondary,
            bad_snapshots: Vec::new(),
            historical_overrides: true,
        }
    }
}

impl ReplaySection {
    pub fn metric_keys(&self) -> MetricKeys {
        MetricKeys {
            primary: self.primary_metric.clone(),
            secondary: self.secondary_metric.clone(),
        }
    }

    pub fn cutoff_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.cutoff, "%H:%M").map_err(|e| ConfigError::Invalid {
            field: "replay.cutoff",
            reason: format!("'{}': {e}", self.cutoff),
        })
    }

    /// Core replay settings, evaluating through `through`.
    pub fn replay_config(&self, through: Option<NaiveDate>) -> Result<ReplayConfig, ConfigError> {
        Ok(ReplayConfig {
            authoritative_tag: self.authoritative_tag.clone(),
            cutoff: self.cutoff_time()?,
            bad_snapshots: self.bad_snapshots.iter().cloned().collect::<BadSnapshotSet>(),
            overrides: if self.historical_overrides {
                Overrides::historical()
            } else {
                Overrides::none()
            },
            through,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeriveConfig {
    /// Decimal places of the crude/petrol ratio.
    pub ratio_precision: u32,
}

impl Default for DeriveConfig {
    fn default() -> Self {
        Self { ratio_precision: 4 }
    }
}

impl PipelineConfig {
    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.crude.litres_per_barrel > 0.0) {
            return Err(ConfigError::Invalid {
                field: "crude.litres_per_barrel",
                reason: "must be positive".into(),
            });
        }
        if self.derive.ratio_precision > 10 {
            return Err(ConfigError::Invalid {
                field: "derive.ratio_precision",
                reason: format!("{} decimals is too many", self.derive.ratio_precision),
            });
        }
        if self.rates.reference.is_empty() {
            return Err(ConfigError::Invalid {
                field: "rates.reference",
                reason: "empty currency code".into(),
            });
        }
        self.replay.cutoff_time()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.crude.earliest, ymd(1987, 5, 20));
        assert_eq!(config.rates.earliest, ymd(1981, 1, 1));
        assert_eq!(config.fuel.earliest, ymd(1996, 9, 1));
        assert_eq!(config.rates.currencies.len(), 34);
        assert_eq!(config.derive.ratio_precision, 4);
        assert_eq!(config.replay.cutoff_time().unwrap(), NaiveTime::from_hms_opt(23, 59, 0).unwrap());
    }

    #[test]
    fn sections_override_selectively() {
        let config = PipelineConfig::from_toml(
            r#"
            [paths]
            output_dir = "out"

            [crude]
            primary = "feeds/crude.csv"
            earliest = "2000-01-01"

            [replay]
            bad_snapshots = ["c3", "c9"]
            historical_overrides = false
            "#,
        )
        .unwrap();

        assert_eq!(config.paths.output_dir, PathBuf::from("out"));
        assert_eq!(config.paths.store_dir, PathBuf::from("store"));
        assert_eq!(config.crude.primary, Some(PathBuf::from("feeds/crude.csv")));
        assert_eq!(config.crude.earliest, ymd(2000, 1, 1));
        assert_eq!(config.crude.litres_per_barrel, LITRES_PER_BARREL);

        let replay = config.replay.replay_config(None).unwrap();
        assert!(replay.bad_snapshots.contains("c9"));
        assert_eq!(replay.overrides, Overrides::none());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            PipelineConfig::from_toml("[replay]\ncutoff = \"late\""),
            Err(ConfigError::Invalid { field: "replay.cutoff", .. })
        ));
        assert!(matches!(
            PipelineConfig::from_toml("[crude]\nlitres_per_barrel = 0.0"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            PipelineConfig::from_toml("[paths\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn toml_roundtrip_keeps_values() {
        let mut config = PipelineConfig::default();
        config.fuel.petrol = Some(PathBuf::from("petrol.csv"));
        let text = config.to_toml().unwrap();
        assert_eq!(PipelineConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = PipelineConfig::from_file(Path::new("/nonexistent/pricewatch.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
