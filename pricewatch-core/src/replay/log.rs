//! History log parsing.
//!
//! The log is a JSON array, one object per snapshot:
//!
//! ```json
//! [
//!   {
//!     "id": "5f1c0d2",
//!     "timestamp": "2017-05-16T14:02:11",
//!     "tag": "auto.prices.update",
//!     "entities": {
//!       "n1": [{ "unit": "n1_000", "bensin95": 199.9, "diesel": 189.9 }],
//!       "dn": null
//!     }
//!   }
//! ]
//! ```
//!
//! A `null` entity marks a retailer that stopped reporting. A unit without a
//! given metric (or with `null`) does not sell that grade.
//!
//! One bad entry is recorded as a [`MalformedSnapshot`] and skipped; a log
//! that is not a JSON array at all, or has no usable entry, is fatal.

use crate::domain::{EntityReading, EntitySnapshot, UnitReading};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("history log unreadable: {0}")]
    SystemicParse(String),
}

/// A single log entry that could not be turned into a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("malformed snapshot #{index} ({}): {reason}", .id.as_deref().unwrap_or("no id"))]
pub struct MalformedSnapshot {
    pub index: usize,
    pub id: Option<String>,
    pub reason: String,
}

/// JSON keys of the two metrics carried by each unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricKeys {
    pub primary: String,
    pub secondary: String,
}

impl Default for MetricKeys {
    fn default() -> Self {
        Self {
            primary: "bensin95".into(),
            secondary: "diesel".into(),
        }
    }
}

/// Parsed history log: usable snapshots in log order, plus skipped entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryLog {
    pub snapshots: Vec<EntitySnapshot>,
    pub malformed: Vec<MalformedSnapshot>,
}

impl HistoryLog {
    pub fn from_snapshots(snapshots: Vec<EntitySnapshot>) -> Self {
        Self {
            snapshots,
            malformed: Vec::new(),
        }
    }

    pub fn parse(text: &str, keys: &MetricKeys) -> Result<Self, ReplayError> {
        let root: Value = serde_json::from_str(text)
            .map_err(|e| ReplayError::SystemicParse(format!("invalid JSON: {e}")))?;
        let Value::Array(entries) = root else {
            return Err(ReplayError::SystemicParse(
                "top level is not an array".into(),
            ));
        };

        let mut log = HistoryLog::default();
        for (index, entry) in entries.iter().enumerate() {
            match parse_entry(entry, keys) {
                Ok(snapshot) => log.snapshots.push(snapshot),
                Err(reason) => {
                    let skipped = MalformedSnapshot {
                        index,
                        id: entry.get("id").and_then(Value::as_str).map(str::to_string),
                        reason,
                    };
                    warn!(index, id = ?skipped.id, reason = %skipped.reason, "skipping malformed snapshot");
                    log.malformed.push(skipped);
                }
            }
        }

        if log.snapshots.is_empty() && !entries.is_empty() {
            return Err(ReplayError::SystemicParse(format!(
                "none of {} entries could be parsed",
                entries.len()
            )));
        }
        Ok(log)
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|t| t.naive_local()))
}

fn required_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a str, String> {
    obj.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing or non-string '{key}'"))
}

fn metric(unit: &Map<String, Value>, key: &str) -> Result<Option<f64>, String> {
    match unit.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("metric '{key}' is not a number")),
    }
}

fn parse_entry(entry: &Value, keys: &MetricKeys) -> Result<EntitySnapshot, String> {
    let obj = entry.as_object().ok_or("entry is not an object")?;
    let id = required_str(obj, "id")?.to_string();
    let tag = required_str(obj, "tag")?.to_string();
    let raw_ts = required_str(obj, "timestamp")?;
    let timestamp =
        parse_timestamp(raw_ts).ok_or_else(|| format!("unparseable timestamp '{raw_ts}'"))?;
    let entities = obj
        .get("entities")
        .and_then(Value::as_object)
        .ok_or("missing or non-object 'entities'")?;

    let mut readings = BTreeMap::new();
    for (entity, value) in entities {
        let reading = match value {
            Value::Null => None,
            Value::Array(units) => {
                let mut parsed = Vec::with_capacity(units.len());
                for unit in units {
                    let unit = unit
                        .as_object()
                        .ok_or_else(|| format!("unit of '{entity}' is not an object"))?;
                    parsed.push(UnitReading {
                        unit: unit
                            .get("unit")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        primary: metric(unit, &keys.primary)?,
                        secondary: metric(unit, &keys.secondary)?,
                    });
                }
                Some(EntityReading::new(parsed))
            }
            _ => return Err(format!("entity '{entity}' is neither a list nor null")),
        };
        readings.insert(entity.clone(), reading);
    }

    Ok(EntitySnapshot {
        id,
        timestamp,
        tag,
        readings,
    })
}
