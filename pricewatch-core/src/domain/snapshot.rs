//! Periodic multi-entity observations.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Entity key (e.g. a fuel retailer code such as `n1`).
pub type EntityId = String;

/// One observing unit (e.g. a station) inside an entity reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitReading {
    pub unit: String,
    pub primary: Option<f64>,
    pub secondary: Option<f64>,
}

/// Everything one entity reported in a single snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityReading {
    pub units: Vec<UnitReading>,
}

impl EntityReading {
    pub fn new(units: Vec<UnitReading>) -> Self {
        Self { units }
    }

    /// Number of observing units contributing to this reading.
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn primary_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.units.iter().filter_map(|u| u.primary)
    }

    pub fn secondary_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.units.iter().filter_map(|u| u.secondary)
    }
}

/// One entry of the history log.
///
/// A `None` reading is the placeholder for an entity that stopped reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: String,
    pub timestamp: NaiveDateTime,
    pub tag: String,
    pub readings: BTreeMap<EntityId, Option<EntityReading>>,
}

impl EntitySnapshot {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}
