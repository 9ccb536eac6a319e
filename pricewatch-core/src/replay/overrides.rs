//! Literal historical corrections consulted by the replayer.
//!
//! These are data, not logic: a bootstrap window during which one entity's
//! readings are held at known constants before its first logged snapshot,
//! and terminal dates at which an entity that stopped reporting is closed
//! with a single null row.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Constant readings for `entity` over `[start, end)`, used only while the
/// entity has no real reading yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapOverride {
    pub entity: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub primary: f64,
    pub secondary: f64,
}

impl BootstrapOverride {
    pub fn covers(&self, day: NaiveDate) -> bool {
        day >= self.start && day < self.end
    }
}

/// Closing date for an entity whose last known state is the null placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalRow {
    pub entity: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overrides {
    pub bootstrap: Vec<BootstrapOverride>,
    pub terminal: Vec<TerminalRow>,
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

impl Overrides {
    pub fn none() -> Self {
        Self::default()
    }

    /// Built-in corrections for the retail fuel history log: the `co` chain
    /// before its stations appear in the log, and the closing date of `dn`.
    pub fn historical() -> Self {
        Self {
            bootstrap: vec![BootstrapOverride {
                entity: "co".into(),
                start: ymd(2017, 5, 23),
                end: ymd(2017, 5, 31),
                primary: 169.9,
                secondary: 164.9,
            }],
            terminal: vec![TerminalRow {
                entity: "dn".into(),
                date: ymd(2020, 12, 31),
            }],
        }
    }

    /// Bootstrap constants for `entity` on `day`, if a window covers it.
    pub fn bootstrap_for(&self, entity: &str, day: NaiveDate) -> Option<&BootstrapOverride> {
        self.bootstrap
            .iter()
            .find(|b| b.entity == entity && b.covers(day))
    }

    pub fn terminal_date(&self, entity: &str) -> Option<NaiveDate> {
        self.terminal
            .iter()
            .find(|t| t.entity == entity)
            .map(|t| t.date)
    }

    /// Earliest day any bootstrap window starts.
    pub fn earliest_bootstrap(&self) -> Option<NaiveDate> {
        self.bootstrap.iter().map(|b| b.start).min()
    }

    pub fn is_empty(&self) -> bool {
        self.bootstrap.is_empty() && self.terminal.is_empty()
    }
}
