//! Domain types: dated series, entity snapshots, change-only records.

pub mod record;
pub mod series;
pub mod snapshot;

pub use record::{
    ChangeRecord, ChangeStream, EntitySummary, EntityValues, MetricStats, Spread, SpreadValues,
};
pub use series::{round_dp, DatedValue, Series, SeriesError, SeriesId};
pub use snapshot::{EntityId, EntityReading, EntitySnapshot, UnitReading};
