//! History replay: rebuild per-entity rolling state from a snapshot log and
//! emit change-only spread and summary streams.

pub mod log;
pub mod overrides;
pub mod replayer;
pub mod state;
pub mod stats;

pub use log::{HistoryLog, MalformedSnapshot, MetricKeys, ReplayError};
pub use overrides::{BootstrapOverride, Overrides, TerminalRow};
pub use replayer::{
    replay, BadSnapshotSet, HistoryReplayer, ReplayConfig, ReplayOutput, ReplayPhase,
};
pub use state::{EntityState, RollingState};
