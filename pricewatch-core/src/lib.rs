//! Pricewatch Core: incremental reconciliation of dated price series.
//!
//! - Domain types (dated values, series, entity snapshots, change-only records)
//! - Watermark planning: what range each source still has to deliver
//! - Primary/fallback merging into per-series upsert sets
//! - Two-pointer alignment of independently dated series
//! - History replay of periodic multi-entity snapshots
//! - Store contract (in-memory and Parquet) and CSV source adapters

pub mod data;
pub mod domain;
pub mod replay;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: values handed between pipelines are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Series>();
        require_sync::<domain::Series>();
        require_send::<domain::EntitySnapshot>();
        require_sync::<domain::EntitySnapshot>();
        require_send::<data::UpsertSet>();
        require_sync::<data::UpsertSet>();
        require_send::<data::MemoryStore>();
        require_sync::<data::MemoryStore>();
        require_send::<data::ParquetStore>();
        require_sync::<data::ParquetStore>();
        require_send::<replay::ReplayOutput>();
        require_sync::<replay::ReplayOutput>();
        require_send::<replay::HistoryReplayer>();
        require_sync::<replay::HistoryReplayer>();
    }

    /// Architecture contract: the aligner's combine function sees values
    /// only, never dates, so it cannot reorder or drop points.
    #[test]
    fn combine_signature_is_value_only() {
        fn _check(a: &domain::Series, b: &domain::Series) -> Result<domain::Series, data::AlignError> {
            data::align(a, b, |x: f64, y: f64| Ok(x + y))
        }
    }
}
