//! Reconciliation of dated series: watermark planning, source merging,
//! alignment, conversion, storage and source adapters.

pub mod align;
pub mod convert;
pub mod csv_source;
pub mod merge;
pub mod parquet_store;
pub mod provider;
pub mod store;
pub mod watermark;

pub use align::{align, ratio, AlignError, CombineError};
pub use convert::{barrel_usd_to_litre_isk, effective_rates, ConvertError, LITRES_PER_BARREL};
pub use csv_source::{CsvRateSource, CsvSeriesSource};
pub use merge::{fill_beyond, MergeError, SourceBatch, SourceMerger, UpsertSet};
pub use parquet_store::{ParquetStore, SeriesMeta};
pub use provider::{DataError, RateQuote, RateSource, RateTable, SeriesSource};
pub use store::{MemoryStore, SeriesStatus, Store, StoreError};
pub use watermark::{FetchPlan, FetchRange, PlanError, WatermarkPlanner};
