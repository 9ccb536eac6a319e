//! Pricewatch Runner: fetch and derive pipelines over the reconciliation core.
//!
//! This crate builds on `pricewatch-core` to provide:
//! - TOML pipeline configuration with defaults for every section
//! - The fetch pipeline: watermark planning, source adapters, merging and
//!   an all-or-nothing store commit
//! - The derive pipeline: conversion, alignment and history replay into
//!   output streams
//! - CSV stream export and the publish manifest

pub mod catalog;
pub mod config;
pub mod derive;
pub mod export;
pub mod fetch;
pub mod manifest;

use pricewatch_core::data::{
    AlignError, ConvertError, DataError, MergeError, PlanError, StoreError,
};
use pricewatch_core::replay::ReplayError;
use thiserror::Error;

pub use config::{ConfigError, PipelineConfig};
pub use derive::{build_streams, run_derive, DeriveReport};
pub use export::{write_streams, ExportReport, StreamTable};
pub use fetch::{fetch_all, FetchOutcome, FetchReport, FetchSources, GroupReport};
pub use manifest::{read_manifest, write_manifest, PublishManifest};

/// Any failure of a pipeline run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("planning error: {0}")]
    Plan(#[from] PlanError),
    #[error("source error: {0}")]
    Data(#[from] DataError),
    #[error("merge error: {0}")]
    Merge(#[from] MergeError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("alignment error: {0}")]
    Align(#[from] AlignError),
    #[error("conversion error: {0}")]
    Convert(#[from] ConvertError),
    #[error("history log error: {0}")]
    Replay(#[from] ReplayError),
    #[error("cannot read {path}: {reason}")]
    Io { path: String, reason: String },
}
