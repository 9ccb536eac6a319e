//! Publish manifest (JSON) for the external committer.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of the commit message recorded in the manifest.
pub const MESSAGE_PREFIX: &str = "auto.data.update";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishManifest {
    /// `auto.data.update.<YYYY-MM-DDTHH:MM>`
    pub message: String,
    /// Stream files whose content changed in this run.
    pub changed: Vec<PathBuf>,
}

impl PublishManifest {
    pub fn new(generated_at: NaiveDateTime, changed: Vec<PathBuf>) -> Self {
        Self {
            message: format!("{MESSAGE_PREFIX}.{}", generated_at.format("%Y-%m-%dT%H:%M")),
            changed,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

pub fn write_manifest(path: &Path, manifest: &PublishManifest) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json =
        serde_json::to_string_pretty(manifest).context("Failed to serialize publish manifest")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write manifest to {}", path.display()))?;
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<PublishManifest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    serde_json::from_str(&text).context("Failed to parse publish manifest")
}
