//! Backfill summary artifact: `<exports_root>/backfill/<label>/summary.json`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use cwh_runtime::BackfillSummary;

#[derive(Debug, Serialize)]
pub struct BackfillArtifact<'a> {
    pub schema_version: i32,
    pub config_hash: &'a str,
    pub generated_at_utc: DateTime<Utc>,
    pub summary: &'a BackfillSummary,
    /// Human-readable rendering of `summary.coverage`.
    pub coverage_text: String,
}

/// `run-<id>` when the run log recorded the start, otherwise a UTC stamp.
pub fn run_label(run_id: Option<i64>, at: DateTime<Utc>) -> String {
    match run_id {
        Some(id) => format!("run-{id}"),
        None => format!("local-{}", at.format("%Y%m%dT%H%M%SZ")),
    }
}

pub fn write_backfill_summary(
    exports_root: &Path,
    label: &str,
    artifact: &BackfillArtifact<'_>,
) -> Result<PathBuf> {
    let dir = exports_root.join("backfill").join(label);
    fs::create_dir_all(&dir)
        .with_context(|| format!("create exports dir failed: {}", dir.display()))?;

    let path = dir.join("summary.json");
    let json = serde_json::to_string_pretty(artifact).context("serialize backfill summary failed")?;
    fs::write(&path, format!("{json}\n"))
        .with_context(|| format!("write backfill summary failed: {}", path.display()))?;

    Ok(path)
}
