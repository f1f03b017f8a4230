//! Command handler modules for cwh-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod ingest;
pub mod run;
pub mod summary;

use anyhow::{Context, Result};
use cwh_config::{report_unused_keys, IngestConfig, LoadedConfig, UnusedKeyPolicy};
use cwh_db::PgPool;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Built-in defaults, then each YAML layer in order. Unused keys are
/// reported on stderr and never fail the command.
pub fn load_config(paths: &[String]) -> Result<LoadedConfig> {
    let loaded = if paths.is_empty() {
        cwh_config::load_defaults()?
    } else {
        let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
        cwh_config::load_layered_yaml(&path_refs)?
    };

    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        eprintln!(
            "WARN: CONFIG_UNUSED_KEYS unused_leaf_keys={}",
            report.unused_leaf_pointers.len()
        );
        for p in report.unused_leaf_pointers.iter().take(50) {
            eprintln!("  unused={}", p);
        }
        let extra = report.unused_leaf_pointers.len().saturating_sub(50);
        if extra > 0 {
            eprintln!("  ... and {} more", extra);
        }
    }

    Ok(loaded)
}

/// Resolve the URL from the env var named by `db.url_env`, then connect.
pub async fn connect(cfg: &IngestConfig) -> Result<PgPool> {
    let url = cwh_config::resolve_database_url(&cfg.db)?;
    cwh_db::connect(url.expose(), cfg.db.max_connections)
        .await
        .with_context(|| format!("connect via {} failed", url.env_name()))
}

pub fn opt_dt(dt: &Option<chrono::NaiveDateTime>) -> String {
    dt.as_ref()
        .map(|d| d.and_utc().to_rfc3339())
        .unwrap_or_default()
}
