//! Ingestion command handlers: `cwh backfill` and `cwh ingest-live`.
//!
//! Parameters are validated before any connection is opened. The pipeline
//! owns the run log; these handlers only wire the Postgres and HTTP
//! implementations into its ports and print the outcome.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::warn;

use cwh_md::{CoinGeckoSource, TokioPause, UpstreamClient};
use cwh_runtime::pg::{PgEntityDirectory, PgRunLog, PgStagingStore, PgTransformProcedure};
use cwh_runtime::{BackfillParams, BackfillProgress, LiveParams, Pipeline, Ports};

use super::summary::{run_label, write_backfill_summary, BackfillArtifact};
use super::{connect, load_config};

// ---------------------------------------------------------------------------
// backfill
// ---------------------------------------------------------------------------

/// CLI flags; each one overrides the merged config when present.
pub struct BackfillArgs {
    pub days: Option<i64>,
    pub top_coins: Option<i64>,
    pub vs_currency: Option<String>,
    pub pause_seconds: Option<f64>,
    pub config_paths: Vec<String>,
}

pub async fn backfill(args: BackfillArgs) -> Result<()> {
    let loaded = load_config(&args.config_paths)?;
    let cfg = &loaded.config;

    let params = BackfillParams::new(
        args.days.unwrap_or(cfg.backfill.days),
        args.top_coins.unwrap_or(cfg.backfill.top_coins),
        args.vs_currency.as_deref().unwrap_or(&cfg.backfill.vs_currency),
        args.pause_seconds.unwrap_or(cfg.backfill.pause_seconds),
    )?;

    let pool = connect(cfg).await?;
    let client = UpstreamClient::from_config(&cfg.upstream, Arc::new(TokioPause))?;
    let source = CoinGeckoSource::new(client);
    let directory = PgEntityDirectory::new(pool.clone());
    let staging = PgStagingStore::new(pool.clone());
    let runs = PgRunLog::new(pool.clone());
    let transform = PgTransformProcedure::new(pool, &cfg.db.transform_procedure)?;

    let pipeline = Pipeline::new(Ports {
        source: &source,
        directory: &directory,
        staging: &staging,
        runs: &runs,
        transform: &transform,
        pause: &TokioPause,
    });

    let summary = match pipeline.run_backfill(&params, Utc::now()).await {
        Ok(summary) => summary,
        Err(e) => {
            // Skips and staged counts are still worth reporting on a failed run.
            if let Some(progress) = &e.partial {
                for line in progress_lines(progress) {
                    println!("{line}");
                }
            }
            println!("config_hash={}", loaded.config_hash);
            return Err(e.into());
        }
    };

    println!("run_id={}", opt_id(summary.run_id));
    for line in progress_lines(&summary.progress()) {
        println!("{line}");
    }
    println!("transformation={}", summary.transformation.as_str());
    println!("config_hash={}", loaded.config_hash);

    let generated_at_utc = Utc::now();
    let artifact = BackfillArtifact {
        schema_version: 1,
        config_hash: &loaded.config_hash,
        generated_at_utc,
        summary: &summary,
        coverage_text: summary.coverage.to_string(),
    };
    let label = run_label(summary.run_id, generated_at_utc);
    // The run is already closed; a failed artifact write is reported, not fatal.
    match write_backfill_summary(Path::new(&cfg.exports.root), &label, &artifact) {
        Ok(path) => println!("summary_path={}", path.display()),
        Err(e) => warn!(label = %label, error = %format!("{e:#}"), "backfill summary not written"),
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// ingest-live
// ---------------------------------------------------------------------------

pub async fn ingest_live(
    top_coins: Option<i64>,
    vs_currency: Option<String>,
    config_paths: Vec<String>,
) -> Result<()> {
    let loaded = load_config(&config_paths)?;
    let cfg = &loaded.config;

    let params = LiveParams::new(
        top_coins.unwrap_or(cfg.live.top_coins),
        vs_currency.as_deref().unwrap_or(&cfg.live.vs_currency),
    )?;

    let pool = connect(cfg).await?;
    let client = UpstreamClient::from_config(&cfg.upstream, Arc::new(TokioPause))?;
    let source = CoinGeckoSource::new(client);
    let directory = PgEntityDirectory::new(pool.clone());
    let staging = PgStagingStore::new(pool.clone());
    let runs = PgRunLog::new(pool.clone());
    let transform = PgTransformProcedure::new(pool, &cfg.db.transform_procedure)?;

    let pipeline = Pipeline::new(Ports {
        source: &source,
        directory: &directory,
        staging: &staging,
        runs: &runs,
        transform: &transform,
        pause: &TokioPause,
    });

    let summary = pipeline.run_live(&params, Utc::now()).await?;

    println!("run_id={}", opt_id(summary.run_id));
    println!("vs_currency={}", summary.vs_currency);
    println!("snapshots={}", summary.snapshots);
    println!("records_staged={}", summary.records_staged);
    println!("config_hash={}", loaded.config_hash);

    Ok(())
}

fn opt_id(id: Option<i64>) -> String {
    id.map(|v| v.to_string()).unwrap_or_default()
}

/// `key=value` lines shared by the success and failure paths.
fn progress_lines(p: &BackfillProgress) -> Vec<String> {
    let skipped_ids: Vec<&str> = p.skipped.iter().map(|s| s.entity_id.as_str()).collect();
    vec![
        format!("universe_source={}", p.universe_source.as_str()),
        format!("entities_resolved={}", p.entities_resolved),
        format!("entities_processed={}", p.entities_processed),
        format!("entities_skipped={}", p.skipped.len()),
        format!("skipped={}", skipped_ids.join(",")),
        format!("records_staged={}", p.records_staged),
        format!("snapshots_staged={}", p.snapshots_staged),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwh_md::{SkippedEntity, UniverseSource};

    #[test]
    fn progress_lines_name_every_skipped_entity() {
        let p = BackfillProgress {
            universe_source: UniverseSource::Directory,
            entities_resolved: 3,
            entities_processed: 3,
            skipped: vec![
                SkippedEntity {
                    entity_id: "b".to_string(),
                    reason: "HTTP 503".to_string(),
                },
                SkippedEntity {
                    entity_id: "c".to_string(),
                    reason: "HTTP 503".to_string(),
                },
            ],
            records_staged: 4,
            snapshots_staged: 4,
        };

        let lines = progress_lines(&p);
        assert!(lines.contains(&"universe_source=directory".to_string()));
        assert!(lines.contains(&"entities_processed=3".to_string()));
        assert!(lines.contains(&"entities_skipped=2".to_string()));
        assert!(lines.contains(&"skipped=b,c".to_string()));
        assert!(lines.contains(&"records_staged=4".to_string()));
    }
}
