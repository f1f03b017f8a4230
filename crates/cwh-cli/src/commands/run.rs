//! Run-log command handlers: `cwh run status` and `cwh run open`.

use anyhow::{bail, Result};
use chrono::{Duration, Utc};

use cwh_config::IngestConfig;

use super::{connect, opt_dt};

pub async fn status(cfg: &IngestConfig, run_id: i64) -> Result<()> {
    let pool = connect(cfg).await?;
    let Some(r) = cwh_db::fetch_run(&pool, run_id).await? else {
        bail!("run not found: run_id={run_id}");
    };

    println!("run_id={}", r.run_id);
    println!("status={}", r.status.as_str());
    println!("started_at_utc={}", r.started_at.and_utc().to_rfc3339());
    println!("ended_at_utc={}", opt_dt(&r.ended_at));
    println!("error_message={}", r.error_message.unwrap_or_default());
    Ok(())
}

/// A run left RUNNING long after it started was most likely interrupted.
/// Listed for the operator; nothing is closed automatically.
pub async fn open(cfg: &IngestConfig, older_than_minutes: Option<i64>) -> Result<()> {
    let started_before = match older_than_minutes {
        Some(m) if m < 0 => bail!("--older-than-minutes must be >= 0, got {m}"),
        Some(m) => Some((Utc::now() - Duration::minutes(m)).naive_utc()),
        None => None,
    };

    let pool = connect(cfg).await?;
    let runs = cwh_db::list_open_runs(&pool, started_before).await?;

    println!("open_runs={}", runs.len());
    for r in &runs {
        println!(
            "run_id={} status={} started_at_utc={}",
            r.run_id,
            r.status.as_str(),
            r.started_at.and_utc().to_rfc3339()
        );
    }
    Ok(())
}
