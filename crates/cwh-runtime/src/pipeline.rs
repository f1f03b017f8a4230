//! Backfill and live ingestion pipelines.
//!
//! Both follow the same shape: start a run, do the work, close the run
//! exactly once with SUCCESS or FAILED. The work itself never touches the
//! run log; the close is a single `match` on its result.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use cwh_config::IngestConfig;
use cwh_md::{
    AlignRequest, AlignmentEngine, CoverageReport, EntityDirectory, MarketDataSource, Pause,
    SkippedEntity, UniverseResolver, UniverseSource,
};

use crate::error::PipelineError;
use crate::staging::{StagingStore, StagingWriter};
use crate::tracker::{RunLogStore, RunStatus, RunTracker};
use crate::transform::{TransformProcedure, TransformationTrigger};

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Validated backfill parameters. Construct with [`BackfillParams::new`];
/// an invalid value is rejected before any network or DB work.
#[derive(Debug, Clone, PartialEq)]
pub struct BackfillParams {
    days: u32,
    top_coins: u32,
    vs_currency: String,
    pause: Duration,
}

impl BackfillParams {
    pub fn new(
        days: i64,
        top_coins: i64,
        vs_currency: &str,
        pause_seconds: f64,
    ) -> Result<Self, PipelineError> {
        let days = positive_u32("--days", days)?;
        let top_coins = positive_u32("--top-coins", top_coins)?;
        let vs_currency = currency(vs_currency)?;
        if !pause_seconds.is_finite() || pause_seconds < 0.0 {
            return Err(PipelineError::InvalidParams(format!(
                "--pause-seconds must be a finite number >= 0, got {pause_seconds}"
            )));
        }
        let pause = Duration::try_from_secs_f64(pause_seconds).map_err(|_| {
            PipelineError::InvalidParams(format!("--pause-seconds is too large, got {pause_seconds}"))
        })?;

        Ok(Self {
            days,
            top_coins,
            vs_currency,
            pause,
        })
    }

    pub fn from_config(cfg: &IngestConfig) -> Result<Self, PipelineError> {
        let b = &cfg.backfill;
        Self::new(b.days, b.top_coins, &b.vs_currency, b.pause_seconds)
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    pub fn top_coins(&self) -> u32 {
        self.top_coins
    }

    pub fn vs_currency(&self) -> &str {
        &self.vs_currency
    }

    pub fn pause(&self) -> Duration {
        self.pause
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveParams {
    top_coins: u32,
    vs_currency: String,
}

impl LiveParams {
    pub fn new(top_coins: i64, vs_currency: &str) -> Result<Self, PipelineError> {
        Ok(Self {
            top_coins: positive_u32("--top-coins", top_coins)?,
            vs_currency: currency(vs_currency)?,
        })
    }

    pub fn from_config(cfg: &IngestConfig) -> Result<Self, PipelineError> {
        Self::new(cfg.live.top_coins, &cfg.live.vs_currency)
    }

    pub fn top_coins(&self) -> u32 {
        self.top_coins
    }

    pub fn vs_currency(&self) -> &str {
        &self.vs_currency
    }
}

fn positive_u32(flag: &str, v: i64) -> Result<u32, PipelineError> {
    if v < 1 {
        return Err(PipelineError::InvalidParams(format!("{flag} must be >= 1, got {v}")));
    }
    u32::try_from(v)
        .map_err(|_| PipelineError::InvalidParams(format!("{flag} is too large, got {v}")))
}

fn currency(s: &str) -> Result<String, PipelineError> {
    let c = s.trim().to_ascii_lowercase();
    if c.is_empty() {
        return Err(PipelineError::InvalidParams(
            "--vs-currency must not be empty".to_string(),
        ));
    }
    Ok(c)
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationState {
    Triggered,
    /// Nothing was staged, so there was nothing to parse.
    SkippedNoRecords,
}

impl TransformationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformationState::Triggered => "triggered",
            TransformationState::SkippedNoRecords => "skipped_no_records",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackfillSummary {
    pub run_id: Option<i64>,
    pub days: u32,
    pub vs_currency: String,
    pub window_from_secs: i64,
    pub window_to_secs: i64,
    pub universe_source: UniverseSource,
    pub entities_resolved: usize,
    pub entities_processed: usize,
    pub skipped: Vec<SkippedEntity>,
    pub records_staged: u64,
    pub snapshots_staged: usize,
    pub transformation: TransformationState,
    pub coverage: CoverageReport,
}

impl BackfillSummary {
    pub fn progress(&self) -> BackfillProgress {
        BackfillProgress {
            universe_source: self.universe_source,
            entities_resolved: self.entities_resolved,
            entities_processed: self.entities_processed,
            skipped: self.skipped.clone(),
            records_staged: self.records_staged,
            snapshots_staged: self.snapshots_staged,
        }
    }
}

/// How far a backfill got. Present on a failure once alignment finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillProgress {
    pub universe_source: UniverseSource,
    pub entities_resolved: usize,
    pub entities_processed: usize,
    pub skipped: Vec<SkippedEntity>,
    /// Zero when staging itself failed (the batch is all-or-nothing).
    pub records_staged: u64,
    pub snapshots_staged: usize,
}

/// A failed backfill plus the progress made before the failure.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct BackfillError {
    pub error: PipelineError,
    pub partial: Option<BackfillProgress>,
}

impl BackfillError {
    fn before_alignment(error: impl Into<PipelineError>) -> Self {
        Self {
            error: error.into(),
            partial: None,
        }
    }

    fn after_alignment(error: impl Into<PipelineError>, progress: BackfillProgress) -> Self {
        Self {
            error: error.into(),
            partial: Some(progress),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveSummary {
    pub run_id: Option<i64>,
    pub vs_currency: String,
    pub snapshots: usize,
    pub records_staged: u64,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Every external collaborator of a pipeline invocation.
#[derive(Clone, Copy)]
pub struct Ports<'a> {
    pub source: &'a dyn MarketDataSource,
    pub directory: &'a dyn EntityDirectory,
    pub staging: &'a dyn StagingStore,
    pub runs: &'a dyn RunLogStore,
    pub transform: &'a dyn TransformProcedure,
    pub pause: &'a dyn Pause,
}

pub struct Pipeline<'a> {
    ports: Ports<'a>,
}

impl<'a> Pipeline<'a> {
    pub fn new(ports: Ports<'a>) -> Self {
        Self { ports }
    }

    /// Resolve, align, stage, transform. `now` anchors the history window.
    pub async fn run_backfill(
        &self,
        params: &BackfillParams,
        now: DateTime<Utc>,
    ) -> Result<BackfillSummary, BackfillError> {
        let tracker = RunTracker::new(self.ports.runs);
        let handle = tracker.start().await;
        let run_id = handle.run_id();

        let result = self.backfill_steps(run_id, params, now).await;
        match &result {
            Ok(s) => {
                tracker.finish(handle, RunStatus::Success, None).await;
                info!(
                    run_id = ?run_id,
                    records_staged = s.records_staged,
                    entities = s.entities_processed,
                    skipped = s.skipped.len(),
                    days = params.days(),
                    "backfill complete"
                );
            }
            Err(e) => {
                let msg = e.to_string();
                tracker.finish(handle, RunStatus::Failed, Some(&msg)).await;
                error!(run_id = ?run_id, error = %msg, "backfill failed");
            }
        }
        result
    }

    async fn backfill_steps(
        &self,
        run_id: Option<i64>,
        params: &BackfillParams,
        now: DateTime<Utc>,
    ) -> Result<BackfillSummary, BackfillError> {
        let p = self.ports;

        let universe = UniverseResolver::new(p.source, p.directory)
            .resolve(params.vs_currency(), params.top_coins())
            .await
            .map_err(BackfillError::before_alignment)?;

        let req = AlignRequest {
            quote: params.vs_currency().to_string(),
            days_back: params.days(),
            inter_entity_pause: params.pause(),
            now,
        };
        let (window_from_secs, window_to_secs) = req.window_secs();
        let outcome = AlignmentEngine::new(p.source, p.pause)
            .align(&universe.entities, &req)
            .await
            .map_err(BackfillError::before_alignment)?;

        let mut progress = BackfillProgress {
            universe_source: universe.source,
            entities_resolved: universe.entities.len(),
            entities_processed: outcome.entities_processed,
            skipped: outcome.skipped.entities.clone(),
            records_staged: 0,
            snapshots_staged: 0,
        };

        let staged = match StagingWriter::new(p.staging)
            .write_buckets(&outcome.buckets)
            .await
        {
            Ok(staged) => staged,
            Err(e) => return Err(BackfillError::after_alignment(e, progress)),
        };
        progress.records_staged = staged.records;
        progress.snapshots_staged = staged.snapshots;

        let transformation = if staged.records == 0 {
            info!("no historical snapshots staged; skipping transformation");
            TransformationState::SkippedNoRecords
        } else {
            if let Err(e) = TransformationTrigger::new(p.transform).trigger().await {
                return Err(BackfillError::after_alignment(e, progress));
            }
            TransformationState::Triggered
        };

        Ok(BackfillSummary {
            run_id,
            days: params.days(),
            vs_currency: params.vs_currency().to_string(),
            window_from_secs,
            window_to_secs,
            universe_source: universe.source,
            entities_resolved: universe.entities.len(),
            entities_processed: outcome.entities_processed,
            skipped: outcome.skipped.entities,
            records_staged: staged.records,
            snapshots_staged: staged.snapshots,
            transformation,
            coverage: outcome.coverage,
        })
    }

    /// Current top-N listing as one staging record, then transform.
    pub async fn run_live(
        &self,
        params: &LiveParams,
        now: DateTime<Utc>,
    ) -> Result<LiveSummary, PipelineError> {
        let tracker = RunTracker::new(self.ports.runs);
        let handle = tracker.start().await;
        let run_id = handle.run_id();

        let result = self.live_steps(run_id, params, now).await;
        match &result {
            Ok(s) => {
                tracker.finish(handle, RunStatus::Success, None).await;
                info!(run_id = ?run_id, snapshots = s.snapshots, "live ingestion complete");
            }
            Err(e) => {
                let msg = e.to_string();
                tracker.finish(handle, RunStatus::Failed, Some(&msg)).await;
                error!(run_id = ?run_id, error = %msg, "live ingestion failed");
            }
        }
        result
    }

    async fn live_steps(
        &self,
        run_id: Option<i64>,
        params: &LiveParams,
        now: DateTime<Utc>,
    ) -> Result<LiveSummary, PipelineError> {
        let p = self.ports;

        let rows = p
            .source
            .top_markets(params.vs_currency(), params.top_coins())
            .await
            .map_err(|e| PipelineError::NoData(e.to_string()))?;

        let snapshots: Vec<_> = rows.iter().filter_map(|r| r.to_snapshot()).collect();
        if snapshots.is_empty() {
            return Err(PipelineError::NoData(format!(
                "upstream listing returned {} row(s), none with an id",
                rows.len()
            )));
        }

        let staged = StagingWriter::new(p.staging)
            .write_live(&snapshots, now)
            .await?;

        TransformationTrigger::new(p.transform).trigger().await?;

        Ok(LiveSummary {
            run_id,
            vs_currency: params.vs_currency().to_string(),
            snapshots: staged.snapshots,
            records_staged: staged.records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_reject_non_positive_counts() {
        assert!(matches!(
            BackfillParams::new(0, 20, "usd", 1.2),
            Err(PipelineError::InvalidParams(_))
        ));
        assert!(matches!(
            BackfillParams::new(90, -1, "usd", 1.2),
            Err(PipelineError::InvalidParams(_))
        ));
        assert!(BackfillParams::new(90, 20, " ", 1.2).is_err());
        assert!(BackfillParams::new(90, 20, "usd", -0.5).is_err());
        assert!(BackfillParams::new(90, 20, "usd", f64::NAN).is_err());
        assert!(matches!(
            BackfillParams::new(90, 20, "usd", 1e20),
            Err(PipelineError::InvalidParams(_))
        ));
        assert!(LiveParams::new(0, "usd").is_err());
    }

    #[test]
    fn params_normalise_currency_and_pause() {
        let p = BackfillParams::new(1, 1, " USD ", 0.0).unwrap();
        assert_eq!(p.vs_currency(), "usd");
        assert!(p.pause().is_zero());

        let defaults = BackfillParams::from_config(&IngestConfig::default()).unwrap();
        assert_eq!(defaults.days(), 90);
        assert_eq!(defaults.top_coins(), 20);
        assert!((defaults.pause().as_secs_f64() - 1.2).abs() < 1e-6);
    }
}
