//! Scenario: full backfill over a healthy upstream.
//!
//! # Invariants under test
//!
//! 1. Every bucket becomes one staging record, appended in ascending
//!    timestamp order in a single batch.
//! 2. The transformation runs exactly once, after staging.
//! 3. The run is recorded RUNNING then SUCCESS with no error message.
//! 4. History is requested over `[now - days, now]` in the chosen currency.

use cwh_md::UniverseSource;
use cwh_runtime::{BackfillParams, RunStatus, TransformationState};
use cwh_testkit::{fixed_now, full_history, market_row, FakeMarketData, Harness};

const T0: i64 = 1_706_745_600_000;
const HOUR_MS: i64 = 3_600_000;

#[tokio::test]
async fn backfill_stages_every_bucket_then_transforms() -> anyhow::Result<()> {
    let ts = [T0, T0 + HOUR_MS, T0 + 2 * HOUR_MS];
    let source = FakeMarketData::new()
        .with_markets(vec![market_row("bitcoin", 60_000.0), market_row("ethereum", 3_000.0)])
        .with_history("bitcoin", full_history(&ts, 60_000.0))
        .with_history("ethereum", full_history(&ts[1..], 3_000.0));
    let h = Harness::new(source);

    let params = BackfillParams::new(30, 2, "USD", 0.0)?;
    let summary = h.pipeline().run_backfill(&params, fixed_now()).await?;

    // --- summary -------------------------------------------------------------
    assert_eq!(summary.universe_source, UniverseSource::Upstream);
    assert_eq!(summary.entities_resolved, 2);
    assert_eq!(summary.entities_processed, 2);
    assert!(summary.skipped.is_empty());
    assert_eq!(summary.records_staged, 3);
    assert_eq!(summary.snapshots_staged, 5);
    assert_eq!(summary.transformation, TransformationState::Triggered);
    assert!(summary.coverage.is_complete());

    // --- staging -------------------------------------------------------------
    let records = h.staging.records();
    assert_eq!(h.staging.append_calls(), 1);
    let times: Vec<i64> = records
        .iter()
        .map(|r| r.ingested_at.and_utc().timestamp_millis())
        .collect();
    assert_eq!(times, ts.to_vec());
    assert_eq!(records[0].payload.as_array().map(Vec::len), Some(1));
    assert_eq!(records[1].payload.as_array().map(Vec::len), Some(2));
    assert_eq!(records[1].payload[0]["id"], "bitcoin");
    assert_eq!(records[1].payload[1]["id"], "ethereum");

    // --- history window ------------------------------------------------------
    let calls = h.source.history_calls();
    assert_eq!(calls.len(), 2);
    let now_secs = fixed_now().timestamp();
    for c in &calls {
        assert_eq!(c.quote, "usd");
        assert_eq!(c.to_secs, now_secs);
        assert_eq!(c.from_secs, now_secs - 30 * 86_400);
    }
    assert_eq!((summary.window_from_secs, summary.window_to_secs), (calls[0].from_secs, now_secs));

    // --- transformation + run log --------------------------------------------
    assert_eq!(h.transform.calls(), 1);
    let run = h.runs.only_run();
    assert_eq!(run.status, RunStatus::Success);
    assert!(run.ended_at.is_some());
    assert_eq!(run.error_message, None);
    assert_eq!(summary.run_id, Some(1));

    Ok(())
}

#[tokio::test]
async fn inter_entity_pause_runs_between_entities_only() -> anyhow::Result<()> {
    let ts = [T0];
    let source = FakeMarketData::new()
        .with_markets(vec![
            market_row("a", 1.0),
            market_row("b", 2.0),
            market_row("c", 3.0),
        ])
        .with_history("a", full_history(&ts, 1.0))
        .with_history("b", full_history(&ts, 2.0))
        .with_history("c", full_history(&ts, 3.0));
    let h = Harness::new(source);

    let params = BackfillParams::new(1, 3, "usd", 1.5)?;
    h.pipeline().run_backfill(&params, fixed_now()).await?;

    let waits = h.pause.waits();
    assert_eq!(waits.len(), 2, "n entities need n-1 pauses, got {waits:?}");
    assert!(waits.iter().all(|w| w.as_millis() == 1_500));

    let h = Harness::new(
        FakeMarketData::new()
            .with_markets(vec![market_row("a", 1.0), market_row("b", 2.0)])
            .with_history("a", full_history(&ts, 1.0))
            .with_history("b", full_history(&ts, 2.0)),
    );
    let params = BackfillParams::new(1, 2, "usd", 0.0)?;
    h.pipeline().run_backfill(&params, fixed_now()).await?;
    assert!(h.pause.waits().is_empty());

    Ok(())
}
