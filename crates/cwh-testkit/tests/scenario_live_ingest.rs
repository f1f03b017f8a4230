//! Scenario: live (current state) ingestion.
//!
//! # Invariants under test
//!
//! 1. The top-N listing becomes exactly one staging record stamped with
//!    `now`, holding the flat snapshot list in listing order.
//! 2. The transformation runs once and the run ends SUCCESS.
//! 3. An upstream failure or an empty listing is "No data fetched": the
//!    run ends FAILED and nothing is staged or transformed.

use cwh_md::{FailureCause, MarketRow, UpstreamError};
use cwh_runtime::{LiveParams, PipelineError, RunStatus};
use cwh_testkit::{fixed_now, market_row, FakeMarketData, Harness};

#[tokio::test]
async fn live_listing_is_one_record() -> anyhow::Result<()> {
    let h = Harness::new(FakeMarketData::new().with_markets(vec![
        market_row("bitcoin", 60_000.0),
        market_row("ethereum", 3_000.0),
        market_row("solana", 150.0),
    ]));

    let params = LiveParams::new(2, "usd")?;
    let summary = h.pipeline().run_live(&params, fixed_now()).await?;

    assert_eq!(summary.snapshots, 2);
    assert_eq!(summary.records_staged, 1);

    let records = h.staging.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ingested_at, fixed_now().naive_utc());
    assert_eq!(records[0].payload[0]["id"], "bitcoin");
    assert_eq!(records[0].payload[1]["current_price"], 3_000.0);
    assert!(records[0].payload[1]["total_volume"].is_null());

    assert_eq!(h.transform.calls(), 1);
    assert_eq!(h.runs.only_run().status, RunStatus::Success);
    assert!(h.source.history_calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn live_upstream_failure_is_no_data() -> anyhow::Result<()> {
    let h = Harness::new(FakeMarketData::new().with_markets_error(UpstreamError::Exhausted {
        path: "/coins/markets".to_string(),
        attempts: 4,
        cause: FailureCause::Status(503),
    }));

    let params = LiveParams::new(100, "usd")?;
    let err = h.pipeline().run_live(&params, fixed_now()).await.unwrap_err();

    assert!(matches!(err, PipelineError::NoData(_)));
    assert!(err.to_string().starts_with("No data fetched"));
    assert_eq!(h.staging.append_calls(), 0);
    assert_eq!(h.transform.calls(), 0);

    let run = h.runs.only_run();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.unwrap_or_default().contains("HTTP 503"));
    Ok(())
}

#[tokio::test]
async fn live_rows_without_ids_are_no_data() -> anyhow::Result<()> {
    let h = Harness::new(FakeMarketData::new().with_markets(vec![MarketRow::default()]));

    let params = LiveParams::new(10, "usd")?;
    let err = h.pipeline().run_live(&params, fixed_now()).await.unwrap_err();

    assert!(matches!(err, PipelineError::NoData(_)));
    assert_eq!(h.runs.only_run().status, RunStatus::Failed);
    Ok(())
}
