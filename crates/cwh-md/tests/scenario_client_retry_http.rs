//! Upstream client against a local HTTP mock (no network).
//!
//! GREEN when:
//! - 429 on every attempt exhausts after max_attempts with waits 3s, 6s, 9s;
//! - 5xx waits use the failure step (2s, 4s, 6s);
//! - a 404 is surfaced at once with no wait and exactly one request;
//! - an id that is not a plain slug is refused before any request is sent;
//! - a well-formed body is decoded with nulls preserved;
//! - a 2xx body of the wrong shape is a payload error and is not retried.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use cwh_md::{
    CoinGeckoSource, FailureCause, MarketDataSource, Pause, RetryPolicy, UpstreamClient,
    UpstreamError,
};

#[derive(Default)]
struct RecordedWaits(Mutex<Vec<Duration>>);

#[async_trait::async_trait]
impl Pause for RecordedWaits {
    async fn pause(&self, d: Duration) {
        self.0.lock().unwrap().push(d);
    }
}

impl RecordedWaits {
    fn secs(&self) -> Vec<u64> {
        self.0.lock().unwrap().iter().map(|d| d.as_secs()).collect()
    }
}

fn source_for(server: &MockServer, waits: Arc<RecordedWaits>) -> CoinGeckoSource {
    let client = UpstreamClient::new(
        server.base_url(),
        Duration::from_secs(5),
        RetryPolicy::default(),
        waits,
    )
    .unwrap();
    CoinGeckoSource::new(client)
}

#[tokio::test]
async fn rate_limit_on_every_attempt_exhausts_with_growing_waits() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET).path("/coins/markets");
            then.status(429).body("slow down");
        })
        .await;

    let waits = Arc::new(RecordedWaits::default());
    let src = source_for(&server, waits.clone());

    let err = src.top_markets("usd", 5).await.unwrap_err();
    assert_eq!(
        err,
        UpstreamError::Exhausted {
            path: "/coins/markets".to_string(),
            attempts: 4,
            cause: FailureCause::RateLimited,
        }
    );
    assert_eq!(waits.secs(), vec![3, 6, 9]);
    m.assert_hits_async(4).await;
}

#[tokio::test]
async fn server_errors_use_failure_step() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET).path("/coins/bitcoin/market_chart/range");
            then.status(503);
        })
        .await;

    let waits = Arc::new(RecordedWaits::default());
    let src = source_for(&server, waits.clone());

    let err = src.history_range("bitcoin", "usd", 0, 86_400).await.unwrap_err();
    assert!(matches!(
        err,
        UpstreamError::Exhausted {
            cause: FailureCause::Status(503),
            ..
        }
    ));
    assert_eq!(waits.secs(), vec![2, 4, 6]);
    m.assert_hits_async(4).await;
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET).path("/coins/no-such-coin/market_chart/range");
            then.status(404).json_body(json!({"error": "coin not found"}));
        })
        .await;

    let waits = Arc::new(RecordedWaits::default());
    let src = source_for(&server, waits.clone());

    let err = src
        .history_range("no-such-coin", "usd", 0, 86_400)
        .await
        .unwrap_err();
    match err {
        UpstreamError::Rejected { status, body, .. } => {
            assert_eq!(status, 404);
            assert!(body.contains("coin not found"));
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
    assert!(waits.secs().is_empty());
    m.assert_hits_async(1).await;
}

#[tokio::test]
async fn unsafe_entity_id_never_reaches_the_server() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200).json_body(json!({"prices": []}));
        })
        .await;

    let waits = Arc::new(RecordedWaits::default());
    let src = source_for(&server, waits.clone());

    for id in ["bit#coin", "50%off", "two words"] {
        let err = src.history_range(id, "usd", 0, 86_400).await.unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidRequest(_)), "{id}: {err:?}");
    }
    assert!(waits.secs().is_empty());
    m.assert_hits_async(0).await;
}

#[tokio::test]
async fn history_range_sends_window_and_decodes_series() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/coins/ethereum/market_chart/range")
                .query_param("vs_currency", "eur")
                .query_param("from", "1000")
                .query_param("to", "2000");
            then.status(200).json_body(json!({
                "prices": [[1000000, 3000.5], [1060000, null]],
                "market_caps": [[1000000, 360000000000.0]],
                "total_volumes": []
            }));
        })
        .await;

    let waits = Arc::new(RecordedWaits::default());
    let src = source_for(&server, waits.clone());

    let payload = src.history_range("ethereum", "eur", 1000, 2000).await.unwrap();
    assert_eq!(payload.prices.len(), 2);
    assert_eq!(payload.prices[1].value, None);
    assert_eq!(payload.market_caps[0].ts_ms, 1_000_000);
    assert!(payload.total_volumes.is_empty());
    assert!(waits.secs().is_empty());
    m.assert_hits_async(1).await;
}

#[tokio::test]
async fn top_markets_sends_listing_query() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/coins/markets")
                .query_param("vs_currency", "usd")
                .query_param("order", "market_cap_desc")
                .query_param("per_page", "2")
                .query_param("page", "1")
                .query_param("sparkline", "false");
            then.status(200).json_body(json!([
                {"id": "bitcoin", "symbol": "btc", "name": "Bitcoin", "max_supply": 21000000.0,
                 "current_price": 64000.0, "market_cap": 1.2e12, "total_volume": 3.1e10},
                {"id": "ethereum", "symbol": "eth", "name": "Ethereum", "max_supply": null,
                 "current_price": 3000.0, "market_cap": null, "total_volume": 1.0e10}
            ]));
        })
        .await;

    let src = source_for(&server, Arc::new(RecordedWaits::default()));
    let rows = src.top_markets("usd", 2).await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id.as_deref(), Some("bitcoin"));
    assert_eq!(rows[1].max_supply, None);
    assert_eq!(rows[1].market_cap, None);
    m.assert_hits_async(1).await;
}

#[tokio::test]
async fn wrong_shape_is_a_payload_error_without_retry() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET).path("/coins/markets");
            then.status(200).json_body(json!({"status": {"error_code": 0}}));
        })
        .await;

    let waits = Arc::new(RecordedWaits::default());
    let src = source_for(&server, waits.clone());

    let err = src.top_markets("usd", 3).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Payload { .. }));
    assert!(waits.secs().is_empty());
    m.assert_hits_async(1).await;
}

#[tokio::test]
async fn undecodable_body_is_retried() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET).path("/coins/markets");
            then.status(200).body("<html>maintenance</html>");
        })
        .await;

    let waits = Arc::new(RecordedWaits::default());
    let src = source_for(&server, waits.clone());

    let err = src.top_markets("usd", 3).await.unwrap_err();
    assert!(matches!(
        err,
        UpstreamError::Exhausted {
            cause: FailureCause::Decode(_),
            attempts: 4,
            ..
        }
    ));
    assert_eq!(waits.secs(), vec![2, 4, 6]);
    m.assert_hits_async(4).await;
}
