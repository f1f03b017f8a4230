//! Upstream data source client.
//!
//! [`UpstreamClient::get_json`] is the single place where HTTP happens; it
//! classifies each response and drives the [`RetryPolicy`]. The
//! [`MarketDataSource`] trait is the seam consumed by universe resolution,
//! alignment and live ingestion. [`CoinGeckoSource`] is the HTTP-backed
//! implementation.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use cwh_config::UpstreamConfig;

use crate::error::{FailureCause, UpstreamError};
use crate::pause::Pause;
use crate::retry::{AttemptFailure, RetryPolicy};
use crate::{HistoryPayload, MarketRow};

const BODY_PREVIEW_CHARS: usize = 200;

pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
    pause: Arc<dyn Pause>,
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("base_url", &self.base_url)
            .field("policy", &self.policy)
            .finish()
    }
}

impl UpstreamClient {
    pub fn from_config(cfg: &UpstreamConfig, pause: Arc<dyn Pause>) -> Result<Self, UpstreamError> {
        Self::new(
            cfg.base_url.clone(),
            Duration::from_secs(cfg.timeout_secs),
            RetryPolicy::from_config(&cfg.retry),
            pause,
        )
    }

    pub fn new(
        base_url: String,
        timeout: Duration,
        policy: RetryPolicy,
        pause: Arc<dyn Pause>,
    ) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::InvalidRequest(format!("http client build failed: {e}")))?;
        Ok(Self {
            http,
            base_url,
            policy,
            pause,
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// GET `path` with `query`, retrying per policy. Returns the decoded JSON body.
    pub async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, UpstreamError> {
        let url = self.url_for(path);

        self.policy
            .run(self.pause.as_ref(), path, |attempt| {
                let req = self.http.get(&url).query(query);
                async move {
                    debug!(path, attempt, "upstream request");
                    let resp = req
                        .send()
                        .await
                        .map_err(|e| AttemptFailure::Retryable(FailureCause::Transport(e.to_string())))?;

                    let status = resp.status();
                    if status.as_u16() == 429 {
                        return Err(AttemptFailure::Retryable(FailureCause::RateLimited));
                    }
                    if status.is_client_error() {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(AttemptFailure::Permanent(UpstreamError::Rejected {
                            path: path.to_string(),
                            status: status.as_u16(),
                            body: preview(&body),
                        }));
                    }
                    if !status.is_success() {
                        return Err(AttemptFailure::Retryable(FailureCause::Status(status.as_u16())));
                    }

                    resp.json::<Value>()
                        .await
                        .map_err(|e| AttemptFailure::Retryable(FailureCause::Decode(e.to_string())))
                }
            })
            .await
    }
}

fn preview(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_PREVIEW_CHARS {
        return trimmed.to_string();
    }
    let mut s: String = trimmed.chars().take(BODY_PREVIEW_CHARS).collect();
    s.push('…');
    s
}

/// Read-only market data seam.
#[async_trait::async_trait]
pub trait MarketDataSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Current top-`top_n` listing by market cap, in provider order.
    async fn top_markets(&self, quote: &str, top_n: u32) -> Result<Vec<MarketRow>, UpstreamError>;

    /// Price / market cap / volume series for `entity_id` over `[from_secs, to_secs]`.
    async fn history_range(
        &self,
        entity_id: &str,
        quote: &str,
        from_secs: i64,
        to_secs: i64,
    ) -> Result<HistoryPayload, UpstreamError>;
}

/// CoinGecko public API (no authentication).
#[derive(Debug)]
pub struct CoinGeckoSource {
    client: UpstreamClient,
}

impl CoinGeckoSource {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl MarketDataSource for CoinGeckoSource {
    fn source_name(&self) -> &'static str {
        "coingecko"
    }

    async fn top_markets(&self, quote: &str, top_n: u32) -> Result<Vec<MarketRow>, UpstreamError> {
        let path = "/coins/markets";
        let body = self
            .client
            .get_json(
                path,
                &[
                    ("vs_currency", quote.to_string()),
                    ("order", "market_cap_desc".to_string()),
                    ("per_page", top_n.to_string()),
                    ("page", "1".to_string()),
                    ("sparkline", "false".to_string()),
                ],
            )
            .await?;

        if !body.is_array() {
            return Err(UpstreamError::Payload {
                path: path.to_string(),
                message: "expected an array of market rows".to_string(),
            });
        }
        serde_json::from_value::<Vec<MarketRow>>(body).map_err(|e| UpstreamError::Payload {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    async fn history_range(
        &self,
        entity_id: &str,
        quote: &str,
        from_secs: i64,
        to_secs: i64,
    ) -> Result<HistoryPayload, UpstreamError> {
        let id = entity_id.trim();
        if !is_entity_id(id) {
            return Err(UpstreamError::InvalidRequest(format!(
                "entity id '{entity_id}' is not a path segment"
            )));
        }

        let path = format!("/coins/{id}/market_chart/range");
        let body = self
            .client
            .get_json(
                &path,
                &[
                    ("vs_currency", quote.to_string()),
                    ("from", from_secs.to_string()),
                    ("to", to_secs.to_string()),
                ],
            )
            .await?;

        HistoryPayload::from_json(&body).map_err(|message| UpstreamError::Payload { path, message })
    }
}

/// Provider ids are lowercase slugs; anything else would need URL escaping.
fn is_entity_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}
