//! cwh-md
//!
//! Market-data side of the ingestion engine: the upstream client (with its
//! retry policy), the coin universe resolver, the time-series alignment
//! engine, the partial-failure coordinator and the coverage report.
//!
//! This crate does **not** write to the warehouse. It produces an ordered
//! bucket map (`ts_ms -> snapshots`) that callers hand to the staging writer.

pub mod align;
pub mod client;
pub mod coordinator;
pub mod coverage;
pub mod error;
pub mod pause;
pub mod retry;
pub mod universe;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use align::{compose_snapshots, AlignRequest, AlignmentEngine, EntityAlignment};
pub use client::{CoinGeckoSource, MarketDataSource, UpstreamClient};
pub use coordinator::{AlignmentOutcome, SkipReason, SkipReport, SkippedEntity};
pub use coverage::{CoverageReport, EntityCoverage};
pub use error::{AlignError, FailureCause, ResolutionError, UpstreamError};
pub use pause::{Pause, TokioPause};
pub use retry::{AttemptFailure, RetryPolicy};
pub use universe::{EntityDirectory, ResolvedUniverse, UniverseResolver, UniverseSource};

/// A tradable asset as known to the provider.
///
/// Identity is `id` (the provider's external identifier, e.g. `"bitcoin"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub max_supply: Option<f64>,
}

impl Entity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            symbol: None,
            name: None,
            max_supply: None,
        }
    }
}

/// One `[timestamp_ms, value]` point. A `None` value still marks the
/// timestamp as present in its series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub ts_ms: i64,
    pub value: Option<f64>,
}

/// The three parallel series returned by the history-range endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryPayload {
    pub prices: Vec<SeriesPoint>,
    pub market_caps: Vec<SeriesPoint>,
    pub total_volumes: Vec<SeriesPoint>,
}

impl HistoryPayload {
    /// Decode a history-range body.
    ///
    /// The body must be an object. A missing or null series is empty; a
    /// series that is present but not an array is a shape error. Malformed
    /// points (not an array, fewer than two elements, non-numeric timestamp)
    /// are dropped.
    pub fn from_json(body: &Value) -> Result<Self, String> {
        let obj = body
            .as_object()
            .ok_or_else(|| format!("expected object, got {}", json_kind(body)))?;
        Ok(Self {
            prices: parse_series(obj.get("prices"), "prices")?,
            market_caps: parse_series(obj.get("market_caps"), "market_caps")?,
            total_volumes: parse_series(obj.get("total_volumes"), "total_volumes")?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty() && self.market_caps.is_empty() && self.total_volumes.is_empty()
    }
}

fn parse_series(v: Option<&Value>, key: &str) -> Result<Vec<SeriesPoint>, String> {
    let arr = match v {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(arr)) => arr,
        Some(other) => return Err(format!("'{key}' must be an array, got {}", json_kind(other))),
    };

    Ok(arr.iter().filter_map(parse_point).collect())
}

fn parse_point(v: &Value) -> Option<SeriesPoint> {
    let pair = v.as_array()?;
    if pair.len() < 2 {
        return None;
    }
    let ts_ms = match &pair[0] {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))?,
        _ => return None,
    };
    Some(SeriesPoint {
        ts_ms,
        value: pair[1].as_f64(),
    })
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One entity's state at one instant.
///
/// Serialized with every key present; absent measurements are `null`, never
/// omitted and never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeSnapshot {
    pub id: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub max_supply: Option<f64>,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub total_volume: Option<f64>,
}

impl CompositeSnapshot {
    pub fn for_entity(entity: &Entity) -> Self {
        Self {
            id: entity.id.clone(),
            symbol: entity.symbol.clone(),
            name: entity.name.clone(),
            max_supply: entity.max_supply,
            current_price: None,
            market_cap: None,
            total_volume: None,
        }
    }
}

/// Snapshots grouped by exact timestamp (ms), iterated in ascending order.
pub type BucketMap = BTreeMap<i64, Vec<CompositeSnapshot>>;

/// One row of the top-markets listing. Every field is optional upstream.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketRow {
    pub id: Option<String>,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub max_supply: Option<f64>,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub total_volume: Option<f64>,
}

impl MarketRow {
    /// `None` when the row carries no usable id.
    pub fn to_entity(&self) -> Option<Entity> {
        let id = self.id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some(Entity {
            id: id.to_string(),
            symbol: self.symbol.clone(),
            name: self.name.clone(),
            max_supply: self.max_supply,
        })
    }

    /// Current-state snapshot for live ingestion.
    pub fn to_snapshot(&self) -> Option<CompositeSnapshot> {
        let entity = self.to_entity()?;
        Some(CompositeSnapshot {
            current_price: self.current_price,
            market_cap: self.market_cap,
            total_volume: self.total_volume,
            ..CompositeSnapshot::for_entity(&entity)
        })
    }
}
