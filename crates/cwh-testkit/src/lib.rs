//! cwh-testkit
//!
//! Fakes for every pipeline port plus small fixture builders. Scenario tests
//! under `tests/` drive the real pipeline against these.

pub mod fakes;

use chrono::{DateTime, TimeZone, Utc};

use cwh_md::{Entity, HistoryPayload, MarketRow, SeriesPoint, UpstreamError};
use cwh_runtime::{Pipeline, Ports};

pub use fakes::{
    FakeMarketData, HistoryCall, MemoryDirectory, MemoryRun, MemoryRunLog, MemoryStaging,
    RecordingPause, ScriptedTransformer,
};

/// Fixed window anchor for deterministic runs: 2024-03-01T00:00:00Z.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

pub fn entity(id: &str) -> Entity {
    Entity {
        id: id.to_string(),
        symbol: Some(id.chars().take(3).collect()),
        name: Some(id.to_string()),
        max_supply: None,
    }
}

pub fn market_row(id: &str, price: f64) -> MarketRow {
    MarketRow {
        id: Some(id.to_string()),
        symbol: Some(id.chars().take(3).collect()),
        name: Some(id.to_string()),
        max_supply: None,
        current_price: Some(price),
        market_cap: Some(price * 1_000.0),
        total_volume: None,
    }
}

pub fn series(points: &[(i64, f64)]) -> Vec<SeriesPoint> {
    points
        .iter()
        .map(|&(ts_ms, v)| SeriesPoint {
            ts_ms,
            value: Some(v),
        })
        .collect()
}

/// Price, market cap and volume all present at every timestamp.
pub fn full_history(ts: &[i64], base: f64) -> HistoryPayload {
    let pts = |scale: f64| -> Vec<SeriesPoint> {
        ts.iter()
            .enumerate()
            .map(|(i, &ts_ms)| SeriesPoint {
                ts_ms,
                value: Some((base + i as f64) * scale),
            })
            .collect()
    };
    HistoryPayload {
        prices: pts(1.0),
        market_caps: pts(1_000.0),
        total_volumes: pts(10.0),
    }
}

/// A retry-exhausted upstream failure for `entity_id`.
pub fn exhausted(entity_id: &str) -> UpstreamError {
    UpstreamError::Exhausted {
        path: format!("/coins/{entity_id}/market_chart/range"),
        attempts: 4,
        cause: cwh_md::FailureCause::RateLimited,
    }
}

/// All fakes for one invocation.
pub struct Harness {
    pub source: FakeMarketData,
    pub directory: MemoryDirectory,
    pub staging: MemoryStaging,
    pub runs: MemoryRunLog,
    pub transform: ScriptedTransformer,
    pub pause: RecordingPause,
}

impl Harness {
    pub fn new(source: FakeMarketData) -> Self {
        Self {
            source,
            directory: MemoryDirectory::default(),
            staging: MemoryStaging::new(),
            runs: MemoryRunLog::new(),
            transform: ScriptedTransformer::succeeding(),
            pause: RecordingPause::new(),
        }
    }

    pub fn with_directory(mut self, directory: MemoryDirectory) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_staging(mut self, staging: MemoryStaging) -> Self {
        self.staging = staging;
        self
    }

    pub fn with_runs(mut self, runs: MemoryRunLog) -> Self {
        self.runs = runs;
        self
    }

    pub fn with_transform(mut self, transform: ScriptedTransformer) -> Self {
        self.transform = transform;
        self
    }

    pub fn ports(&self) -> Ports<'_> {
        Ports {
            source: &self.source,
            directory: &self.directory,
            staging: &self.staging,
            runs: &self.runs,
            transform: &self.transform,
            pause: &self.pause,
        }
    }

    pub fn pipeline(&self) -> Pipeline<'_> {
        Pipeline::new(self.ports())
    }
}
