//! In-memory implementations of every pipeline port.
//!
//! Each fake records what it was asked to do so scenarios can assert on
//! calls, not just on return values.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;

use cwh_md::{
    Entity, EntityDirectory, HistoryPayload, MarketDataSource, MarketRow, Pause, UpstreamError,
};
use cwh_runtime::{RunLogStore, RunStatus, StagingRecord, StagingStore, TransformProcedure};

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

/// Scripted upstream. An entity with no scripted history answers 404.
pub struct FakeMarketData {
    markets: Result<Vec<MarketRow>, UpstreamError>,
    history: HashMap<String, Result<HistoryPayload, UpstreamError>>,
    market_calls: AtomicUsize,
    history_calls: Mutex<Vec<HistoryCall>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryCall {
    pub entity_id: String,
    pub quote: String,
    pub from_secs: i64,
    pub to_secs: i64,
}

impl Default for FakeMarketData {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeMarketData {
    pub fn new() -> Self {
        Self {
            markets: Ok(Vec::new()),
            history: HashMap::new(),
            market_calls: AtomicUsize::new(0),
            history_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_markets(mut self, rows: Vec<MarketRow>) -> Self {
        self.markets = Ok(rows);
        self
    }

    pub fn with_markets_error(mut self, err: UpstreamError) -> Self {
        self.markets = Err(err);
        self
    }

    pub fn with_history(mut self, entity_id: &str, payload: HistoryPayload) -> Self {
        self.history.insert(entity_id.to_string(), Ok(payload));
        self
    }

    pub fn with_history_error(mut self, entity_id: &str, err: UpstreamError) -> Self {
        self.history.insert(entity_id.to_string(), Err(err));
        self
    }

    pub fn market_calls(&self) -> usize {
        self.market_calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self) -> Vec<HistoryCall> {
        self.history_calls.lock().expect("history_calls lock").clone()
    }
}

#[async_trait::async_trait]
impl MarketDataSource for FakeMarketData {
    fn source_name(&self) -> &'static str {
        "fake"
    }

    async fn top_markets(&self, _quote: &str, top_n: u32) -> Result<Vec<MarketRow>, UpstreamError> {
        self.market_calls.fetch_add(1, Ordering::SeqCst);
        self.markets
            .clone()
            .map(|rows| rows.into_iter().take(top_n as usize).collect())
    }

    async fn history_range(
        &self,
        entity_id: &str,
        quote: &str,
        from_secs: i64,
        to_secs: i64,
    ) -> Result<HistoryPayload, UpstreamError> {
        self.history_calls
            .lock()
            .expect("history_calls lock")
            .push(HistoryCall {
                entity_id: entity_id.to_string(),
                quote: quote.to_string(),
                from_secs,
                to_secs,
            });

        match self.history.get(entity_id) {
            Some(r) => r.clone(),
            None => Err(UpstreamError::Rejected {
                path: format!("/coins/{entity_id}/market_chart/range"),
                status: 404,
                body: "not scripted".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryDirectory {
    entities: Vec<Entity>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl MemoryDirectory {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self {
            entities,
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            entities: Vec::new(),
            failure: Some(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EntityDirectory for MemoryDirectory {
    async fn list_known_entities(&self, limit: u32) -> Result<Vec<Entity>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = &self.failure {
            return Err(anyhow!("{msg}"));
        }
        Ok(self.entities.iter().take(limit as usize).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// Staging
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStaging {
    records: Mutex<Vec<StagingRecord>>,
    failure: Option<String>,
    append_calls: AtomicUsize,
}

impl MemoryStaging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<StagingRecord> {
        self.records.lock().expect("records lock").clone()
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StagingStore for MemoryStaging {
    async fn append(&self, records: &[StagingRecord]) -> Result<u64> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = &self.failure {
            return Err(anyhow!("{msg}"));
        }
        let mut guard = self.records.lock().expect("records lock");
        guard.extend_from_slice(records);
        Ok(records.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// Run log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRun {
    pub status: RunStatus,
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
    pub error_message: Option<String>,
}

#[derive(Default)]
pub struct MemoryRunLog {
    runs: Mutex<BTreeMap<i64, MemoryRun>>,
    fail_insert: bool,
    fail_close: bool,
    close_calls: AtomicUsize,
}

impl MemoryRunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every insert fails (run log unavailable).
    pub fn unavailable() -> Self {
        Self {
            fail_insert: true,
            fail_close: true,
            ..Self::default()
        }
    }

    /// Inserts work, closes fail.
    pub fn failing_close() -> Self {
        Self {
            fail_close: true,
            ..Self::default()
        }
    }

    pub fn runs(&self) -> BTreeMap<i64, MemoryRun> {
        self.runs.lock().expect("runs lock").clone()
    }

    pub fn only_run(&self) -> MemoryRun {
        let runs = self.runs();
        assert_eq!(runs.len(), 1, "expected exactly one run, got {runs:?}");
        runs.into_values().next().expect("one run")
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RunLogStore for MemoryRunLog {
    async fn insert_running(&self, started_at: NaiveDateTime) -> Result<i64> {
        if self.fail_insert {
            return Err(anyhow!("run log unavailable"));
        }
        let mut runs = self.runs.lock().expect("runs lock");
        let id = runs.keys().next_back().copied().unwrap_or(0) + 1;
        runs.insert(
            id,
            MemoryRun {
                status: RunStatus::Running,
                started_at,
                ended_at: None,
                error_message: None,
            },
        );
        Ok(id)
    }

    async fn close(
        &self,
        run_id: i64,
        status: RunStatus,
        ended_at: NaiveDateTime,
        error_message: Option<&str>,
    ) -> Result<bool> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(anyhow!("run log unavailable"));
        }
        let mut runs = self.runs.lock().expect("runs lock");
        match runs.get_mut(&run_id) {
            Some(run) if run.status == RunStatus::Running => {
                run.status = status;
                run.ended_at = Some(ended_at);
                run.error_message = error_message.map(str::to_string);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Transformation
// ---------------------------------------------------------------------------

pub struct ScriptedTransformer {
    failure: Option<String>,
    calls: AtomicUsize,
}

impl Default for ScriptedTransformer {
    fn default() -> Self {
        Self::succeeding()
    }
}

impl ScriptedTransformer {
    pub fn succeeding() -> Self {
        Self {
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TransformProcedure for ScriptedTransformer {
    fn procedure_name(&self) -> &str {
        "sp_ParseRawData"
    }

    async fn call(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(msg) => Err(anyhow!("{msg}")),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Pause
// ---------------------------------------------------------------------------

/// Records requested waits; never sleeps.
#[derive(Default)]
pub struct RecordingPause {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingPause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().expect("waits lock").clone()
    }
}

#[async_trait::async_trait]
impl Pause for RecordingPause {
    async fn pause(&self, duration: Duration) {
        self.waits.lock().expect("waits lock").push(duration);
    }
}
