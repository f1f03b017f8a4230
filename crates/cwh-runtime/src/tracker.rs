//! Pipeline run tracker.
//!
//! Run logging is observability, not control: failing to record a run never
//! fails the run. `start` hands out a [`RunHandle`] that `finish` consumes,
//! so a handle can only be closed once.

use chrono::{NaiveDateTime, Utc};
use tracing::{info, warn};

pub use cwh_db::RunStatus;

#[async_trait::async_trait]
pub trait RunLogStore: Send + Sync {
    async fn insert_running(&self, started_at: NaiveDateTime) -> anyhow::Result<i64>;

    /// Close a RUNNING run; `Ok(false)` when no RUNNING row matched.
    async fn close(
        &self,
        run_id: i64,
        status: RunStatus,
        ended_at: NaiveDateTime,
        error_message: Option<&str>,
    ) -> anyhow::Result<bool>;
}

/// Proof that `start` was called. Not `Clone`: `finish` takes it by value.
#[derive(Debug)]
#[must_use = "a started run must be finished"]
pub struct RunHandle {
    run_id: Option<i64>,
}

impl RunHandle {
    /// `None` when the run log was unavailable at start.
    pub fn run_id(&self) -> Option<i64> {
        self.run_id
    }
}

pub struct RunTracker<'a> {
    store: &'a dyn RunLogStore,
}

impl<'a> RunTracker<'a> {
    pub fn new(store: &'a dyn RunLogStore) -> Self {
        Self { store }
    }

    pub async fn start(&self) -> RunHandle {
        match self.store.insert_running(Utc::now().naive_utc()).await {
            Ok(run_id) => {
                info!(run_id, "pipeline run started");
                RunHandle { run_id: Some(run_id) }
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "could not record pipeline start; continuing without run id");
                RunHandle { run_id: None }
            }
        }
    }

    /// Close the run. No-op when the start was never recorded. A success
    /// never carries an error message.
    pub async fn finish(&self, handle: RunHandle, status: RunStatus, error_message: Option<&str>) {
        let Some(run_id) = handle.run_id else {
            return;
        };
        let message = match status {
            RunStatus::Success => None,
            _ => error_message,
        };

        match self
            .store
            .close(run_id, status, Utc::now().naive_utc(), message)
            .await
        {
            Ok(true) => info!(run_id, status = status.as_str(), "pipeline run finished"),
            Ok(false) => warn!(run_id, status = status.as_str(), "run was no longer RUNNING; status left unchanged"),
            Err(e) => warn!(run_id, status = status.as_str(), error = %format!("{e:#}"), "could not record pipeline end"),
        }
    }
}
