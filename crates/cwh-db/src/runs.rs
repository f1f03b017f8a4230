//! Pipeline run log (`pipeline_run_logs`).
//!
//! A run is inserted as RUNNING and closed exactly once as SUCCESS or
//! FAILED. The close only touches rows still RUNNING, so a second close is
//! a no-op rather than an overwrite.

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::{PgPool, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILED")]
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Success => "SUCCESS",
            RunStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim() {
            "RUNNING" => Ok(RunStatus::Running),
            "SUCCESS" => Ok(RunStatus::Success),
            "FAILED" => Ok(RunStatus::Failed),
            other => Err(anyhow!("invalid run status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineRunRow {
    pub run_id: i64,
    pub status: RunStatus,
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
    pub error_message: Option<String>,
}

/// Insert a RUNNING row and return its id.
pub async fn insert_running_run(pool: &PgPool, started_at: NaiveDateTime) -> Result<i64> {
    let row = sqlx::query(
        r#"
        insert into pipeline_run_logs (status, startedat)
        values ('RUNNING', $1)
        returning runid::bigint as runid
        "#,
    )
    .bind(started_at)
    .fetch_one(pool)
    .await
    .context("insert_running_run failed")?;

    row.try_get::<i64, _>("runid")
        .context("insert_running_run: runid decode failed")
}

/// Close a RUNNING run. Returns false when no RUNNING row matched.
pub async fn end_run(
    pool: &PgPool,
    run_id: i64,
    status: RunStatus,
    ended_at: NaiveDateTime,
    error_message: Option<&str>,
) -> Result<bool> {
    if status == RunStatus::Running {
        bail!("end_run requires a terminal status, got RUNNING");
    }

    let res = sqlx::query(
        r#"
        update pipeline_run_logs
           set status = $2,
               endedat = $3,
               errormessage = $4
         where runid = $1
           and status = 'RUNNING'
        "#,
    )
    .bind(run_id)
    .bind(status.as_str())
    .bind(ended_at)
    .bind(error_message)
    .execute(pool)
    .await
    .context("end_run failed")?;

    Ok(res.rows_affected() == 1)
}

const RUN_COLUMNS: &str = r#"
    runid::bigint as runid,
    status::text as status,
    startedat::timestamp as startedat,
    endedat::timestamp as endedat,
    errormessage::text as errormessage
"#;

pub async fn fetch_run(pool: &PgPool, run_id: i64) -> Result<Option<PipelineRunRow>> {
    let sql = format!("select {RUN_COLUMNS} from pipeline_run_logs where runid = $1");
    let row = sqlx::query(&sql)
        .bind(run_id)
        .fetch_optional(pool)
        .await
        .context("fetch_run failed")?;

    row.map(|r| decode_run(&r)).transpose()
}

/// Runs still RUNNING, oldest first. With `started_before`, only runs that
/// started earlier than that instant (candidates for an interrupted process).
pub async fn list_open_runs(
    pool: &PgPool,
    started_before: Option<NaiveDateTime>,
) -> Result<Vec<PipelineRunRow>> {
    let sql = format!(
        "select {RUN_COLUMNS} from pipeline_run_logs \
         where status = 'RUNNING' and ($1::timestamp is null or startedat < $1) \
         order by startedat asc, runid asc"
    );
    let rows = sqlx::query(&sql)
        .bind(started_before)
        .fetch_all(pool)
        .await
        .context("list_open_runs failed")?;

    rows.iter().map(decode_run).collect()
}

fn decode_run(row: &sqlx::postgres::PgRow) -> Result<PipelineRunRow> {
    let status: String = row.try_get("status")?;
    Ok(PipelineRunRow {
        run_id: row.try_get("runid")?,
        status: RunStatus::parse(&status)?,
        started_at: row.try_get("startedat")?,
        ended_at: row.try_get("endedat")?,
        error_message: row.try_get("errormessage")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for s in [RunStatus::Running, RunStatus::Success, RunStatus::Failed] {
            assert_eq!(RunStatus::parse(s.as_str()).unwrap(), s);
        }
        assert!(RunStatus::parse("DONE").is_err());
    }
}
