//! Postgres-backed implementations of the pipeline ports.

use anyhow::Result;
use chrono::NaiveDateTime;
use sqlx::PgPool;

use cwh_db::NewStagingRecord;
use cwh_md::{Entity, EntityDirectory};

use crate::staging::{StagingRecord, StagingStore};
use crate::tracker::{RunLogStore, RunStatus};
use crate::transform::TransformProcedure;

#[derive(Debug, Clone)]
pub struct PgStagingStore {
    pool: PgPool,
}

impl PgStagingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl StagingStore for PgStagingStore {
    async fn append(&self, records: &[StagingRecord]) -> Result<u64> {
        let rows: Vec<NewStagingRecord> = records
            .iter()
            .map(|r| NewStagingRecord {
                ingested_at: r.ingested_at,
                payload: r.payload.clone(),
            })
            .collect();
        cwh_db::insert_staging_records(&self.pool, &rows).await
    }
}

#[derive(Debug, Clone)]
pub struct PgRunLog {
    pool: PgPool,
}

impl PgRunLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RunLogStore for PgRunLog {
    async fn insert_running(&self, started_at: NaiveDateTime) -> Result<i64> {
        cwh_db::insert_running_run(&self.pool, started_at).await
    }

    async fn close(
        &self,
        run_id: i64,
        status: RunStatus,
        ended_at: NaiveDateTime,
        error_message: Option<&str>,
    ) -> Result<bool> {
        cwh_db::end_run(&self.pool, run_id, status, ended_at, error_message).await
    }
}

#[derive(Debug, Clone)]
pub struct PgTransformProcedure {
    pool: PgPool,
    name: String,
}

impl PgTransformProcedure {
    /// Rejects names that are not plain identifiers.
    pub fn new(pool: PgPool, name: &str) -> Result<Self> {
        cwh_db::validate_procedure_name(name)?;
        Ok(Self {
            pool,
            name: name.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl TransformProcedure for PgTransformProcedure {
    fn procedure_name(&self) -> &str {
        &self.name
    }

    async fn call(&self) -> Result<()> {
        cwh_db::call_procedure(&self.pool, &self.name).await
    }
}

#[derive(Debug, Clone)]
pub struct PgEntityDirectory {
    pool: PgPool,
}

impl PgEntityDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl EntityDirectory for PgEntityDirectory {
    async fn list_known_entities(&self, limit: u32) -> Result<Vec<Entity>> {
        let rows = cwh_db::list_known_currencies(&self.pool, i64::from(limit)).await?;
        Ok(rows
            .into_iter()
            .map(|r| Entity {
                id: r.coingecko_id,
                symbol: r.symbol,
                name: r.name,
                max_supply: r.max_supply,
            })
            .collect())
    }
}
