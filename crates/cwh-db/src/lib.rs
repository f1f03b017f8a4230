//! cwh-db
//!
//! Postgres access for the ingestion engine: append-only staging inserts,
//! the pipeline run log, the local entity directory and the transformation
//! procedure call. Table DDL is owned by the warehouse; `migrate` only
//! bootstraps the three tables touched here when they are missing.

pub mod directory;
pub mod runs;
pub mod staging;
pub mod transform;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;

pub use sqlx::PgPool;

pub use directory::{list_known_currencies, DirectoryRow};
pub use runs::{end_run, fetch_run, insert_running_run, list_open_runs, PipelineRunRow, RunStatus};
pub use staging::{count_staging_between, insert_staging_records, NewStagingRecord};
pub use transform::{call_procedure, validate_procedure_name};

/// Default variable name for the warehouse URL (configurable via `db.url_env`).
pub const ENV_DB_URL: &str = "CWH_DATABASE_URL";

pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Connect using CWH_DATABASE_URL. Used by DB-backed tests.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url, 2).await
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_staging_table: bool,
    pub has_run_log_table: bool,
    pub has_directory_table: bool,
}

impl DbStatus {
    pub fn is_ready(&self) -> bool {
        self.ok && self.has_staging_table && self.has_run_log_table && self.has_directory_table
    }
}

/// Connectivity + presence of the tables this engine touches.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_staging_table: table_exists(pool, "staging_api_response").await?,
        has_run_log_table: table_exists(pool, "pipeline_run_logs").await?,
        has_directory_table: table_exists(pool, "dim_currency").await?,
    })
}

async fn table_exists(pool: &PgPool, table: &str) -> Result<bool> {
    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = 'public' and table_name = $1
        )
        "#,
    )
    .bind(table)
    .fetch_one(pool)
    .await
    .with_context(|| format!("status table-exists query failed for {table}"))?;

    Ok(exists)
}
