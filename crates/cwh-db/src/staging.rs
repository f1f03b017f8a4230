//! Append-only inserts into `staging_api_response`.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde_json::Value;
use sqlx::PgPool;

#[derive(Debug, Clone, PartialEq)]
pub struct NewStagingRecord {
    /// Naive UTC.
    pub ingested_at: NaiveDateTime,
    pub payload: Value,
}

/// Insert every record inside one transaction, in slice order.
///
/// All-or-nothing: a failure on any row rolls back the whole batch.
pub async fn insert_staging_records(pool: &PgPool, records: &[NewStagingRecord]) -> Result<u64> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await.context("begin staging tx failed")?;
    let mut inserted: u64 = 0;

    for r in records {
        let res = sqlx::query(
            r#"
            insert into staging_api_response (ingestedat, rawjson)
            values ($1, $2)
            "#,
        )
        .bind(r.ingested_at)
        .bind(&r.payload)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("insert staging record failed ingested_at={}", r.ingested_at))?;
        inserted += res.rows_affected();
    }

    tx.commit().await.context("commit staging tx failed")?;
    Ok(inserted)
}

/// Rows with `from <= ingestedat <= to`.
pub async fn count_staging_between(
    pool: &PgPool,
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> Result<i64> {
    let (n,): (i64,) = sqlx::query_as::<_, (i64,)>(
        r#"
        select count(*)::bigint
        from staging_api_response
        where ingestedat between $1 and $2
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await
    .context("count_staging_between failed")?;

    Ok(n)
}
