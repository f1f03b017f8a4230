//! Local entity directory (`dim_currency`).

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};

#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryRow {
    pub coingecko_id: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub max_supply: Option<f64>,
}

/// Known currencies with an external id, ordered by internal id ascending.
pub async fn list_known_currencies(pool: &PgPool, limit: i64) -> Result<Vec<DirectoryRow>> {
    let rows = sqlx::query(
        r#"
        select coingeckoid::text as coingeckoid,
               symbol::text as symbol,
               name::text as name,
               maxsupply::float8 as maxsupply
        from dim_currency
        where coingeckoid is not null
        order by currencyid asc
        limit $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("list_known_currencies failed")?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(DirectoryRow {
            coingecko_id: row.try_get("coingeckoid")?,
            symbol: row.try_get("symbol")?,
            name: row.try_get("name")?,
            max_supply: row.try_get("maxsupply")?,
        });
    }
    Ok(out)
}
