//! Transformation procedure call.
//!
//! The procedure name comes from config and is spliced into SQL, so it is
//! restricted to a plain identifier.

use anyhow::{bail, Context, Result};
use sqlx::PgPool;

pub fn validate_procedure_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let head_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    if !head_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("invalid procedure name '{}': expected [A-Za-z_][A-Za-z0-9_]*", name);
    }
    Ok(())
}

/// `CALL <name>();` with no arguments. Not retried.
pub async fn call_procedure(pool: &PgPool, name: &str) -> Result<()> {
    validate_procedure_name(name)?;

    let sql = format!("call {name}()");
    sqlx::query(&sql)
        .execute(pool)
        .await
        .with_context(|| format!("call {name}() failed"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_identifiers_only() {
        assert!(validate_procedure_name("sp_ParseRawData").is_ok());
        assert!(validate_procedure_name("_x1").is_ok());
        assert!(validate_procedure_name("").is_err());
        assert!(validate_procedure_name("1abc").is_err());
        assert!(validate_procedure_name("sp(); drop table x").is_err());
        assert!(validate_procedure_name("public.sp").is_err());
    }
}
