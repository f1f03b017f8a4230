//! Database URL resolution.
//!
//! Config YAML stores only the env var NAME (`db.url_env`). The CLI resolves
//! it once at startup and passes the resulting [`DatabaseUrl`] into the pool
//! constructor; nothing else reads the variable.
//!
//! `Debug` on [`DatabaseUrl`] redacts the value, and error messages reference
//! the variable name only.

use anyhow::{bail, Result};

use crate::DbConfig;

pub const DEFAULT_DB_URL_ENV: &str = "CWH_DATABASE_URL";

#[derive(Clone)]
pub struct DatabaseUrl {
    env_name: String,
    value: String,
}

impl DatabaseUrl {
    /// Name of the variable the URL came from.
    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    /// The raw connection string. Hand it to the pool and nowhere else.
    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Debug for DatabaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseUrl")
            .field("env_name", &self.env_name)
            .field("value", &"<REDACTED>")
            .finish()
    }
}

pub fn resolve_database_url(db: &DbConfig) -> Result<DatabaseUrl> {
    resolve_database_url_with(db, |name| std::env::var(name).ok())
}

/// Same as [`resolve_database_url`] with an injected lookup, so tests do not
/// have to mutate process environment.
pub fn resolve_database_url_with<F>(db: &DbConfig, lookup: F) -> Result<DatabaseUrl>
where
    F: Fn(&str) -> Option<String>,
{
    let name = db.url_env.trim();
    match lookup(name) {
        Some(v) if !v.trim().is_empty() => Ok(DatabaseUrl {
            env_name: name.to_string(),
            value: v.trim().to_string(),
        }),
        Some(_) => bail!("DB_URL_EMPTY: env var {name} is set but empty"),
        None => bail!("DB_URL_MISSING: env var {name} is not set"),
    }
}
