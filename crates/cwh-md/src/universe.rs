//! Coin universe resolution.
//!
//! Primary path: the provider's top-markets listing. Fallback path: the
//! warehouse's own entity directory, used when the primary fails or comes
//! back empty. A run never proceeds with an empty universe.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{info, warn};

use crate::client::MarketDataSource;
use crate::error::ResolutionError;
use crate::Entity;

/// Locally known entities with an external id, ordered by internal id.
#[async_trait::async_trait]
pub trait EntityDirectory: Send + Sync {
    async fn list_known_entities(&self, limit: u32) -> anyhow::Result<Vec<Entity>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UniverseSource {
    Upstream,
    Directory,
}

impl UniverseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            UniverseSource::Upstream => "upstream",
            UniverseSource::Directory => "directory",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedUniverse {
    pub entities: Vec<Entity>,
    pub source: UniverseSource,
}

pub struct UniverseResolver<'a> {
    source: &'a dyn MarketDataSource,
    directory: &'a dyn EntityDirectory,
}

impl<'a> UniverseResolver<'a> {
    pub fn new(source: &'a dyn MarketDataSource, directory: &'a dyn EntityDirectory) -> Self {
        Self { source, directory }
    }

    /// Resolve at most `top_n` entities (order preserved, ids unique).
    pub async fn resolve(&self, quote: &str, top_n: u32) -> Result<ResolvedUniverse, ResolutionError> {
        info!(top_n, quote, source = self.source.source_name(), "resolving coin universe");

        let upstream_note = match self.source.top_markets(quote, top_n).await {
            Ok(rows) => {
                let entities = dedupe_truncate(rows.iter().filter_map(|r| r.to_entity()), top_n);
                if !entities.is_empty() {
                    info!(count = entities.len(), "universe resolved from upstream");
                    return Ok(ResolvedUniverse {
                        entities,
                        source: UniverseSource::Upstream,
                    });
                }
                warn!("upstream listing returned no usable entities; falling back to directory");
                "returned 0 entities".to_string()
            }
            Err(e) => {
                warn!(error = %e, "upstream listing failed; falling back to directory");
                e.to_string()
            }
        };

        let listed = self
            .directory
            .list_known_entities(top_n)
            .await
            .map_err(|e| ResolutionError::Directory {
                upstream: upstream_note.clone(),
                message: format!("{e:#}"),
            })?;

        let entities = dedupe_truncate(listed.into_iter(), top_n);
        if entities.is_empty() {
            return Err(ResolutionError::Empty {
                upstream: upstream_note,
            });
        }

        info!(count = entities.len(), "universe resolved from directory fallback");
        Ok(ResolvedUniverse {
            entities,
            source: UniverseSource::Directory,
        })
    }
}

/// First occurrence of an id wins; blank ids are dropped.
fn dedupe_truncate(entities: impl Iterator<Item = Entity>, top_n: u32) -> Vec<Entity> {
    let mut seen: HashSet<String> = HashSet::new();
    entities
        .filter(|e| !e.id.trim().is_empty())
        .filter(|e| seen.insert(e.id.clone()))
        .take(top_n as usize)
        .collect()
}
