//! Partial-failure coordination for a batch of entities.
//!
//! Each entity's outcome is a `Result<EntityAlignment, SkipReason>`. The
//! coordinator folds outcomes into the global bucket map and a skip report.
//! A skip is data, not an error: the batch always completes.

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::align::EntityAlignment;
use crate::coverage::{build_coverage_report, CoverageReport, EntityCoverage};
use crate::error::UpstreamError;
use crate::{BucketMap, Entity};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("entity listed more than once in the universe")]
    DuplicateEntity,
}

pub type EntityOutcome = Result<EntityAlignment, SkipReason>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntity {
    pub entity_id: String,
    pub reason: String,
}

/// Entities that contributed nothing, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkipReport {
    pub entities: Vec<SkippedEntity>,
}

impl SkipReport {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.entities.iter().map(|s| s.entity_id.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentOutcome {
    pub buckets: BucketMap,
    pub skipped: SkipReport,
    /// Entities attempted, skipped ones included.
    pub entities_processed: usize,
    pub coverage: CoverageReport,
}

impl AlignmentOutcome {
    pub fn snapshot_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}

#[derive(Debug)]
pub(crate) struct Coordinator {
    requested: usize,
    processed: usize,
    seen: BTreeSet<String>,
    buckets: BucketMap,
    skipped: Vec<SkippedEntity>,
    coverage: Vec<EntityCoverage>,
}

impl Coordinator {
    pub(crate) fn new(requested: usize) -> Self {
        Self {
            requested,
            processed: 0,
            seen: BTreeSet::new(),
            buckets: BucketMap::new(),
            skipped: Vec::new(),
            coverage: Vec::new(),
        }
    }

    pub(crate) fn has_seen(&self, entity_id: &str) -> bool {
        self.seen.contains(entity_id)
    }

    pub(crate) fn record(&mut self, entity: &Entity, outcome: EntityOutcome) {
        self.processed += 1;
        self.seen.insert(entity.id.clone());

        match outcome {
            Ok(alignment) => {
                self.coverage.push(EntityCoverage::from_alignment(&alignment));
                for (ts, snap) in alignment.snapshots {
                    self.buckets.entry(ts).or_default().push(snap);
                }
            }
            Err(reason) => self.skipped.push(SkippedEntity {
                entity_id: entity.id.clone(),
                reason: reason.to_string(),
            }),
        }
    }

    pub(crate) fn finish(self) -> AlignmentOutcome {
        let skipped = SkipReport {
            entities: self.skipped,
        };
        if skipped.is_empty() {
            info!(processed = self.processed, "all entities aligned");
        } else {
            warn!(
                skipped = skipped.len(),
                ids = %skipped.ids().join(", "),
                "entities skipped due to upstream errors"
            );
        }

        let coverage = build_coverage_report(self.requested, self.coverage, skipped.len(), &self.buckets);
        AlignmentOutcome {
            buckets: self.buckets,
            skipped,
            entities_processed: self.processed,
            coverage,
        }
    }
}
