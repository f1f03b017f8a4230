//! Coverage report for an alignment run.
//!
//! Summarises what a backfill actually captured:
//! - entities requested / aligned / skipped
//! - bucket and snapshot counts, earliest / latest timestamp
//! - per entity: snapshots, missing price / market cap / volume, duplicate
//!   raw points dropped, first / last timestamp
//! - entities that aligned but produced zero snapshots
//!
//! The report is informational. It never changes the pipeline outcome.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::align::EntityAlignment;
use crate::BucketMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityCoverage {
    pub entity_id: String,
    pub snapshots: usize,
    pub missing_price: usize,
    pub missing_market_cap: usize,
    pub missing_volume: usize,
    pub duplicate_points: usize,
    pub first_ts_ms: Option<i64>,
    pub last_ts_ms: Option<i64>,
}

impl EntityCoverage {
    pub fn from_alignment(a: &EntityAlignment) -> Self {
        let snaps = a.snapshots.values();
        Self {
            entity_id: a.entity_id.clone(),
            snapshots: a.snapshots.len(),
            missing_price: snaps.clone().filter(|s| s.current_price.is_none()).count(),
            missing_market_cap: snaps.clone().filter(|s| s.market_cap.is_none()).count(),
            missing_volume: snaps.filter(|s| s.total_volume.is_none()).count(),
            duplicate_points: a.duplicate_points,
            first_ts_ms: a.snapshots.keys().next().copied(),
            last_ts_ms: a.snapshots.keys().next_back().copied(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageReport {
    pub entities_requested: usize,
    pub entities_aligned: usize,
    pub entities_skipped: usize,
    pub buckets: usize,
    pub snapshots: usize,
    pub earliest_ts_ms: Option<i64>,
    pub latest_ts_ms: Option<i64>,
    /// Keyed by entity id for deterministic ordering.
    pub per_entity: BTreeMap<String, EntityCoverage>,
    /// Aligned entities that produced no snapshots (sorted).
    pub empty_entities: Vec<String>,
}

impl CoverageReport {
    /// Nothing skipped, nothing empty, no measurement missing.
    pub fn is_complete(&self) -> bool {
        self.entities_skipped == 0
            && self.empty_entities.is_empty()
            && self.per_entity.values().all(|e| {
                e.missing_price == 0 && e.missing_market_cap == 0 && e.missing_volume == 0
            })
    }
}

impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ts = |v: Option<i64>| v.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string());

        writeln!(f, "CoverageReport {{")?;
        writeln!(f, "  entities_requested: {}", self.entities_requested)?;
        writeln!(f, "  entities_aligned: {}", self.entities_aligned)?;
        writeln!(f, "  entities_skipped: {}", self.entities_skipped)?;
        writeln!(f, "  buckets: {}", self.buckets)?;
        writeln!(f, "  snapshots: {}", self.snapshots)?;
        writeln!(f, "  earliest_ts_ms: {}", ts(self.earliest_ts_ms))?;
        writeln!(f, "  latest_ts_ms: {}", ts(self.latest_ts_ms))?;
        writeln!(f, "  entities: {}", self.per_entity.len())?;
        for e in self.per_entity.values() {
            writeln!(
                f,
                "    id={} snapshots={} missing_price={} missing_market_cap={} missing_volume={} duplicates={} first={} last={}",
                e.entity_id,
                e.snapshots,
                e.missing_price,
                e.missing_market_cap,
                e.missing_volume,
                e.duplicate_points,
                ts(e.first_ts_ms),
                ts(e.last_ts_ms),
            )?;
        }
        writeln!(f, "  empty_entities: {}", self.empty_entities.len())?;
        for id in &self.empty_entities {
            writeln!(f, "    id={}", id)?;
        }
        write!(f, "}}")
    }
}

pub(crate) fn build_coverage_report(
    entities_requested: usize,
    per_entity: Vec<EntityCoverage>,
    entities_skipped: usize,
    buckets: &BucketMap,
) -> CoverageReport {
    let entities_aligned = per_entity.len();
    let mut empty_entities: Vec<String> = per_entity
        .iter()
        .filter(|e| e.snapshots == 0)
        .map(|e| e.entity_id.clone())
        .collect();
    empty_entities.sort();

    CoverageReport {
        entities_requested,
        entities_aligned,
        entities_skipped,
        buckets: buckets.len(),
        snapshots: buckets.values().map(Vec::len).sum(),
        earliest_ts_ms: buckets.keys().next().copied(),
        latest_ts_ms: buckets.keys().next_back().copied(),
        per_entity: per_entity
            .into_iter()
            .map(|e| (e.entity_id.clone(), e))
            .collect(),
        empty_entities,
    }
}
