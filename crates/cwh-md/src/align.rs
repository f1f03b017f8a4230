//! Time-series alignment.
//!
//! For one entity, the three series (price, market cap, volume) are joined
//! on exact millisecond timestamps: the key set is the union of all three,
//! and a series that lacks a key contributes `null`. No interpolation, no
//! carry-forward. Snapshots from every entity accumulate into one ordered
//! bucket map.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::client::MarketDataSource;
use crate::coordinator::{AlignmentOutcome, Coordinator, SkipReason};
use crate::error::AlignError;
use crate::pause::Pause;
use crate::{CompositeSnapshot, Entity, HistoryPayload, SeriesPoint};

const SECS_PER_DAY: i64 = 86_400;

/// One entity's aligned snapshots, keyed by `ts_ms`.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityAlignment {
    pub entity_id: String,
    pub snapshots: BTreeMap<i64, CompositeSnapshot>,
    /// Raw points dropped because their timestamp repeated within a series.
    pub duplicate_points: usize,
}

/// Join the three series of `payload` for `entity`.
pub fn compose_snapshots(entity: &Entity, payload: &HistoryPayload) -> EntityAlignment {
    let mut duplicate_points = 0usize;
    let prices = collapse(&payload.prices, &mut duplicate_points);
    let caps = collapse(&payload.market_caps, &mut duplicate_points);
    let volumes = collapse(&payload.total_volumes, &mut duplicate_points);

    let keys: BTreeSet<i64> = prices
        .keys()
        .chain(caps.keys())
        .chain(volumes.keys())
        .copied()
        .collect();

    let base = CompositeSnapshot::for_entity(entity);
    let snapshots = keys
        .into_iter()
        .map(|ts| {
            let snap = CompositeSnapshot {
                current_price: prices.get(&ts).copied().flatten(),
                market_cap: caps.get(&ts).copied().flatten(),
                total_volume: volumes.get(&ts).copied().flatten(),
                ..base.clone()
            };
            (ts, snap)
        })
        .collect();

    EntityAlignment {
        entity_id: entity.id.clone(),
        snapshots,
        duplicate_points,
    }
}

/// Last value wins for a repeated timestamp.
fn collapse(points: &[SeriesPoint], duplicates: &mut usize) -> BTreeMap<i64, Option<f64>> {
    let mut out = BTreeMap::new();
    for p in points {
        if out.insert(p.ts_ms, p.value).is_some() {
            *duplicates += 1;
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignRequest {
    pub quote: String,
    pub days_back: u32,
    /// Wait between consecutive entities. Zero performs no wait.
    pub inter_entity_pause: Duration,
    /// Window end; injected so runs are reproducible in tests.
    pub now: DateTime<Utc>,
}

impl AlignRequest {
    /// `[now - days_back, now]` in unix seconds.
    pub fn window_secs(&self) -> (i64, i64) {
        let to = self.now.timestamp();
        let from = to - i64::from(self.days_back) * SECS_PER_DAY;
        (from, to)
    }
}

pub struct AlignmentEngine<'a> {
    source: &'a dyn MarketDataSource,
    pause: &'a dyn Pause,
}

impl<'a> AlignmentEngine<'a> {
    pub fn new(source: &'a dyn MarketDataSource, pause: &'a dyn Pause) -> Self {
        Self { source, pause }
    }

    /// Fetch and align every entity in order. Entities whose fetch fails are
    /// skipped and reported; they never abort the batch.
    pub async fn align(
        &self,
        entities: &[Entity],
        req: &AlignRequest,
    ) -> Result<AlignmentOutcome, AlignError> {
        if entities.is_empty() {
            return Err(AlignError::EmptyUniverse);
        }

        let (from, to) = req.window_secs();
        info!(
            entities = entities.len(),
            days_back = req.days_back,
            from,
            to,
            "building history snapshots"
        );

        let mut coordinator = Coordinator::new(entities.len());
        let total = entities.len();

        for (index, entity) in entities.iter().enumerate() {
            info!(entity_id = %entity.id, position = index + 1, total, "fetching history");

            let outcome = if coordinator.has_seen(&entity.id) {
                warn!(entity_id = %entity.id, "entity repeated in universe; skipping");
                Err(SkipReason::DuplicateEntity)
            } else {
                match self
                    .source
                    .history_range(&entity.id, &req.quote, from, to)
                    .await
                {
                    Ok(payload) => Ok(compose_snapshots(entity, &payload)),
                    Err(e) => {
                        warn!(entity_id = %entity.id, error = %e, "skipping entity");
                        Err(SkipReason::Upstream(e))
                    }
                }
            };
            coordinator.record(entity, outcome);

            let is_last = index + 1 == total;
            if !is_last && !req.inter_entity_pause.is_zero() {
                self.pause.pause(req.inter_entity_pause).await;
            }
        }

        Ok(coordinator.finish())
    }
}
