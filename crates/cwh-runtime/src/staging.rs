//! Staging writer.
//!
//! One bucket becomes one staging record: `ingested_at` is the bucket's
//! timestamp as naive UTC, the payload is the JSON array of the bucket's
//! snapshots. Records are produced and appended in ascending timestamp
//! order. The store is append-only.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::info;

use cwh_md::{BucketMap, CompositeSnapshot};

use crate::error::StagingError;

#[derive(Debug, Clone, PartialEq)]
pub struct StagingRecord {
    pub ingested_at: NaiveDateTime,
    pub payload: Value,
}

/// Append-only sink for staging records.
#[async_trait::async_trait]
pub trait StagingStore: Send + Sync {
    /// Insert `records` in order; returns the number inserted.
    async fn append(&self, records: &[StagingRecord]) -> anyhow::Result<u64>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StagingReport {
    pub records: u64,
    pub snapshots: usize,
}

/// Encode a bucket map into staging records, ascending by timestamp.
pub fn encode_buckets(buckets: &BucketMap) -> Result<Vec<StagingRecord>, StagingError> {
    buckets
        .iter()
        .map(|(&ts_ms, snaps)| {
            let ingested_at = DateTime::<Utc>::from_timestamp_millis(ts_ms)
                .ok_or(StagingError::Encode { ts_ms })?
                .naive_utc();
            Ok(StagingRecord {
                ingested_at,
                payload: to_payload(snaps)?,
            })
        })
        .collect()
}

/// One record holding the flat current-state list.
pub fn encode_live(snapshots: &[CompositeSnapshot], now: DateTime<Utc>) -> Result<StagingRecord, StagingError> {
    Ok(StagingRecord {
        ingested_at: now.naive_utc(),
        payload: to_payload(snapshots)?,
    })
}

fn to_payload(snaps: &[CompositeSnapshot]) -> Result<Value, StagingError> {
    serde_json::to_value(snaps).map_err(|e| StagingError::Serialize(e.to_string()))
}

pub struct StagingWriter<'a> {
    store: &'a dyn StagingStore,
}

impl<'a> StagingWriter<'a> {
    pub fn new(store: &'a dyn StagingStore) -> Self {
        Self { store }
    }

    pub async fn write_buckets(&self, buckets: &BucketMap) -> Result<StagingReport, StagingError> {
        if buckets.is_empty() {
            info!("nothing to write");
            return Ok(StagingReport::default());
        }

        let records = encode_buckets(buckets)?;
        let snapshots = buckets.values().map(Vec::len).sum();
        let written = self.append(&records).await?;
        info!(records = written, snapshots, "staged historical snapshots");

        Ok(StagingReport {
            records: written,
            snapshots,
        })
    }

    pub async fn write_live(
        &self,
        snapshots: &[CompositeSnapshot],
        now: DateTime<Utc>,
    ) -> Result<StagingReport, StagingError> {
        let record = encode_live(snapshots, now)?;
        let written = self.append(std::slice::from_ref(&record)).await?;
        info!(records = written, snapshots = snapshots.len(), "staged live snapshot list");

        Ok(StagingReport {
            records: written,
            snapshots: snapshots.len(),
        })
    }

    async fn append(&self, records: &[StagingRecord]) -> Result<u64, StagingError> {
        self.store
            .append(records)
            .await
            .map_err(|e| StagingError::Store(format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwh_md::Entity;

    fn snap(id: &str, price: Option<f64>) -> CompositeSnapshot {
        CompositeSnapshot {
            current_price: price,
            ..CompositeSnapshot::for_entity(&Entity::new(id))
        }
    }

    #[test]
    fn buckets_encode_in_ascending_order() {
        let mut b = BucketMap::new();
        b.insert(3_000, vec![snap("a", Some(3.0))]);
        b.insert(1_000, vec![snap("a", Some(1.0)), snap("b", None)]);
        b.insert(2_000, vec![snap("b", Some(2.0))]);

        let recs = encode_buckets(&b).unwrap();
        let times: Vec<i64> = recs
            .iter()
            .map(|r| r.ingested_at.and_utc().timestamp_millis())
            .collect();
        assert_eq!(times, vec![1_000, 2_000, 3_000]);
        assert_eq!(recs[0].payload.as_array().unwrap().len(), 2);
        assert!(recs[0].payload[1]["current_price"].is_null());
    }

    #[test]
    fn out_of_range_timestamp_is_an_encode_error() {
        let mut b = BucketMap::new();
        b.insert(i64::MAX, vec![snap("a", None)]);
        assert!(matches!(
            encode_buckets(&b),
            Err(StagingError::Encode { ts_ms: i64::MAX })
        ));
    }

    #[test]
    fn live_record_uses_now_and_flat_list() {
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let rec = encode_live(&[snap("a", Some(1.0)), snap("b", Some(2.0))], now).unwrap();
        assert_eq!(rec.ingested_at, now.naive_utc());
        assert_eq!(rec.payload.as_array().unwrap().len(), 2);
        assert_eq!(rec.payload[1]["id"], "b");
    }
}
