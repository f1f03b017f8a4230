//! cwh-runtime
//!
//! Wires the market-data side (cwh-md) to the warehouse (cwh-db): staging
//! writer, run tracker, transformation trigger, and the two pipelines built
//! from them. Every collaborator is a trait object behind [`Ports`]; the
//! Postgres implementations live in [`pg`].

pub mod error;
pub mod pg;
pub mod pipeline;
pub mod staging;
pub mod tracker;
pub mod transform;

pub use error::{PipelineError, StagingError, TransformationError};
pub use pipeline::{
    BackfillError, BackfillParams, BackfillProgress, BackfillSummary, LiveParams, LiveSummary,
    Pipeline, Ports, TransformationState,
};
pub use staging::{encode_buckets, encode_live, StagingRecord, StagingReport, StagingStore, StagingWriter};
pub use tracker::{RunHandle, RunLogStore, RunStatus, RunTracker};
pub use transform::{TransformProcedure, TransformationTrigger};
