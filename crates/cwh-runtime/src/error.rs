use thiserror::Error;

use cwh_md::{AlignError, ResolutionError};

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("timestamp {ts_ms} ms is outside the representable UTC range")]
    Encode { ts_ms: i64 },
    #[error("snapshot serialization failed: {0}")]
    Serialize(String),
    #[error("staging store rejected the batch: {0}")]
    Store(String),
}

#[derive(Debug, Error)]
pub enum TransformationError {
    #[error("transformation procedure {procedure} failed: {message}")]
    Failed { procedure: String, message: String },
}

/// Fatal outcome of one pipeline invocation. The run is recorded FAILED with
/// this error's message.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Align(#[from] AlignError),
    #[error(transparent)]
    Staging(#[from] StagingError),
    #[error(transparent)]
    Transformation(#[from] TransformationError),
    #[error("No data fetched: {0}")]
    NoData(String),
}
