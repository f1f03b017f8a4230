//! Error taxonomy for the market-data side.

use thiserror::Error;

/// Why a single attempt against the upstream failed in a retryable way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureCause {
    #[error("rate limited (HTTP 429)")]
    RateLimited,
    #[error("HTTP {0}")]
    Status(u16),
    #[error("transport: {0}")]
    Transport(String),
    #[error("undecodable body: {0}")]
    Decode(String),
}

impl FailureCause {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, FailureCause::RateLimited)
    }
}

/// A data source request that ultimately failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// Every attempt failed; carries the cause of the last one.
    #[error("{path}: gave up after {attempts} attempt(s), last failure: {cause}")]
    Exhausted {
        path: String,
        attempts: u32,
        cause: FailureCause,
    },
    /// Client error other than 429. Never retried.
    #[error("{path}: rejected with HTTP {status}: {body}")]
    Rejected {
        path: String,
        status: u16,
        body: String,
    },
    /// 2xx with a body of the wrong shape.
    #[error("{path}: unexpected payload: {message}")]
    Payload { path: String, message: String },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// No universe could be produced; the invocation must not proceed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("no entities resolved (upstream: {upstream}; directory returned none)")]
    Empty { upstream: String },
    #[error("entity directory lookup failed: {message} (upstream: {upstream})")]
    Directory { upstream: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignError {
    #[error("alignment requested with an empty universe")]
    EmptyUniverse,
}
