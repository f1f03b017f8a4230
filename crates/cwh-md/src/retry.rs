//! Retry policy for upstream calls.
//!
//! Wait before retry `n` (1-based attempt that just failed):
//! - rate limited: `min(max_wait, n * rate_limit_step)`
//! - any other retryable failure: `min(max_wait, n * failure_step)`
//!
//! Non-retryable failures surface immediately. Exhaustion yields
//! [`UpstreamError::Exhausted`] with the last cause.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{FailureCause, UpstreamError};
use crate::pause::Pause;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first one. Values below 1 behave as 1.
    pub max_attempts: u32,
    pub rate_limit_step: Duration,
    pub failure_step: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            rate_limit_step: Duration::from_secs(3),
            failure_step: Duration::from_secs(2),
            max_wait: Duration::from_secs(20),
        }
    }
}

/// Outcome of one failed attempt.
#[derive(Debug)]
pub enum AttemptFailure {
    Retryable(FailureCause),
    Permanent(UpstreamError),
}

impl RetryPolicy {
    pub fn from_config(cfg: &cwh_config::RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            rate_limit_step: Duration::from_secs(cfg.rate_limit_step_secs),
            failure_step: Duration::from_secs(cfg.failure_step_secs),
            max_wait: Duration::from_secs(cfg.max_wait_secs),
        }
    }

    pub fn backoff(&self, attempt: u32, cause: &FailureCause) -> Duration {
        let step = if cause.is_rate_limit() {
            self.rate_limit_step
        } else {
            self.failure_step
        };
        step.saturating_mul(attempt).min(self.max_wait)
    }

    /// Drive `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. `label` names the request in
    /// logs and in the exhaustion error.
    pub async fn run<T, F, Fut>(
        &self,
        pause: &dyn Pause,
        label: &str,
        mut op: F,
    ) -> Result<T, UpstreamError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AttemptFailure>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt: u32 = 1;

        loop {
            match op(attempt).await {
                Ok(v) => {
                    if attempt > 1 {
                        debug!(path = label, attempt, "upstream recovered");
                    }
                    return Ok(v);
                }
                Err(AttemptFailure::Permanent(e)) => return Err(e),
                Err(AttemptFailure::Retryable(cause)) => {
                    if attempt >= max_attempts {
                        return Err(UpstreamError::Exhausted {
                            path: label.to_string(),
                            attempts: attempt,
                            cause,
                        });
                    }

                    let wait = self.backoff(attempt, &cause);
                    warn!(
                        path = label,
                        attempt,
                        max_attempts,
                        wait_secs = wait.as_secs_f64(),
                        cause = %cause,
                        "upstream attempt failed; retrying"
                    );
                    pause.pause(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}
