//! Per-call timeout and bounded retries around any [`Oracle`].

use std::time::Duration;

use async_trait::async_trait;

use crate::error::OracleError;

use super::{Completion, CompletionRequest, Oracle};

/// Bounded exponential backoff with a per-attempt deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one; `1` disables retries.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    /// Deadline for one attempt; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            multiplier: 2.0,
            timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no deadline.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
            timeout: None,
        }
    }

    pub fn exponential(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.saturating_sub(1) as i32);
        let delay = self.initial_backoff.mul_f64(factor.max(0.0));
        delay.min(self.max_backoff)
    }
}

/// Wraps an oracle with [`RetryPolicy`]. Non-retryable errors (see
/// [`OracleError::is_retryable`]) are returned immediately.
#[derive(Debug, Clone)]
pub struct ResilientOracle<O> {
    inner: O,
    policy: RetryPolicy,
}

impl<O: Oracle> ResilientOracle<O> {
    pub fn new(inner: O, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn into_inner(self) -> O {
        self.inner
    }

    async fn attempt(&self, request: &CompletionRequest) -> Result<Completion, OracleError> {
        match self.policy.timeout {
            Some(limit) => tokio::time::timeout(limit, self.inner.complete(request))
                .await
                .map_err(|_| OracleError::Timeout(limit))?,
            None => self.inner.complete(request).await,
        }
    }
}

#[async_trait]
impl<O: Oracle> Oracle for ResilientOracle<O> {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, OracleError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(request).await {
                Ok(out) => return Ok(out),
                Err(e) if attempt < attempts && e.is_retryable() => {
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        kind = ?request.kind,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "oracle call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
