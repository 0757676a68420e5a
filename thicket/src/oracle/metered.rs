//! Call and token accounting around an oracle, with an optional cap on calls in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Semaphore;

use crate::error::OracleError;

use super::{Completion, CompletionRequest, Oracle};

/// Totals for one search run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OracleStats {
    pub calls: u64,
    pub failures: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

#[derive(Debug, Default)]
struct Counters {
    calls: AtomicU64,
    failures: AtomicU64,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
}

/// Counts calls, failures and reported token usage of the wrapped oracle.
///
/// Clones share counters and the in-flight limit, so one limit bounds every
/// collaborator of a run no matter how their batches nest.
#[derive(Clone)]
pub struct MeteredOracle {
    inner: Arc<dyn Oracle>,
    counters: Arc<Counters>,
    permits: Option<Arc<Semaphore>>,
}

impl MeteredOracle {
    pub fn new(inner: Arc<dyn Oracle>) -> Self {
        Self {
            inner,
            counters: Arc::new(Counters::default()),
            permits: None,
        }
    }

    /// At most `limit` calls reach the inner oracle at once (`None` or `0`: unbounded).
    pub fn with_max_in_flight(mut self, limit: Option<usize>) -> Self {
        self.permits = limit
            .filter(|&n| n > 0)
            .map(|n| Arc::new(Semaphore::new(n)));
        self
    }

    pub fn stats(&self) -> OracleStats {
        let c = &self.counters;
        OracleStats {
            calls: c.calls.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            prompt_tokens: c.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: c.completion_tokens.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl Oracle for MeteredOracle {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, OracleError> {
        let _permit = match &self.permits {
            Some(permits) => Some(permits.acquire().await.map_err(|_| {
                OracleError::Unavailable("oracle concurrency limiter closed".to_string())
            })?),
            None => None,
        };
        self.counters.calls.fetch_add(1, Ordering::Relaxed);
        let result = self.inner.complete(request).await;
        match &result {
            Ok(completion) => {
                if let Some(usage) = completion.usage {
                    self.counters
                        .prompt_tokens
                        .fetch_add(u64::from(usage.prompt_tokens), Ordering::Relaxed);
                    self.counters
                        .completion_tokens
                        .fetch_add(u64::from(usage.completion_tokens), Ordering::Relaxed);
                }
            }
            Err(_) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        tracing::debug!(kind = ?request.kind, ok = result.is_ok(), "oracle call");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{MockOracle, RequestKind, TokenUsage};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct WithUsage;

    #[async_trait]
    impl Oracle for WithUsage {
        async fn complete(&self, _: &CompletionRequest) -> Result<Completion, OracleError> {
            Ok(Completion {
                text: "ok".into(),
                usage: Some(TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 2,
                    total_tokens: 12,
                }),
            })
        }
    }

    #[tokio::test]
    async fn counts_calls_and_tokens() {
        let m = MeteredOracle::new(Arc::new(WithUsage));
        let req = CompletionRequest::new(RequestKind::Graded, "p");
        m.complete(&req).await.unwrap();
        m.complete(&req).await.unwrap();
        assert_eq!(
            m.stats(),
            OracleStats {
                calls: 2,
                failures: 0,
                prompt_tokens: 20,
                completion_tokens: 4,
            }
        );
    }

    #[tokio::test]
    async fn counts_failures() {
        let m = MeteredOracle::new(Arc::new(MockOracle::unavailable("down")));
        let req = CompletionRequest::new(RequestKind::StopCheck, "p");
        assert!(m.complete(&req).await.is_err());
        assert_eq!(m.stats().calls, 1);
        assert_eq!(m.stats().failures, 1);
    }

    #[derive(Default)]
    struct Gauge {
        now: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Oracle for Gauge {
        async fn complete(&self, _: &CompletionRequest) -> Result<Completion, OracleError> {
            let now = self.now.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.now.fetch_sub(1, Ordering::SeqCst);
            Ok(Completion::text("7"))
        }
    }

    #[tokio::test]
    async fn limit_is_shared_across_clones() {
        let gauge = Arc::new(Gauge::default());
        let m = MeteredOracle::new(gauge.clone()).with_max_in_flight(Some(2));
        let req = CompletionRequest::new(RequestKind::Graded, "p");
        let calls: Vec<_> = (0..6)
            .map(|_| {
                let m = m.clone();
                let req = req.clone();
                async move { m.complete(&req).await }
            })
            .collect();
        for out in futures::future::join_all(calls).await {
            assert_eq!(out.unwrap().text, "7");
        }
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 2);
        assert_eq!(m.stats().calls, 6);
    }
}
