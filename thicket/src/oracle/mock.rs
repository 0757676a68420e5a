//! Scripted oracle for tests and offline runs.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::OracleError;

use super::{Completion, CompletionRequest, Oracle};

type Script = dyn Fn(&CompletionRequest) -> Result<String, OracleError> + Send + Sync;

/// Oracle that answers from a closure (or a fixed string) and records every request.
///
/// ```rust
/// use thicket::{MockOracle, RequestKind};
///
/// let oracle = MockOracle::from_fn(|req| {
///     Ok(match req.kind {
///         RequestKind::StopCheck => "no".to_string(),
///         _ => "5".to_string(),
///     })
/// });
/// # let _ = oracle;
/// ```
#[derive(Clone)]
pub struct MockOracle {
    script: Arc<Script>,
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockOracle {
    /// Answers every request with `text`.
    pub fn fixed(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::from_fn(move |_| Ok(text.clone()))
    }

    /// Answers with whatever `f` returns for the request.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, OracleError> + Send + Sync + 'static,
    {
        Self {
            script: Arc::new(f),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fails every request with [`OracleError::Unavailable`].
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::from_fn(move |_| Err(OracleError::Unavailable(reason.clone())))
    }

    /// Requests seen so far, in the order `complete` was entered.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

impl std::fmt::Debug for MockOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockOracle")
            .field("calls", &self.call_count())
            .finish()
    }
}

#[async_trait]
impl Oracle for MockOracle {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, OracleError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        (self.script)(request).map(Completion::text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::RequestKind;

    #[tokio::test]
    async fn fixed_answers_everything_and_records_calls() {
        let oracle = MockOracle::fixed("yes");
        let req = CompletionRequest::new(RequestKind::Vital, "is it?");
        assert_eq!(oracle.complete(&req).await.unwrap().text, "yes");
        assert_eq!(oracle.complete(&req).await.unwrap().text, "yes");
        assert_eq!(oracle.call_count(), 2);
        assert_eq!(oracle.calls()[0].kind, RequestKind::Vital);
    }

    #[tokio::test]
    async fn from_fn_dispatches_on_kind() {
        let oracle = MockOracle::from_fn(|req| match req.kind {
            RequestKind::Graded => Ok("7".into()),
            _ => Ok("no".into()),
        });
        let graded = CompletionRequest::new(RequestKind::Graded, "");
        let fatal = CompletionRequest::new(RequestKind::Fatal, "");
        assert_eq!(oracle.complete(&graded).await.unwrap().text, "7");
        assert_eq!(oracle.complete(&fatal).await.unwrap().text, "no");
    }

    #[tokio::test]
    async fn unavailable_fails() {
        let oracle = MockOracle::unavailable("down");
        let err = oracle
            .complete(&CompletionRequest::new(RequestKind::StopCheck, ""))
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::Unavailable(ref r) if r == "down"));
        assert_eq!(oracle.call_count(), 1);
    }
}
