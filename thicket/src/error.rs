//! Error types for the search engine and the collaborators it consumes.
//!
//! Each concern has its own enum (tree store, oracle boundary, templates,
//! config); [`SearchError`] is what [`crate::TreeOfThoughts::reason`] returns.

use std::time::Duration;

use thiserror::Error;

use crate::tree::NodeId;

/// Errors from the node/tree store. Both are programming errors, never recovered from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("unknown parent node {0}")]
    UnknownParent(NodeId),
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
}

/// Failure at the oracle boundary (completion service).
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    /// Transport failure or the service refused the request.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
    /// No response within the per-call deadline.
    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),
    /// Non-success HTTP status.
    #[error("oracle returned status {status}: {body}")]
    Status { status: u16, body: String },
    /// The service answered but the payload had no completion text.
    #[error("invalid oracle response: {0}")]
    InvalidResponse(String),
}

impl OracleError {
    /// Whether another attempt may succeed. Client errors (4xx other than 408/429) are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            OracleError::Unavailable(_) | OracleError::Timeout(_) => true,
            OracleError::Status { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            OracleError::InvalidResponse(_) => false,
        }
    }
}

/// A prompt template referenced a placeholder outside the recognized set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown placeholder ${name} in template {template:?}")]
    UnknownPlaceholder { name: String, template: String },
}

/// Error when loading or validating a [`crate::SearchConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    Read { path: String, message: String },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("invalid prompt template: {0}")]
    Template(#[from] TemplateError),
    #[error("invalid validation pattern {pattern:?}: {message}")]
    Pattern { pattern: String, message: String },
}

/// Pipeline stage of one search iteration; used to report where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    StopCheck,
    Generation,
    Evaluation,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::StopCheck => "stop check",
            Stage::Generation => "generation",
            Stage::Evaluation => "evaluation",
        };
        f.write_str(s)
    }
}

/// Error returned by a search run or a single search step.
///
/// Exhaustion is not an error: it is reported through [`crate::SearchStatus::Exhausted`].
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("tree store: {0}")]
    Tree(#[from] TreeError),
    /// An oracle call failed (after retries) during a stage; the iteration was aborted
    /// and nothing from it was committed.
    #[error("oracle unavailable during {stage}: {source}")]
    OracleUnavailable {
        stage: Stage,
        #[source]
        source: OracleError,
    },
    /// The cancellation token fired while a stage was in flight.
    #[error("search cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(OracleError::Unavailable("reset".into()).is_retryable());
        assert!(OracleError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(OracleError::Status {
            status: 429,
            body: String::new()
        }
        .is_retryable());
        assert!(OracleError::Status {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!OracleError::Status {
            status: 401,
            body: String::new()
        }
        .is_retryable());
        assert!(!OracleError::InvalidResponse("no choices".into()).is_retryable());
    }

    #[test]
    fn oracle_unavailable_names_the_stage() {
        let err = SearchError::OracleUnavailable {
            stage: Stage::Evaluation,
            source: OracleError::Unavailable("connection refused".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("evaluation"));
        assert!(msg.contains("connection refused"));
    }
}
