//! Oracle abstraction: the text-completion service the search consumes.
//!
//! The search engine only ever asks for one completion per request (prompt plus
//! stop constraints). Interpreting the raw text (yes/no, digit) is the caller's
//! job, not the oracle's.
//!
//! Implementations: [`MockOracle`] (scripted, for tests), [`OpenAiOracle`]
//! (OpenAI-compatible chat completions over HTTP). [`ResilientOracle`] wraps any
//! oracle with per-call timeouts and bounded retries; [`MeteredOracle`] counts
//! calls and token usage.

mod metered;
mod mock;
mod openai;
mod retry;

pub use metered::{MeteredOracle, OracleStats};
pub use mock::MockOracle;
pub use openai::{OpenAiOracle, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};
pub use retry::{ResilientOracle, RetryPolicy};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OracleError;

/// What a completion request is for. Oracles may ignore it; it drives logging and
/// lets scripted oracles answer by purpose instead of by prompt text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// "Does this path already admit a final answer?"
    StopCheck,
    /// One next reasoning step.
    NextThought,
    /// Final-answer extraction.
    FinalAnswer,
    /// Yes/no over a statement that must be false.
    Fatal,
    /// Yes/no over a statement that must be true.
    Vital,
    /// Integer grade over a statement.
    Graded,
    /// Yes/no validation question over an answer candidate.
    Validation,
}

/// One completion request: prompt plus stop constraints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub kind: RequestKind,
    pub prompt: String,
    /// Generation stops before any of these substrings.
    pub stop: Vec<String>,
    pub max_tokens: Option<u32>,
    /// `None` lets the service choose; `Some(0.0)` asks for greedy decoding.
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(kind: RequestKind, prompt: impl Into<String>) -> Self {
        Self {
            kind,
            prompt: prompt.into(),
            stop: Vec::new(),
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_stop<I, S>(mut self, stop: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop = stop.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Token usage for one oracle call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Generated text for one request.
#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }
}

/// Text-completion service.
///
/// Calls within one search stage are issued concurrently from a single task, so
/// implementations must tolerate overlapping `complete` calls on `&self`.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, OracleError>;
}

#[async_trait]
impl<T: Oracle + ?Sized> Oracle for std::sync::Arc<T> {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, OracleError> {
        (**self).complete(request).await
    }
}

#[async_trait]
impl<T: Oracle + ?Sized> Oracle for Box<T> {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, OracleError> {
        (**self).complete(request).await
    }
}
