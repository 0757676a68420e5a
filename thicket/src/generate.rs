//! Thought generator: stop checks, next-step proposals and final-answer extraction.
//!
//! Each method issues exactly one oracle request; the search loop batches them.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::OracleError;
use crate::interpret::parse_yes_no;
use crate::oracle::{CompletionRequest, Oracle, RequestKind};
use crate::path::ReasoningPath;
use crate::prompts::PromptSet;
use crate::template::TemplateContext;

/// Post-processing applied to every extracted final answer.
pub type AnswerTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Token budgets and sampling for generation requests.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationSettings {
    pub thought_max_tokens: u32,
    pub answer_max_tokens: u32,
    /// Sampling temperature for next-thought proposals; every other request is greedy.
    pub thought_temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            thought_max_tokens: 96,
            answer_max_tokens: 48,
            thought_temperature: 0.8,
        }
    }
}

/// Max tokens for a yes/no or digit answer.
pub(crate) const CLASSIFY_MAX_TOKENS: u32 = 3;

/// Config-driven answer normalization: trim whitespace, strip `trim_chars` from both
/// ends, optionally lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnswerNormalizer {
    pub trim_chars: String,
    pub lowercase: bool,
}

impl Default for AnswerNormalizer {
    fn default() -> Self {
        Self {
            trim_chars: ".".to_string(),
            lowercase: false,
        }
    }
}

impl AnswerNormalizer {
    pub fn apply(&self, raw: &str) -> String {
        let trimmed = raw
            .trim()
            .trim_matches(|c: char| self.trim_chars.contains(c))
            .trim();
        if self.lowercase {
            trimmed.to_lowercase()
        } else {
            trimmed.to_string()
        }
    }

    pub fn into_transform(self) -> AnswerTransform {
        Arc::new(move |raw: &str| self.apply(raw))
    }
}

/// Proposes thoughts and extracts answers through the oracle.
#[derive(Clone)]
pub struct ThoughtGenerator {
    oracle: Arc<dyn Oracle>,
    prompts: Arc<PromptSet>,
    settings: GenerationSettings,
    transform: AnswerTransform,
}

impl ThoughtGenerator {
    pub fn new(
        oracle: Arc<dyn Oracle>,
        prompts: Arc<PromptSet>,
        settings: GenerationSettings,
        transform: AnswerTransform,
    ) -> Self {
        Self {
            oracle,
            prompts,
            settings,
            transform,
        }
    }

    fn context<'a>(path: &'a ReasoningPath) -> TemplateContext<'a> {
        TemplateContext {
            problem: Some(path.problem()),
            path: Some(path.text()),
            ..Default::default()
        }
    }

    /// Whether the path already admits a final answer. A malformed reply counts as "no"
    /// so the leaf keeps branching.
    pub async fn stop_check(&self, path: &ReasoningPath) -> Result<bool, OracleError> {
        let prompt = self.prompts.stop_check.render(&Self::context(path));
        let request = CompletionRequest::new(RequestKind::StopCheck, prompt)
            .with_stop(["\n"])
            .with_max_tokens(CLASSIFY_MAX_TOKENS)
            .with_temperature(0.0);
        let reply = self.oracle.complete(&request).await?;
        match parse_yes_no(&reply.text) {
            Some(answerable) => Ok(answerable),
            None => {
                tracing::warn!(reply = %reply.text, "malformed stop-check reply, treating as not answerable");
                Ok(false)
            }
        }
    }

    /// One next reasoning step, cut at the first newline.
    pub async fn next_thought(&self, path: &ReasoningPath) -> Result<String, OracleError> {
        let mut prompt = self.prompts.next_thought.render(&Self::context(path));
        prompt.push_str(&self.prompts.step_prefix);
        let request = CompletionRequest::new(RequestKind::NextThought, prompt)
            .with_stop(["\n"])
            .with_max_tokens(self.settings.thought_max_tokens)
            .with_temperature(self.settings.thought_temperature);
        let reply = self.oracle.complete(&request).await?;
        let thought = first_line(&reply.text).trim().to_string();
        tracing::debug!(depth = path.depth(), %thought, "proposed thought");
        Ok(thought)
    }

    /// Extracts a final-answer phrase and applies the answer transform.
    pub async fn final_answer(&self, path: &ReasoningPath) -> Result<String, OracleError> {
        let prompt = self.prompts.final_answer.render(&Self::context(path));
        let request = CompletionRequest::new(RequestKind::FinalAnswer, prompt)
            .with_stop(["\n"])
            .with_max_tokens(self.settings.answer_max_tokens)
            .with_temperature(0.0);
        let reply = self.oracle.complete(&request).await?;
        let answer = (self.transform)(first_line(&reply.text));
        tracing::debug!(raw = %reply.text, %answer, "extracted final answer");
        Ok(answer)
    }
}

/// Oracles may ignore stop sequences; enforce the newline boundary here too.
fn first_line(text: &str) -> &str {
    let text = text.trim_start_matches(['\n', '\r']);
    text.split(['\n', '\r']).next().unwrap_or("")
}
