//! Candidate-thought evaluation: fatal/vital gates, then graded criteria.
//!
//! Fatal and vital criteria are yes/no classifications asked concurrently. Any
//! violation collapses the score to 0 and the graded criteria are never asked.
//! Otherwise every graded criterion is asked concurrently and the recentered
//! contributions are summed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::batch::fan_out;
use crate::error::OracleError;
use crate::generate::CLASSIFY_MAX_TOKENS;
use crate::interpret::{parse_yes_no, GradeScale};
use crate::oracle::{CompletionRequest, Oracle, RequestKind};
use crate::path::ReasoningPath;
use crate::prompts::PromptSet;
use crate::template::TemplateContext;

/// Criterion statements judged against every candidate thought.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Criteria {
    /// Must evaluate false; "yes" kills the candidate.
    pub fatal: Vec<String>,
    /// Must evaluate true; "no" kills the candidate.
    pub vital: Vec<String>,
    /// Graded on the configured [`GradeScale`] and summed.
    pub graded: Vec<String>,
}

impl Criteria {
    pub fn is_empty(&self) -> bool {
        self.fatal.is_empty() && self.vital.is_empty() && self.graded.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionKind {
    Fatal,
    Vital,
}

impl CriterionKind {
    fn request_kind(self) -> RequestKind {
        match self {
            CriterionKind::Fatal => RequestKind::Fatal,
            CriterionKind::Vital => RequestKind::Vital,
        }
    }

    /// The answer that breaks the criterion.
    fn violating_answer(self) -> bool {
        matches!(self, CriterionKind::Fatal)
    }
}

/// The first fatal/vital criterion (in config order) a candidate broke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub kind: CriterionKind,
    pub statement: String,
}

/// Rule deciding which scores survive.
///
/// Config form: `survival = "strictly_positive"`, `"non_negative"` or
/// `survival = { minimum = 1.5 }`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurvivalThreshold {
    /// Score > 0.
    #[default]
    StrictlyPositive,
    /// Score >= 0.
    NonNegative,
    /// Score >= the given value, which must be finite and not negative.
    Minimum(f64),
}

impl SurvivalThreshold {
    /// Frontier scores are decayed towards 0, so a surviving score may never be negative.
    pub fn is_valid(&self) -> bool {
        match *self {
            SurvivalThreshold::Minimum(min) => min.is_finite() && min >= 0.0,
            _ => true,
        }
    }

    pub fn admits(&self, score: f64) -> bool {
        match *self {
            SurvivalThreshold::StrictlyPositive => score > 0.0,
            SurvivalThreshold::NonNegative => score >= 0.0,
            SurvivalThreshold::Minimum(min) => score >= min,
        }
    }
}

/// Result of judging one candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub score: f64,
    pub violation: Option<Violation>,
    /// Recentered graded contributions in criterion order; empty after a violation.
    pub contributions: Vec<i32>,
}

impl Evaluation {
    fn violated(violation: Violation) -> Self {
        Self {
            score: 0.0,
            violation: Some(violation),
            contributions: Vec::new(),
        }
    }

    /// Violations always die; otherwise `threshold` decides.
    pub fn survives(&self, threshold: SurvivalThreshold) -> bool {
        self.violation.is_none() && threshold.admits(self.score)
    }
}

/// Scores candidate thoughts through the oracle.
#[derive(Clone)]
pub struct Evaluator {
    oracle: Arc<dyn Oracle>,
    prompts: Arc<PromptSet>,
    criteria: Arc<Criteria>,
    scale: GradeScale,
    max_in_flight: Option<usize>,
}

impl Evaluator {
    pub fn new(
        oracle: Arc<dyn Oracle>,
        prompts: Arc<PromptSet>,
        criteria: Criteria,
        scale: GradeScale,
        max_in_flight: Option<usize>,
    ) -> Self {
        Self {
            oracle,
            prompts,
            criteria: Arc::new(criteria),
            scale,
            max_in_flight,
        }
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    /// Judges `candidate` as the next step after `path`.
    pub async fn evaluate(
        &self,
        path: &ReasoningPath,
        candidate: &str,
    ) -> Result<Evaluation, OracleError> {
        let extended = path.extend(candidate, &self.prompts.step_prefix);

        if let Some(violation) = self.first_violation(&extended, candidate).await? {
            tracing::debug!(kind = ?violation.kind, statement = %violation.statement, %candidate, "criterion violated");
            return Ok(Evaluation::violated(violation));
        }

        let contributions = self.grade(&extended, candidate).await?;
        let score = contributions.iter().map(|c| f64::from(*c)).sum();
        tracing::debug!(%candidate, score, "candidate graded");
        Ok(Evaluation {
            score,
            violation: None,
            contributions,
        })
    }

    async fn first_violation(
        &self,
        path: &ReasoningPath,
        candidate: &str,
    ) -> Result<Option<Violation>, OracleError> {
        let checks: Vec<(CriterionKind, &str)> = self
            .criteria
            .fatal
            .iter()
            .map(|s| (CriterionKind::Fatal, s.as_str()))
            .chain(
                self.criteria
                    .vital
                    .iter()
                    .map(|s| (CriterionKind::Vital, s.as_str())),
            )
            .collect();
        if checks.is_empty() {
            return Ok(None);
        }

        let futures = checks
            .iter()
            .map(|&(kind, statement)| self.classify(path, candidate, kind, statement))
            .collect();
        let violated = fan_out(futures, self.max_in_flight).await?;

        Ok(checks
            .into_iter()
            .zip(violated)
            .find(|(_, v)| *v)
            .map(|((kind, statement), _)| Violation {
                kind,
                statement: statement.to_string(),
            }))
    }

    /// Whether the oracle's reply breaks the criterion. Malformed replies do not.
    async fn classify(
        &self,
        path: &ReasoningPath,
        candidate: &str,
        kind: CriterionKind,
        statement: &str,
    ) -> Result<bool, OracleError> {
        let prompt = self.prompts.criterion.render(&TemplateContext {
            problem: Some(path.problem()),
            path: Some(path.text()),
            candidate: Some(candidate),
            statement: Some(statement),
            ..Default::default()
        });
        let request = CompletionRequest::new(kind.request_kind(), prompt)
            .with_stop(["\n"])
            .with_max_tokens(CLASSIFY_MAX_TOKENS)
            .with_temperature(0.0);
        let reply = self.oracle.complete(&request).await?;
        match parse_yes_no(&reply.text) {
            Some(answer) => Ok(answer == kind.violating_answer()),
            None => {
                tracing::warn!(?kind, %statement, reply = %reply.text, "malformed criterion reply, treating as not violated");
                Ok(false)
            }
        }
    }

    async fn grade(&self, path: &ReasoningPath, candidate: &str) -> Result<Vec<i32>, OracleError> {
        let futures = self
            .criteria
            .graded
            .iter()
            .map(|statement| self.grade_one(path, candidate, statement))
            .collect();
        fan_out(futures, self.max_in_flight).await
    }

    async fn grade_one(
        &self,
        path: &ReasoningPath,
        candidate: &str,
        statement: &str,
    ) -> Result<i32, OracleError> {
        let prompt = self.prompts.graded.render(&TemplateContext {
            problem: Some(path.problem()),
            path: Some(path.text()),
            candidate: Some(candidate),
            statement: Some(statement),
            ..Default::default()
        });
        let request = CompletionRequest::new(RequestKind::Graded, prompt)
            .with_stop(["\n"])
            .with_max_tokens(CLASSIFY_MAX_TOKENS)
            .with_temperature(0.0);
        let reply = self.oracle.complete(&request).await?;
        Ok(self.scale.parse_contribution(&reply.text).unwrap_or_else(|| {
            tracing::warn!(%statement, reply = %reply.text, "malformed grade, using neutral");
            0
        }))
    }
}
