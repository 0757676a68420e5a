//! Best-first tree-of-thoughts search.
//!
//! [`TreeOfThoughts`] holds the configured collaborators and starts runs; each run is a
//! [`SearchSession`] that owns its tree and viable-leaf index. [`TreeOfThoughts::reason`]
//! drives a session to termination.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use thicket::{MockOracle, RequestKind, TreeOfThoughts, ValidationItem};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let oracle = MockOracle::from_fn(|req| {
//!     Ok(match req.kind {
//!         RequestKind::StopCheck => "yes".into(),
//!         _ => "24".into(),
//!     })
//! });
//! let tot = TreeOfThoughts::builder(Arc::new(oracle))
//!     .validation(ValidationItem::programmatic("is_digit", |s: &str| {
//!         s.chars().all(|c| c.is_ascii_digit())
//!     }, true))
//!     .build()?;
//! let outcome = tot.reason("Use 4 4 6 8 to make 24.").await?;
//! assert_eq!(outcome.answers, vec!["24".to_string()]);
//! # Ok(())
//! # }
//! ```

mod outcome;
mod session;

pub use outcome::{SearchOutcome, SearchStatus, StepOutcome};
pub use session::SearchSession;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use crate::config::{
    SearchConfig, DEFAULT_MAX_ITERATIONS, DEFAULT_N_ACTIVE_LEAVES, DEFAULT_N_BRANCHES,
};
use crate::error::{ConfigError, SearchError};
use crate::evaluate::{Criteria, Evaluator, SurvivalThreshold};
use crate::event::SearchEvent;
use crate::frontier::{DEFAULT_DECAY, DEFAULT_RESEED_SCORE};
use crate::generate::{AnswerNormalizer, AnswerTransform, GenerationSettings, ThoughtGenerator};
use crate::interpret::GradeScale;
use crate::oracle::{MeteredOracle, Oracle};
use crate::prompts::PromptSet;
use crate::validate::{AnswerValidator, ValidationItem};

use session::Pipeline;

/// Shape of the search: how wide, how deep, how fast scores fade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    pub n_active_leaves: usize,
    pub n_branches: usize,
    pub max_iterations: usize,
    pub decay: f64,
    pub reseed_score: f64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            n_active_leaves: DEFAULT_N_ACTIVE_LEAVES,
            n_branches: DEFAULT_N_BRANCHES,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            decay: DEFAULT_DECAY,
            reseed_score: DEFAULT_RESEED_SCORE,
        }
    }
}

impl SearchParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.n_active_leaves < 1 {
            return invalid("n_active_leaves must be at least 1");
        }
        if self.n_branches < 1 {
            return invalid("n_branches must be at least 1");
        }
        if self.max_iterations < 1 {
            return invalid("max_iterations must be at least 1");
        }
        if !(self.decay > 0.0 && self.decay <= 1.0) {
            return invalid("decay must lie in (0, 1]");
        }
        if !(self.reseed_score > 0.0 && self.reseed_score.is_finite()) {
            return invalid("reseed_score must be positive");
        }
        Ok(())
    }
}

/// Configured search engine. Cheap to share; every [`TreeOfThoughts::session`] is independent.
pub struct TreeOfThoughts {
    oracle: Arc<dyn Oracle>,
    prompts: Arc<PromptSet>,
    params: SearchParams,
    survival: SurvivalThreshold,
    criteria: Criteria,
    scale: GradeScale,
    validation: Vec<ValidationItem>,
    generation: GenerationSettings,
    transform: AnswerTransform,
    max_in_flight: Option<usize>,
    events: Option<mpsc::Sender<SearchEvent>>,
    cancel: CancellationToken,
}

impl TreeOfThoughts {
    pub fn builder(oracle: Arc<dyn Oracle>) -> TreeOfThoughtsBuilder {
        TreeOfThoughtsBuilder::new(oracle)
    }

    /// Builds an engine from a validated [`SearchConfig`]. The config's `[retry]` table
    /// is not applied here: wrap `oracle` in a [`crate::ResilientOracle`] for that.
    pub fn from_config(oracle: Arc<dyn Oracle>, config: &SearchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut builder = Self::builder(oracle)
            .params(config.params())
            .survival(config.survival)
            .criteria(config.criteria.clone())
            .grade_scale(config.grading)
            .generation(config.generation)
            .normalizer(config.answer.clone())
            .prompts(config.prompt_set()?);
        for item in config.validation_items()? {
            builder = builder.validation(item);
        }
        if let Some(limit) = config.max_in_flight {
            builder = builder.max_in_flight(limit);
        }
        builder.build()
    }

    /// Sends progress events to `tx` for every run started afterwards.
    pub fn with_events(mut self, tx: mpsc::Sender<SearchEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Cancelling `token` aborts the in-flight stage of every run of this engine.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    /// Starts a run for `problem`: a fresh tree whose root is the framed problem.
    pub fn session(&self, problem: &str) -> SearchSession {
        let meter =
            MeteredOracle::new(Arc::clone(&self.oracle)).with_max_in_flight(self.max_in_flight);
        let oracle: Arc<dyn Oracle> = Arc::new(meter.clone());
        let pipeline = Pipeline {
            generator: ThoughtGenerator::new(
                Arc::clone(&oracle),
                Arc::clone(&self.prompts),
                self.generation,
                Arc::clone(&self.transform),
            ),
            evaluator: Evaluator::new(
                Arc::clone(&oracle),
                Arc::clone(&self.prompts),
                self.criteria.clone(),
                self.scale,
                self.max_in_flight,
            ),
            validator: AnswerValidator::new(
                oracle,
                Arc::clone(&self.prompts),
                self.validation.clone(),
                self.max_in_flight,
            ),
            meter,
        };
        SearchSession::new(
            problem,
            self.prompts.framing(problem),
            self.params,
            self.survival,
            self.prompts.step_prefix.clone(),
            self.max_in_flight,
            pipeline,
            self.events.clone(),
            self.cancel.clone(),
        )
    }

    /// Searches until an answer is accepted or the iteration budget runs out.
    ///
    /// Exhaustion is a normal outcome ([`SearchStatus::Exhausted`], no answers). Errors are
    /// a stage failure after retries, cancellation, or a tree-store bug.
    pub async fn reason(&self, problem: &str) -> Result<SearchOutcome, SearchError> {
        let mut session = self.session(problem);
        let span = info_span!("search", run_id = %session.run_id());
        async move {
            tracing::info!(problem = %session.problem(), "search started");
            while let StepOutcome::Continue = session.step().await? {}
            let outcome = session.into_outcome();
            tracing::info!(
                status = ?outcome.status,
                iterations = outcome.iterations,
                nodes = outcome.tree.len(),
                calls = outcome.stats.calls,
                "search finished"
            );
            Ok(outcome)
        }
        .instrument(span)
        .await
    }
}

/// Builder for [`TreeOfThoughts`]; defaults match [`SearchConfig::default`].
pub struct TreeOfThoughtsBuilder {
    oracle: Arc<dyn Oracle>,
    prompts: Option<PromptSet>,
    params: SearchParams,
    survival: SurvivalThreshold,
    criteria: Criteria,
    scale: GradeScale,
    validation: Vec<ValidationItem>,
    generation: GenerationSettings,
    transform: Option<AnswerTransform>,
    max_in_flight: Option<usize>,
}

impl TreeOfThoughtsBuilder {
    fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self {
            oracle,
            prompts: None,
            params: SearchParams::default(),
            survival: SurvivalThreshold::default(),
            criteria: Criteria::default(),
            scale: GradeScale::default(),
            validation: Vec::new(),
            generation: GenerationSettings::default(),
            transform: None,
            max_in_flight: None,
        }
    }

    pub fn params(mut self, params: SearchParams) -> Self {
        self.params = params;
        self
    }

    pub fn n_active_leaves(mut self, n: usize) -> Self {
        self.params.n_active_leaves = n;
        self
    }

    pub fn n_branches(mut self, n: usize) -> Self {
        self.params.n_branches = n;
        self
    }

    pub fn max_iterations(mut self, n: usize) -> Self {
        self.params.max_iterations = n;
        self
    }

    pub fn decay(mut self, decay: f64) -> Self {
        self.params.decay = decay;
        self
    }

    pub fn survival(mut self, survival: SurvivalThreshold) -> Self {
        self.survival = survival;
        self
    }

    pub fn criteria(mut self, criteria: Criteria) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn fatal(mut self, statement: impl Into<String>) -> Self {
        self.criteria.fatal.push(statement.into());
        self
    }

    pub fn vital(mut self, statement: impl Into<String>) -> Self {
        self.criteria.vital.push(statement.into());
        self
    }

    pub fn graded(mut self, statement: impl Into<String>) -> Self {
        self.criteria.graded.push(statement.into());
        self
    }

    pub fn grade_scale(mut self, scale: GradeScale) -> Self {
        self.scale = scale;
        self
    }

    pub fn validation(mut self, item: ValidationItem) -> Self {
        self.validation.push(item);
        self
    }

    pub fn generation(mut self, settings: GenerationSettings) -> Self {
        self.generation = settings;
        self
    }

    /// Replaces the default answer normalization with an arbitrary transform.
    pub fn answer_transform(mut self, transform: AnswerTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn normalizer(self, normalizer: AnswerNormalizer) -> Self {
        self.answer_transform(normalizer.into_transform())
    }

    pub fn prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// Caps the oracle calls in flight at once for every run, across nested batches.
    pub fn max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = Some(limit);
        self
    }

    pub fn build(self) -> Result<TreeOfThoughts, ConfigError> {
        self.params.validate()?;
        if self.max_in_flight == Some(0) {
            return Err(ConfigError::Invalid(
                "max_in_flight must be at least 1 when set".to_string(),
            ));
        }
        if !self.scale.is_valid() {
            return Err(ConfigError::Invalid(
                "grading requires min <= neutral <= max".to_string(),
            ));
        }
        if !self.survival.is_valid() {
            return Err(ConfigError::Invalid(
                "survival minimum must be finite and not negative".to_string(),
            ));
        }
        let prompts = match self.prompts {
            Some(prompts) => prompts,
            None => PromptSet::embedded()?,
        };
        Ok(TreeOfThoughts {
            oracle: self.oracle,
            prompts: Arc::new(prompts),
            params: self.params,
            survival: self.survival,
            criteria: self.criteria,
            scale: self.scale,
            validation: self.validation,
            generation: self.generation,
            transform: self
                .transform
                .unwrap_or_else(|| AnswerNormalizer::default().into_transform()),
            max_in_flight: self.max_in_flight,
            events: None,
            cancel: CancellationToken::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{MockOracle, RequestKind};

    #[test]
    fn builder_rejects_bad_params() {
        let oracle: Arc<dyn Oracle> = Arc::new(MockOracle::fixed("no"));
        assert!(TreeOfThoughts::builder(Arc::clone(&oracle))
            .n_branches(0)
            .build()
            .is_err());
        assert!(TreeOfThoughts::builder(Arc::clone(&oracle))
            .decay(0.0)
            .build()
            .is_err());
        assert!(TreeOfThoughts::builder(Arc::clone(&oracle))
            .max_in_flight(0)
            .build()
            .is_err());
        assert!(TreeOfThoughts::builder(oracle)
            .survival(SurvivalThreshold::Minimum(-0.5))
            .build()
            .is_err());
    }

    #[tokio::test]
    async fn each_session_has_its_own_run_id_and_root() {
        let tot = TreeOfThoughts::builder(Arc::new(MockOracle::fixed("no")))
            .build()
            .unwrap();
        let a = tot.session("first problem");
        let b = tot.session("second problem");
        assert_ne!(a.run_id(), b.run_id());
        assert_eq!(a.tree().len(), 1);
        assert!(a.tree().root().unwrap().content.starts_with("first problem\n"));
        assert_eq!(a.iterations(), 0);
        assert!(a.status().is_none());
    }

    #[tokio::test]
    async fn from_config_applies_prompts_and_normalizer() {
        let config = SearchConfig::from_toml_str(
            r#"
            max_iterations = 1
            [answer]
            trim_chars = "!"
            lowercase = true
            [prompts]
            initial = "Q: $problem\n"
            "#,
        )
        .unwrap();
        let oracle = MockOracle::from_fn(|req| {
            Ok(match req.kind {
                RequestKind::StopCheck => "yes".into(),
                _ => "PARIS!".into(),
            })
        });
        let tot = TreeOfThoughts::from_config(Arc::new(oracle.clone()), &config).unwrap();
        let outcome = tot.reason("capital of France?").await.unwrap();
        assert_eq!(outcome.answers, vec!["paris".to_string()]);
        assert_eq!(outcome.tree.root().unwrap().content, "Q: capital of France?\n");
        assert!(oracle.calls()[0].prompt.starts_with("Q: capital of France?\n"));
        assert_eq!(outcome.stats.calls, 2);
    }
}
