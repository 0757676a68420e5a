//! Search configuration loaded from TOML.
//!
//! ```toml
//! n_active_leaves = 3
//! n_branches = 3
//! max_iterations = 10
//! decay = 0.99
//! survival = "strictly_positive"
//!
//! [criteria]
//! fatal = ["The last step contains an arithmetic error."]
//! vital = ["The last step uses only the given numbers."]
//! graded = ["The last step makes progress towards 24."]
//!
//! [[validation]]
//! predicate = "is_digit"
//!
//! [prompts]
//! final_answer = "$path\nThe resulting number is: "
//! ```
//!
//! Every table is optional; missing keys take the defaults below.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::evaluate::{Criteria, SurvivalThreshold};
use crate::frontier::{DEFAULT_DECAY, DEFAULT_RESEED_SCORE};
use crate::generate::{AnswerNormalizer, GenerationSettings};
use crate::interpret::GradeScale;
use crate::oracle::RetryPolicy;
use crate::prompts::{PromptOverrides, PromptSet};
use crate::search::SearchParams;
use crate::validate::{ValidationItem, ValidationSpec};

pub const DEFAULT_N_ACTIVE_LEAVES: usize = 3;
pub const DEFAULT_N_BRANCHES: usize = 3;
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Leaves expanded per iteration.
    pub n_active_leaves: usize,
    /// Candidate thoughts generated per expanded leaf.
    pub n_branches: usize,
    pub max_iterations: usize,
    /// Per-iteration score decay, in (0, 1].
    pub decay: f64,
    /// Score given to the root when the viable-leaf index runs empty.
    pub reseed_score: f64,
    /// Cap on concurrently polled oracle calls per stage; unbounded when absent.
    pub max_in_flight: Option<usize>,
    pub survival: SurvivalThreshold,
    pub criteria: Criteria,
    pub grading: GradeScale,
    pub answer: AnswerNormalizer,
    pub validation: Vec<ValidationSpec>,
    pub generation: GenerationSettings,
    pub retry: RetrySettings,
    pub prompts: PromptOverrides,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            n_active_leaves: DEFAULT_N_ACTIVE_LEAVES,
            n_branches: DEFAULT_N_BRANCHES,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            decay: DEFAULT_DECAY,
            reseed_score: DEFAULT_RESEED_SCORE,
            max_in_flight: None,
            survival: SurvivalThreshold::default(),
            criteria: Criteria::default(),
            grading: GradeScale::default(),
            answer: AnswerNormalizer::default(),
            validation: Vec::new(),
            generation: GenerationSettings::default(),
            retry: RetrySettings::default(),
            prompts: PromptOverrides::default(),
        }
    }
}

/// `[retry]` table; see [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Per-attempt deadline; `0` disables it.
    pub timeout_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            timeout_ms: 60_000,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        let timeout = (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms));
        RetryPolicy::exponential(
            self.max_attempts,
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
        .with_timeout(timeout)
    }
}

impl SearchConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: SearchConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Search shape taken from the top-level keys.
    pub fn params(&self) -> SearchParams {
        SearchParams {
            n_active_leaves: self.n_active_leaves,
            n_branches: self.n_branches,
            max_iterations: self.max_iterations,
            decay: self.decay,
            reseed_score: self.reseed_score,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        self.params().validate()?;
        if self.max_in_flight == Some(0) {
            return invalid("max_in_flight must be at least 1 when set");
        }
        if !self.survival.is_valid() {
            return invalid("survival minimum must be finite and not negative");
        }
        if !self.grading.is_valid() {
            return invalid("grading requires min <= neutral <= max");
        }
        if self.retry.max_attempts < 1 {
            return invalid("retry.max_attempts must be at least 1");
        }
        self.prompt_set()?;
        self.validation_items()?;
        Ok(())
    }

    /// Embedded prompts with this config's `[prompts]` overrides applied.
    pub fn prompt_set(&self) -> Result<PromptSet, ConfigError> {
        Ok(PromptSet::embedded()?.with_overrides(&self.prompts)?)
    }

    /// Compiles the `[[validation]]` entries.
    pub fn validation_items(&self) -> Result<Vec<ValidationItem>, ConfigError> {
        self.validation
            .iter()
            .cloned()
            .map(ValidationSpec::into_item)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let c = SearchConfig::from_toml_str("").unwrap();
        assert_eq!(c, SearchConfig::default());
        assert_eq!(c.n_active_leaves, 3);
        assert_eq!(c.decay, 0.99);
        assert_eq!(c.survival, SurvivalThreshold::StrictlyPositive);
    }

    #[test]
    fn full_document() {
        let c = SearchConfig::from_toml_str(
            r#"
            n_active_leaves = 2
            n_branches = 4
            max_iterations = 5
            decay = 0.9
            max_in_flight = 8
            survival = "non_negative"

            [criteria]
            fatal = ["The last step is wrong."]
            graded = ["The last step helps."]

            [grading]
            min = 0
            max = 10
            neutral = 5

            [answer]
            trim_chars = ".!"
            lowercase = true

            [[validation]]
            predicate = "is_digit"

            [[validation]]
            question = "Is $candidate the count of n's?"

            [generation]
            thought_temperature = 0.5

            [retry]
            max_attempts = 5
            timeout_ms = 0

            [prompts]
            final_answer = "$path\nThe total number is: "
            "#,
        )
        .unwrap();
        assert_eq!(c.n_branches, 4);
        assert_eq!(c.max_in_flight, Some(8));
        assert_eq!(c.criteria.fatal.len(), 1);
        assert!(c.criteria.vital.is_empty());
        assert_eq!(c.grading.max, 10);
        assert!(c.answer.lowercase);
        assert_eq!(c.validation_items().unwrap().len(), 2);
        assert_eq!(c.generation.thought_temperature, 0.5);
        assert_eq!(c.generation.thought_max_tokens, 96);
        let policy = c.retry.policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.timeout, None);
        assert_eq!(
            c.prompt_set().unwrap().final_answer.source(),
            "$path\nThe total number is: "
        );
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for doc in [
            "n_active_leaves = 0",
            "n_branches = 0",
            "max_iterations = 0",
            "decay = 0.0",
            "decay = 1.5",
            "reseed_score = 0.0",
            "max_in_flight = 0",
            "survival = { minimum = -1.0 }",
            "[grading]\nmin = 5\nneutral = 1",
            "[retry]\nmax_attempts = 0",
        ] {
            let err = SearchConfig::from_toml_str(doc).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{doc}: {err}");
        }
    }

    #[test]
    fn decay_of_one_is_allowed() {
        assert!(SearchConfig::from_toml_str("decay = 1.0").is_ok());
    }

    #[test]
    fn unknown_keys_and_bad_templates_are_rejected() {
        assert!(matches!(
            SearchConfig::from_toml_str("n_branch = 2"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            SearchConfig::from_toml_str("[prompts]\nstop_check = \"$answer\""),
            Err(ConfigError::Template(_))
        ));
        assert!(matches!(
            SearchConfig::from_toml_str("[[validation]]\npredicate = { matches = \"(\" }"),
            Err(ConfigError::Pattern { .. })
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.toml");
        std::fs::write(&path, "max_iterations = 2\n").unwrap();
        assert_eq!(SearchConfig::load(&path).unwrap().max_iterations, 2);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            SearchConfig::load(&missing),
            Err(ConfigError::Read { .. })
        ));
    }
}
