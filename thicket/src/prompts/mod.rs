//! Prompt fragments consumed by the generator, evaluator and validator.
//!
//! **Canonical source**: default text lives in `thicket/prompts/default.yaml`, embedded
//! at compile time. A search config's `[prompts]` table overrides single fragments.
//! See [`PromptSet::embedded`] and [`PromptSet::with_overrides`].

mod load;

pub use load::PromptOverrides;

use crate::error::{ConfigError, TemplateError};
use crate::template::{PromptTemplate, TemplateContext};

/// Parsed prompt fragments for one search.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSet {
    /// Root framing, rendered from `$problem`.
    pub initial: PromptTemplate,
    /// Text put before every step in a rendered path.
    pub step_prefix: String,
    /// Asks for the next step; `step_prefix` is appended after rendering.
    pub next_thought: PromptTemplate,
    /// Yes/no: can the path already be answered?
    pub stop_check: PromptTemplate,
    /// Completion prefix for final-answer extraction.
    pub final_answer: PromptTemplate,
    /// Yes/no over a fatal or vital `$statement`.
    pub criterion: PromptTemplate,
    /// Integer grade over a graded `$statement`.
    pub graded: PromptTemplate,
    /// Wrapper around each prompted validation `$question`.
    pub validation: PromptTemplate,
}

impl PromptSet {
    /// Default prompts parsed from the embedded YAML.
    pub fn embedded() -> Result<Self, ConfigError> {
        load::embedded_overrides()?.into_complete()
    }

    /// Replaces every fragment set in `overrides`.
    pub fn with_overrides(mut self, overrides: &PromptOverrides) -> Result<Self, TemplateError> {
        let parse = |v: &Option<String>, slot: &mut PromptTemplate| -> Result<(), TemplateError> {
            if let Some(src) = v {
                *slot = PromptTemplate::parse(src.as_str())?;
            }
            Ok(())
        };
        parse(&overrides.initial, &mut self.initial)?;
        parse(&overrides.next_thought, &mut self.next_thought)?;
        parse(&overrides.stop_check, &mut self.stop_check)?;
        parse(&overrides.final_answer, &mut self.final_answer)?;
        parse(&overrides.criterion, &mut self.criterion)?;
        parse(&overrides.graded, &mut self.graded)?;
        parse(&overrides.validation, &mut self.validation)?;
        if let Some(ref prefix) = overrides.step_prefix {
            self.step_prefix = prefix.clone();
        }
        Ok(self)
    }

    /// Root node content for `problem`.
    pub fn framing(&self, problem: &str) -> String {
        self.initial.render(&TemplateContext {
            problem: Some(problem),
            ..Default::default()
        })
    }
}
