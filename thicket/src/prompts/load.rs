//! Embedded default prompt YAML and the override record shared with search configs.

use serde::Deserialize;

use super::PromptSet;
use crate::error::ConfigError;
use crate::template::PromptTemplate;

/// Embedded default YAML (canonical source: `thicket/prompts/default.yaml`).
const EMBED_DEFAULT: &str = include_str!("../../prompts/default.yaml");

/// Prompt fragments, each optional. Used both to read the embedded defaults and as
/// the `[prompts]` table of a search config.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PromptOverrides {
    pub initial: Option<String>,
    pub step_prefix: Option<String>,
    pub next_thought: Option<String>,
    pub stop_check: Option<String>,
    pub final_answer: Option<String>,
    pub criterion: Option<String>,
    pub graded: Option<String>,
    pub validation: Option<String>,
}

impl PromptOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Builds a full [`PromptSet`]; every fragment must be present.
    pub(super) fn into_complete(self) -> Result<PromptSet, ConfigError> {
        fn required(v: Option<String>, name: &str) -> Result<PromptTemplate, ConfigError> {
            let src = v.ok_or_else(|| ConfigError::Invalid(format!("prompt `{name}` is missing")))?;
            Ok(PromptTemplate::parse(src)?)
        }
        Ok(PromptSet {
            initial: required(self.initial, "initial")?,
            step_prefix: self.step_prefix.unwrap_or_default(),
            next_thought: required(self.next_thought, "next_thought")?,
            stop_check: required(self.stop_check, "stop_check")?,
            final_answer: required(self.final_answer, "final_answer")?,
            criterion: required(self.criterion, "criterion")?,
            graded: required(self.graded, "graded")?,
            validation: required(self.validation, "validation")?,
        })
    }
}

pub(super) fn embedded_overrides() -> Result<PromptOverrides, ConfigError> {
    serde_yaml::from_str(EMBED_DEFAULT)
        .map_err(|e| ConfigError::Invalid(format!("embedded prompts: {e}")))
}
