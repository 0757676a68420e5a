//! Final-answer validation.
//!
//! An [`AnswerValidator`] holds a list of heterogeneous [`ValidationItem`]s: either a
//! yes/no question posed to the oracle or a predicate run on the candidate text.
//! All items are checked concurrently and the candidate is accepted only when every
//! item's actual result equals its expected result. An empty list accepts anything.

use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::batch::fan_out;
use crate::error::{ConfigError, OracleError, TemplateError};
use crate::generate::CLASSIFY_MAX_TOKENS;
use crate::interpret::parse_yes_no;
use crate::oracle::{CompletionRequest, Oracle, RequestKind};
use crate::path::ReasoningPath;
use crate::prompts::PromptSet;
use crate::template::{PromptTemplate, TemplateContext};

/// Check run directly against the candidate text.
pub type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// One validation check.
#[derive(Clone)]
pub enum ValidationItem {
    /// Yes/no question for the oracle; `$candidate` in the question is replaced
    /// with the answer under test.
    Prompted {
        question: PromptTemplate,
        expected: bool,
    },
    Programmatic {
        name: String,
        predicate: Predicate,
        expected: bool,
    },
}

impl ValidationItem {
    pub fn prompted(question: &str, expected: bool) -> Result<Self, TemplateError> {
        Ok(ValidationItem::Prompted {
            question: PromptTemplate::parse(question)?,
            expected,
        })
    }

    pub fn programmatic<F>(name: impl Into<String>, predicate: F, expected: bool) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        ValidationItem::Programmatic {
            name: name.into(),
            predicate: Arc::new(predicate),
            expected,
        }
    }

    /// Short label used in rejection reports.
    pub fn label(&self) -> &str {
        match self {
            ValidationItem::Prompted { question, .. } => question.source(),
            ValidationItem::Programmatic { name, .. } => name,
        }
    }

    pub fn expected(&self) -> bool {
        match self {
            ValidationItem::Prompted { expected, .. }
            | ValidationItem::Programmatic { expected, .. } => *expected,
        }
    }
}

impl std::fmt::Debug for ValidationItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationItem::Prompted { question, expected } => f
                .debug_struct("Prompted")
                .field("question", &question.source())
                .field("expected", expected)
                .finish(),
            ValidationItem::Programmatic { name, expected, .. } => f
                .debug_struct("Programmatic")
                .field("name", name)
                .field("expected", expected)
                .finish(),
        }
    }
}

/// Predicates a config file can name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinPredicate {
    /// Non-empty and ASCII digits only.
    IsDigit,
    /// Parses as a finite number.
    IsNumber,
    NonEmpty,
    /// At most N characters.
    MaxChars(usize),
    /// Regex search over the candidate.
    Matches(String),
}

impl BuiltinPredicate {
    pub fn name(&self) -> String {
        match self {
            BuiltinPredicate::IsDigit => "is_digit".to_string(),
            BuiltinPredicate::IsNumber => "is_number".to_string(),
            BuiltinPredicate::NonEmpty => "non_empty".to_string(),
            BuiltinPredicate::MaxChars(n) => format!("max_chars({n})"),
            BuiltinPredicate::Matches(p) => format!("matches({p:?})"),
        }
    }

    pub fn into_predicate(self) -> Result<Predicate, ConfigError> {
        Ok(match self {
            BuiltinPredicate::IsDigit => {
                Arc::new(|s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
            }
            BuiltinPredicate::IsNumber => Arc::new(|s: &str| {
                s.trim().parse::<f64>().map(f64::is_finite).unwrap_or(false)
            }),
            BuiltinPredicate::NonEmpty => Arc::new(|s: &str| !s.trim().is_empty()),
            BuiltinPredicate::MaxChars(n) => Arc::new(move |s: &str| s.chars().count() <= n),
            BuiltinPredicate::Matches(pattern) => {
                let re = Regex::new(&pattern).map_err(|e| ConfigError::Pattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                Arc::new(move |s: &str| re.is_match(s))
            }
        })
    }
}

fn expect_true() -> bool {
    true
}

/// `[[validation]]` entry of a search config: a `question` or a `predicate`,
/// with `expected` defaulting to true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValidationSpec {
    Prompted {
        question: String,
        #[serde(default = "expect_true")]
        expected: bool,
    },
    Programmatic {
        predicate: BuiltinPredicate,
        #[serde(default = "expect_true")]
        expected: bool,
    },
}

impl ValidationSpec {
    pub fn into_item(self) -> Result<ValidationItem, ConfigError> {
        match self {
            ValidationSpec::Prompted { question, expected } => {
                Ok(ValidationItem::prompted(&question, expected)?)
            }
            ValidationSpec::Programmatic {
                predicate,
                expected,
            } => Ok(ValidationItem::Programmatic {
                name: predicate.name(),
                predicate: predicate.into_predicate()?,
                expected,
            }),
        }
    }
}

/// Outcome of validating one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub accepted: bool,
    /// Labels of the items whose result differed from the expected one.
    pub failures: Vec<String>,
}

/// Accepts or rejects final-answer candidates.
#[derive(Clone)]
pub struct AnswerValidator {
    oracle: Arc<dyn Oracle>,
    prompts: Arc<PromptSet>,
    items: Arc<[ValidationItem]>,
    max_in_flight: Option<usize>,
}

impl std::fmt::Debug for AnswerValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerValidator")
            .field("items", &self.items)
            .field("max_in_flight", &self.max_in_flight)
            .finish()
    }
}

impl AnswerValidator {
    pub fn new(
        oracle: Arc<dyn Oracle>,
        prompts: Arc<PromptSet>,
        items: Vec<ValidationItem>,
        max_in_flight: Option<usize>,
    ) -> Self {
        Self {
            oracle,
            prompts,
            items: items.into(),
            max_in_flight,
        }
    }

    pub fn items(&self) -> &[ValidationItem] {
        &self.items
    }

    /// Checks `candidate`, extracted from `path`, against every item.
    pub async fn validate_result(
        &self,
        path: &ReasoningPath,
        candidate: &str,
    ) -> Result<Verdict, OracleError> {
        let futures = self
            .items
            .iter()
            .map(|item| self.check(item, path, candidate))
            .collect();
        let actual = fan_out(futures, self.max_in_flight).await?;

        let failures: Vec<String> = self
            .items
            .iter()
            .zip(actual)
            .filter(|(item, actual)| *actual != Some(item.expected()))
            .map(|(item, _)| item.label().to_string())
            .collect();
        let verdict = Verdict {
            accepted: failures.is_empty(),
            failures,
        };
        tracing::debug!(%candidate, accepted = verdict.accepted, failures = ?verdict.failures, "answer validated");
        Ok(verdict)
    }

    /// Actual boolean for one item; `None` for a malformed oracle reply, which never
    /// matches the expected value.
    async fn check(
        &self,
        item: &ValidationItem,
        path: &ReasoningPath,
        candidate: &str,
    ) -> Result<Option<bool>, OracleError> {
        match item {
            ValidationItem::Programmatic { predicate, .. } => Ok(Some(predicate(candidate))),
            ValidationItem::Prompted { question, .. } => {
                let mut ctx = TemplateContext {
                    problem: Some(path.problem()),
                    path: Some(path.text()),
                    candidate: Some(candidate),
                    ..Default::default()
                };
                let question = question.render(&ctx);
                ctx.question = Some(&question);
                let prompt = self.prompts.validation.render(&ctx);
                let request = CompletionRequest::new(RequestKind::Validation, prompt)
                    .with_stop(["\n"])
                    .with_max_tokens(CLASSIFY_MAX_TOKENS)
                    .with_temperature(0.0);
                let reply = self.oracle.complete(&request).await?;
                let parsed = parse_yes_no(&reply.text);
                if parsed.is_none() {
                    tracing::warn!(%question, reply = %reply.text, "malformed validation reply, rejecting");
                }
                Ok(parsed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::MockOracle;

    fn path() -> ReasoningPath {
        ReasoningPath::root(Arc::from("make 24"), "make 24\n").extend("4 * 6 = 24", "- ")
    }

    fn validator(oracle: MockOracle, items: Vec<ValidationItem>) -> AnswerValidator {
        AnswerValidator::new(
            Arc::new(oracle),
            Arc::new(PromptSet::embedded().unwrap()),
            items,
            None,
        )
    }

    fn is_digit() -> ValidationItem {
        ValidationSpec::Programmatic {
            predicate: BuiltinPredicate::IsDigit,
            expected: true,
        }
        .into_item()
        .unwrap()
    }

    #[tokio::test]
    async fn empty_validator_accepts_anything() {
        let oracle = MockOracle::unavailable("never called");
        let v = validator(oracle.clone(), Vec::new());
        for text in ["", "24", "not a number", "\n"] {
            let verdict = v.validate_result(&path(), text).await.unwrap();
            assert!(verdict.accepted);
            assert!(verdict.failures.is_empty());
        }
        assert_eq!(oracle.call_count(), 0);
    }

    #[tokio::test]
    async fn digit_predicate() {
        let v = validator(MockOracle::fixed("no"), vec![is_digit()]);
        assert!(v.validate_result(&path(), "24").await.unwrap().accepted);
        let verdict = v.validate_result(&path(), "twenty-four").await.unwrap();
        assert!(!verdict.accepted);
        assert_eq!(verdict.failures, vec!["is_digit".to_string()]);
    }

    #[tokio::test]
    async fn prompted_question_interpolates_candidate() {
        let oracle = MockOracle::fixed("Yes");
        let item = ValidationItem::prompted("Is $candidate equal to 24?", true).unwrap();
        let v = validator(oracle.clone(), vec![item]);
        assert!(v.validate_result(&path(), "24").await.unwrap().accepted);
        let calls = oracle.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].kind, RequestKind::Validation);
        assert!(calls[0].prompt.contains("Is 24 equal to 24? Answer yes or no."));
        assert!(calls[0].prompt.starts_with("make 24\n- 4 * 6 = 24\n"));
    }

    #[tokio::test]
    async fn expected_false_inverts_the_check() {
        let item = ValidationItem::prompted("Does $candidate use a letter?", false).unwrap();
        let v = validator(MockOracle::fixed("no"), vec![item.clone()]);
        assert!(v.validate_result(&path(), "24").await.unwrap().accepted);
        let v = validator(MockOracle::fixed("yes"), vec![item]);
        assert!(!v.validate_result(&path(), "24").await.unwrap().accepted);
    }

    #[tokio::test]
    async fn malformed_reply_rejects_regardless_of_expectation() {
        for expected in [true, false] {
            let item = ValidationItem::prompted("ok?", expected).unwrap();
            let v = validator(MockOracle::fixed("unsure"), vec![item]);
            assert!(!v.validate_result(&path(), "24").await.unwrap().accepted);
        }
    }

    #[tokio::test]
    async fn every_item_must_agree() {
        let items = vec![
            is_digit(),
            ValidationItem::programmatic("short", |s: &str| s.len() < 2, true),
        ];
        let v = validator(MockOracle::fixed("yes"), items);
        let verdict = v.validate_result(&path(), "24").await.unwrap();
        assert!(!verdict.accepted);
        assert_eq!(verdict.failures, vec!["short".to_string()]);
    }

    #[tokio::test]
    async fn oracle_failure_propagates() {
        let item = ValidationItem::prompted("ok?", true).unwrap();
        let v = validator(MockOracle::unavailable("down"), vec![item]);
        assert!(v.validate_result(&path(), "24").await.is_err());
    }

    #[test]
    fn builtin_predicates() {
        let num = BuiltinPredicate::IsNumber.into_predicate().unwrap();
        assert!(num("3.5"));
        assert!(!num("NaN"));
        assert!(!num("x"));
        let short = BuiltinPredicate::MaxChars(3).into_predicate().unwrap();
        assert!(short("abc"));
        assert!(!short("abcd"));
        let non_empty = BuiltinPredicate::NonEmpty.into_predicate().unwrap();
        assert!(!non_empty("  "));
        let re = BuiltinPredicate::Matches("^[A-Z][a-z]+$".into())
            .into_predicate()
            .unwrap();
        assert!(re("Paris"));
        assert!(!re("paris"));
    }

    #[test]
    fn bad_regex_is_a_config_error() {
        let err = BuiltinPredicate::Matches("(".into())
            .into_predicate()
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::Pattern { .. }));
    }

    #[test]
    fn specs_parse_from_toml() {
        #[derive(Deserialize)]
        struct Wrap {
            validation: Vec<ValidationSpec>,
        }
        let w: Wrap = toml::from_str(
            r#"
            [[validation]]
            predicate = "is_digit"

            [[validation]]
            predicate = { max_chars = 4 }
            expected = true

            [[validation]]
            question = "Is $candidate prime?"
            expected = false
            "#,
        )
        .unwrap();
        assert_eq!(
            w.validation,
            vec![
                ValidationSpec::Programmatic {
                    predicate: BuiltinPredicate::IsDigit,
                    expected: true
                },
                ValidationSpec::Programmatic {
                    predicate: BuiltinPredicate::MaxChars(4),
                    expected: true
                },
                ValidationSpec::Prompted {
                    question: "Is $candidate prime?".into(),
                    expected: false
                },
            ]
        );
    }

    #[test]
    fn bad_question_template_is_a_config_error() {
        let err = ValidationSpec::Prompted {
            question: "Is $answer right?".into(),
            expected: true,
        }
        .into_item()
        .unwrap_err();
        assert!(matches!(err, ConfigError::Template(_)));
    }
}
