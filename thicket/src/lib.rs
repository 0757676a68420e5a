//! # Thicket
//!
//! Best-first tree-of-thoughts search driven by a text-completion oracle. Thicket grows
//! a tree of natural-language reasoning steps ("thoughts"), asks the oracle to propose
//! and judge candidate steps, and stops once a final answer passes validation.
//!
//! ## How a search runs
//!
//! Each iteration decays the scores of the viable leaves, picks the best
//! `n_active_leaves` of them (falling back to the root when none are left), and asks
//! the oracle whether each one already admits an answer. Leaves that do get one
//! final-answer extraction checked by the [`AnswerValidator`]; the others get
//! `n_branches` next-thought proposals scored by the [`Evaluator`] (fatal/vital gates,
//! then graded criteria). Every candidate is committed to the [`ThoughtTree`]; survivors
//! join the [`LeafFrontier`].
//!
//! All oracle calls of one stage run concurrently on the caller's task and are joined
//! before the next stage starts. A failed stage (after the [`ResilientOracle`] gave up)
//! or a cancelled one commits nothing.
//!
//! ## Main modules
//!
//! - [`search`]: [`TreeOfThoughts`], [`SearchSession`], [`SearchOutcome`].
//! - [`tree`]: [`ThoughtTree`] arena store, [`NodeId`], [`NodeStatus`].
//! - [`frontier`]: [`LeafFrontier`], the viable-leaf index with decay.
//! - [`generate`], [`evaluate`], [`validate`]: the three oracle-facing stages.
//! - [`oracle`]: [`Oracle`] trait, [`MockOracle`], [`OpenAiOracle`], [`ResilientOracle`].
//! - [`prompts`], [`template`]: prompt fragments and `$name` templates.
//! - [`config`]: [`SearchConfig`] loaded from TOML.
//! - [`event`]: [`SearchEvent`] progress stream.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use thicket::{MockOracle, RequestKind, TreeOfThoughts};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let oracle = MockOracle::from_fn(|req| {
//!     Ok(match req.kind {
//!         RequestKind::StopCheck => "yes".to_string(),
//!         RequestKind::FinalAnswer => " 4.".to_string(),
//!         _ => "no".to_string(),
//!     })
//! });
//! let tot = TreeOfThoughts::builder(Arc::new(oracle)).build()?;
//! let outcome = tot.reason("What is 2 + 2?").await?;
//! assert_eq!(outcome.answers, vec!["4".to_string()]);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod evaluate;
pub mod event;
pub mod frontier;
pub mod generate;
pub mod interpret;
pub mod oracle;
pub mod path;
pub mod prompts;
pub mod search;
pub mod template;
pub mod tree;
pub mod validate;

mod batch;

pub use config::{RetrySettings, SearchConfig};
pub use error::{ConfigError, OracleError, SearchError, Stage, TemplateError, TreeError};
pub use evaluate::{Criteria, CriterionKind, Evaluation, Evaluator, SurvivalThreshold, Violation};
pub use event::SearchEvent;
pub use frontier::LeafFrontier;
pub use generate::{AnswerNormalizer, AnswerTransform, GenerationSettings, ThoughtGenerator};
pub use interpret::{parse_yes_no, GradeScale};
pub use oracle::{
    Completion, CompletionRequest, MeteredOracle, MockOracle, OpenAiOracle, Oracle, OracleStats,
    RequestKind, ResilientOracle, RetryPolicy, TokenUsage,
};
pub use path::ReasoningPath;
pub use prompts::{PromptOverrides, PromptSet};
pub use search::{
    SearchOutcome, SearchParams, SearchSession, SearchStatus, StepOutcome, TreeOfThoughts,
    TreeOfThoughtsBuilder,
};
pub use template::{Placeholder, PromptTemplate, TemplateContext};
pub use tree::{Node, NodeId, NodeStatus, ThoughtTree};
pub use validate::{AnswerValidator, BuiltinPredicate, Predicate, ValidationItem, ValidationSpec, Verdict};

pub use tokio_util::sync::CancellationToken;
