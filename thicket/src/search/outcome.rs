//! Terminal and per-step results of a search.

use serde::Serialize;
use uuid::Uuid;

use crate::oracle::OracleStats;
use crate::tree::ThoughtTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    /// At least one answer was accepted.
    Answered,
    /// The iteration budget ran out without an accepted answer.
    Exhausted,
}

/// Result of a single [`super::SearchSession::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Iteration committed; the search goes on.
    Continue,
    /// Answers accepted in this iteration, in leaf-selection order.
    Answered(Vec<String>),
    Exhausted,
}

/// Everything a finished search produced.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub run_id: Uuid,
    pub status: SearchStatus,
    /// Accepted answers; empty when exhausted.
    pub answers: Vec<String>,
    /// Completed iterations.
    pub iterations: usize,
    pub tree: ThoughtTree,
    pub stats: OracleStats,
}

impl SearchOutcome {
    pub fn is_answered(&self) -> bool {
        self.status == SearchStatus::Answered
    }
}
