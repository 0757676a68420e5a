//! One search run, advanced an iteration at a time.
//!
//! An iteration is: decay, reseed, select, stop-check batch, generation batch,
//! assessment batch (evaluate thoughts, validate answers), commit. Each batch runs
//! to its barrier before the next starts, and only the commit touches the tree and
//! the frontier. A failed or cancelled batch puts the selected leaves back and
//! commits nothing.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::batch::fan_out;
use crate::error::{OracleError, SearchError, Stage};
use crate::evaluate::{Evaluation, Evaluator, SurvivalThreshold};
use crate::event::{emit, SearchEvent};
use crate::frontier::LeafFrontier;
use crate::generate::ThoughtGenerator;
use crate::oracle::{MeteredOracle, OracleStats};
use crate::path::ReasoningPath;
use crate::tree::{NodeId, ThoughtTree};
use crate::validate::{AnswerValidator, Verdict};

use super::outcome::{SearchOutcome, SearchStatus, StepOutcome};
use super::SearchParams;

/// What one generation request produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobKind {
    Thought,
    Answer,
}

#[derive(Debug, Clone, Copy)]
struct Job {
    /// Index into the selected leaves.
    leaf: usize,
    kind: JobKind,
}

enum Assessment {
    Scored(Evaluation),
    Validated(Verdict),
}

/// Collaborators of one run, all sharing the run's metered oracle.
pub(super) struct Pipeline {
    pub(super) generator: ThoughtGenerator,
    pub(super) evaluator: Evaluator,
    pub(super) validator: AnswerValidator,
    pub(super) meter: MeteredOracle,
}

/// Search state for one problem: tree, viable-leaf index and iteration counter.
///
/// Created by [`super::TreeOfThoughts::session`]. Call [`SearchSession::step`] until it
/// returns something other than [`StepOutcome::Continue`].
pub struct SearchSession {
    run_id: Uuid,
    problem: Arc<str>,
    tree: ThoughtTree,
    frontier: LeafFrontier,
    iterations: usize,
    answers: Vec<String>,
    status: Option<SearchStatus>,
    params: SearchParams,
    survival: SurvivalThreshold,
    step_prefix: String,
    max_in_flight: Option<usize>,
    pipeline: Pipeline,
    events: Option<mpsc::Sender<SearchEvent>>,
    cancel: CancellationToken,
}

impl SearchSession {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        problem: &str,
        framing: String,
        params: SearchParams,
        survival: SurvivalThreshold,
        step_prefix: String,
        max_in_flight: Option<usize>,
        pipeline: Pipeline,
        events: Option<mpsc::Sender<SearchEvent>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            problem: Arc::from(problem),
            tree: ThoughtTree::with_root(framing),
            frontier: LeafFrontier::new(params.decay, params.reseed_score),
            iterations: 0,
            answers: Vec::new(),
            status: None,
            params,
            survival,
            step_prefix,
            max_in_flight,
            pipeline,
            events,
            cancel,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn problem(&self) -> &str {
        &self.problem
    }

    pub fn tree(&self) -> &ThoughtTree {
        &self.tree
    }

    pub fn frontier(&self) -> &LeafFrontier {
        &self.frontier
    }

    /// Completed iterations.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    /// `None` while the search is still running.
    pub fn status(&self) -> Option<SearchStatus> {
        self.status
    }

    pub fn stats(&self) -> OracleStats {
        self.pipeline.meter.stats()
    }

    pub fn into_outcome(self) -> SearchOutcome {
        let stats = self.stats();
        SearchOutcome {
            run_id: self.run_id,
            status: self.status.unwrap_or(SearchStatus::Exhausted),
            answers: self.answers,
            iterations: self.iterations,
            tree: self.tree,
            stats,
        }
    }

    /// Runs one iteration. After a terminal outcome, further calls repeat it without
    /// touching the oracle.
    pub async fn step(&mut self) -> Result<StepOutcome, SearchError> {
        match self.status {
            Some(SearchStatus::Answered) => return Ok(StepOutcome::Answered(self.answers.clone())),
            Some(SearchStatus::Exhausted) => return Ok(StepOutcome::Exhausted),
            None => {}
        }
        if self.iterations >= self.params.max_iterations {
            return Ok(self.finish(SearchStatus::Exhausted).await);
        }

        let iteration = self.iterations + 1;
        tracing::info!(iteration, frontier = self.frontier.len(), "iteration started");
        emit(&self.events, &self.cancel, SearchEvent::IterationStarted { iteration }).await;

        self.frontier.decay();
        if self.frontier.reseed_if_empty(self.tree.root_id()) {
            tracing::debug!("viable-leaf index empty, reseeded with root");
        }
        let selected = self.frontier.select_top_n(self.params.n_active_leaves);
        for &(leaf, score) in &selected {
            emit(&self.events, &self.cancel, SearchEvent::LeafSelected { leaf, score }).await;
        }

        let paths = match self.paths(&selected) {
            Ok(paths) => paths,
            Err(e) => {
                self.frontier.restore(selected);
                return Err(e.into());
            }
        };

        match self.expand(iteration, &selected, &paths).await {
            Ok((jobs, texts, assessments)) => {
                self.commit(&selected, jobs, texts, assessments).await?;
            }
            Err((stage, err)) => {
                tracing::warn!(iteration, %stage, error = %err, "iteration aborted");
                self.frontier.restore(selected);
                emit(
                    &self.events,
                    &self.cancel,
                    SearchEvent::IterationAborted {
                        iteration,
                        stage,
                        reason: err.to_string(),
                    },
                )
                .await;
                return Err(err);
            }
        }

        self.iterations = iteration;
        if !self.answers.is_empty() {
            tracing::info!(iteration, answers = ?self.answers, "answer accepted");
            return Ok(self.finish(SearchStatus::Answered).await);
        }
        if self.iterations >= self.params.max_iterations {
            tracing::info!(iterations = self.iterations, "no answer within iteration budget");
            return Ok(self.finish(SearchStatus::Exhausted).await);
        }
        Ok(StepOutcome::Continue)
    }

    async fn finish(&mut self, status: SearchStatus) -> StepOutcome {
        self.status = Some(status);
        emit(
            &self.events,
            &self.cancel,
            SearchEvent::Finished {
                answered: status == SearchStatus::Answered,
                iterations: self.iterations,
            },
        )
        .await;
        match status {
            SearchStatus::Answered => StepOutcome::Answered(self.answers.clone()),
            SearchStatus::Exhausted => StepOutcome::Exhausted,
        }
    }

    fn paths(&self, selected: &[(NodeId, f64)]) -> Result<Vec<ReasoningPath>, crate::error::TreeError> {
        let framing = self
            .tree
            .root()
            .map(|root| root.content.as_str())
            .unwrap_or_default();
        selected
            .iter()
            .map(|&(leaf, _)| {
                let steps = self.tree.path_to_root(leaf)?;
                Ok(ReasoningPath::from_steps(
                    Arc::clone(&self.problem),
                    framing,
                    steps,
                    &self.step_prefix,
                ))
            })
            .collect()
    }

    /// The three oracle batches. Reads state only.
    #[allow(clippy::type_complexity)]
    async fn expand(
        &self,
        iteration: usize,
        selected: &[(NodeId, f64)],
        paths: &[ReasoningPath],
    ) -> Result<(Vec<Job>, Vec<String>, Vec<Assessment>), (Stage, SearchError)> {
        let pipeline = &self.pipeline;

        let answerable = self
            .staged(
                Stage::StopCheck,
                fan_out(
                    paths.iter().map(|p| pipeline.generator.stop_check(p)).collect(),
                    self.max_in_flight,
                ),
            )
            .await?;
        for (&(leaf, _), &answerable) in selected.iter().zip(&answerable) {
            emit(&self.events, &self.cancel, SearchEvent::StopChecked { leaf, answerable }).await;
        }

        let jobs: Vec<Job> = answerable
            .iter()
            .enumerate()
            .flat_map(|(leaf, &answerable)| {
                let (kind, count) = if answerable {
                    (JobKind::Answer, 1)
                } else {
                    (JobKind::Thought, self.params.n_branches)
                };
                std::iter::repeat(Job { leaf, kind }).take(count)
            })
            .collect();
        tracing::debug!(iteration, requests = jobs.len(), "generation batch");

        let texts = self
            .staged(
                Stage::Generation,
                fan_out(
                    jobs.iter()
                        .map(|job| self.generate(*job, &paths[job.leaf]))
                        .collect(),
                    self.max_in_flight,
                ),
            )
            .await?;

        let assessments = self
            .staged(
                Stage::Evaluation,
                fan_out(
                    jobs.iter()
                        .zip(&texts)
                        .map(|(job, text)| self.assess(*job, &paths[job.leaf], text))
                        .collect(),
                    self.max_in_flight,
                ),
            )
            .await?;

        Ok((jobs, texts, assessments))
    }

    async fn generate(&self, job: Job, path: &ReasoningPath) -> Result<String, OracleError> {
        match job.kind {
            JobKind::Thought => self.pipeline.generator.next_thought(path).await,
            JobKind::Answer => self.pipeline.generator.final_answer(path).await,
        }
    }

    async fn assess(
        &self,
        job: Job,
        path: &ReasoningPath,
        text: &str,
    ) -> Result<Assessment, OracleError> {
        match job.kind {
            JobKind::Thought => self
                .pipeline
                .evaluator
                .evaluate(path, text)
                .await
                .map(Assessment::Scored),
            JobKind::Answer => self
                .pipeline
                .validator
                .validate_result(path, text)
                .await
                .map(Assessment::Validated),
        }
    }

    /// Races one batch against the cancellation token.
    async fn staged<T, F>(&self, stage: Stage, batch: F) -> Result<T, (Stage, SearchError)>
    where
        F: Future<Output = Result<T, OracleError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err((stage, SearchError::Cancelled)),
            result = batch => result.map_err(|source| (stage, SearchError::OracleUnavailable { stage, source })),
        }
    }

    /// Appends every candidate to the tree and updates the frontier.
    async fn commit(
        &mut self,
        selected: &[(NodeId, f64)],
        jobs: Vec<Job>,
        texts: Vec<String>,
        assessments: Vec<Assessment>,
    ) -> Result<(), SearchError> {
        let mut productive = vec![false; selected.len()];
        let mut events = Vec::with_capacity(jobs.len());

        for ((job, text), assessment) in jobs.into_iter().zip(texts).zip(assessments) {
            let parent = selected[job.leaf].0;
            let node = self.tree.add_child(parent, text.clone())?;
            match assessment {
                Assessment::Scored(evaluation) => {
                    self.tree.set_score(node, evaluation.score)?;
                    let survived = evaluation.survives(self.survival);
                    if survived {
                        self.frontier.insert(node, evaluation.score);
                        productive[job.leaf] = true;
                    } else {
                        self.tree.mark_dead(node)?;
                    }
                    events.push(SearchEvent::CandidateScored {
                        parent,
                        node,
                        content: text,
                        score: evaluation.score,
                        survived,
                        violation: evaluation.violation,
                    });
                }
                Assessment::Validated(verdict) if verdict.accepted => {
                    self.tree.mark_answer(node)?;
                    productive[job.leaf] = true;
                    self.answers.push(text.clone());
                    events.push(SearchEvent::AnswerAccepted { node, answer: text });
                }
                Assessment::Validated(verdict) => {
                    self.tree.mark_dead(node)?;
                    tracing::debug!(%node, answer = %text, failures = ?verdict.failures, "answer rejected");
                    events.push(SearchEvent::AnswerRejected {
                        node,
                        answer: text,
                        failures: verdict.failures,
                    });
                }
            }
        }

        // An expanded leaf with nothing viable below it is a dead end. The root never dies.
        for (&(leaf, _), productive) in selected.iter().zip(productive) {
            if !productive {
                self.tree.mark_dead(leaf)?;
            }
        }

        for event in events {
            emit(&self.events, &self.cancel, event).await;
        }
        Ok(())
    }
}
