//! Workflow engine: drives a run through the stage transition table.

use super::aggregator::SourceAggregator;
use super::coverage::CoverageEvaluator;
use super::deep_dive::DeepDiveExplorer;
use super::planner::QueryPlanner;
use super::state::{NoOpCallback, ResearchCallback, ResearchState, Stage};
use super::synthesis::{ArticleComposer, OutlineSynthesizer};
use super::verification::VerificationAnalyst;
use super::{MAX_DEPTH, MAX_ITERATIONS};
use crate::config::ResearchConfig;
use crate::error::{DelveError, OracleError, Result, WorkflowError};
use crate::oracle::Oracle;
use crate::sources::ProviderSet;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span};

/// Loop bounds enforced by the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caps {
    pub max_iterations: usize,
    pub max_depth: usize,
}

impl Caps {
    pub fn from_config(config: &ResearchConfig) -> Self {
        Self {
            max_iterations: config.iteration_cap(),
            max_depth: config.depth_cap(),
        }
    }
}

impl Default for Caps {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            max_depth: MAX_DEPTH,
        }
    }
}

/// The transition table.
///
/// `last_followups` is the number of follow-up records the deep-dive round
/// that just finished produced; it only matters when leaving `DeepDiving`.
pub fn next_stage(stage: Stage, state: &ResearchState, last_followups: usize, caps: Caps) -> Stage {
    match stage {
        Stage::Planning => Stage::Searching,
        Stage::Searching => Stage::Evaluating,
        Stage::Evaluating => {
            if state.needs_more_search && state.iteration < caps.max_iterations {
                Stage::Planning
            } else {
                Stage::DeepDiving
            }
        }
        Stage::DeepDiving => {
            if state.depth < caps.max_depth && last_followups > 0 {
                Stage::DeepDiving
            } else {
                Stage::Verifying
            }
        }
        Stage::Verifying => Stage::Outlining,
        Stage::Outlining => Stage::Composing,
        Stage::Composing | Stage::Done => Stage::Done,
    }
}

/// Orchestrates one research run per call to [`run`](WorkflowEngine::run).
pub struct WorkflowEngine {
    planner: QueryPlanner,
    aggregator: SourceAggregator,
    coverage: CoverageEvaluator,
    deep_dive: DeepDiveExplorer,
    verification: VerificationAnalyst,
    outline: OutlineSynthesizer,
    composer: ArticleComposer,
    caps: Caps,
    callback: Arc<dyn ResearchCallback>,
}

impl WorkflowEngine {
    pub fn new(oracle: Arc<dyn Oracle>, providers: ProviderSet, config: ResearchConfig) -> Self {
        Self {
            planner: QueryPlanner::new(oracle.clone()),
            coverage: CoverageEvaluator::new(oracle.clone(), config.coverage_sample),
            deep_dive: DeepDiveExplorer::new(oracle.clone(), providers.academic.clone(), &config),
            verification: VerificationAnalyst::new(oracle.clone(), config.verification_sample),
            outline: OutlineSynthesizer::new(oracle.clone(), config.language.as_str()),
            composer: ArticleComposer::new(oracle.clone(), config.language.as_str()),
            caps: Caps::from_config(&config),
            aggregator: SourceAggregator::new(oracle, providers, config),
            callback: Arc::new(NoOpCallback),
        }
    }

    /// Attach a progress callback.
    pub fn with_callback(mut self, callback: Arc<dyn ResearchCallback>) -> Self {
        self.callback = callback;
        self
    }

    /// Research `query` from scratch and return the final state.
    ///
    /// Every run starts from a fresh `ResearchState`. Oracle failures abort
    /// the run; provider failures only shrink the evidence. Cancelling the
    /// token stops the run at the next stage boundary or abandons the stage
    /// in flight, returning `WorkflowError::Cancelled`.
    pub async fn run(&self, query: &str, cancel: &CancellationToken) -> Result<ResearchState> {
        let query = query.trim();
        if query.is_empty() {
            return Err(WorkflowError::EmptyQuery.into());
        }

        let run_id = uuid::Uuid::new_v4();
        let span = info_span!("research", %run_id);
        self.drive(ResearchState::new(query), cancel)
            .instrument(span)
            .await
    }

    async fn drive(&self, mut state: ResearchState, cancel: &CancellationToken) -> Result<ResearchState> {
        info!(query = state.query(), "Research run started");
        let mut stage = Stage::Planning;

        while !stage.is_terminal() {
            if cancel.is_cancelled() {
                return Err(WorkflowError::Cancelled { stage }.into());
            }
            debug!(%stage, iteration = state.iteration, depth = state.depth, "Entering stage");
            self.callback.on_stage(stage, state.iteration, state.depth);

            let followups = cancellable(stage, cancel, self.execute(stage, &mut state)).await?;
            stage = next_stage(stage, &state, followups, self.caps);
        }

        info!(
            subqueries = state.subqueries.len(),
            results = state.search_results.len(),
            iterations = state.iteration,
            depth = state.depth,
            "Research run complete"
        );
        Ok(state)
    }

    /// Run one stage. Returns the follow-up count for deep-dive rounds, 0 otherwise.
    async fn execute(&self, stage: Stage, state: &mut ResearchState) -> std::result::Result<usize, OracleError> {
        match stage {
            Stage::Planning => {
                let added = self.planner.plan(state).await?;
                self.callback.on_subqueries(&added);
            }
            Stage::Searching => {
                let summary = self.aggregator.gather(state).await?;
                self.callback
                    .on_search_complete(summary.added, state.search_results.len());
            }
            Stage::Evaluating => {
                self.coverage.evaluate(state).await?;
                self.callback.on_coverage(state.needs_more_search, &state.gaps);
            }
            Stage::DeepDiving => {
                let followups = self.deep_dive.explore(state).await?;
                self.callback.on_deep_dive(state.depth, followups);
                return Ok(followups);
            }
            Stage::Verifying => self.verification.verify(state).await?,
            Stage::Outlining => self.outline.outline(state).await?,
            Stage::Composing => self.composer.compose(state).await?,
            Stage::Done => {}
        }
        Ok(0)
    }
}

/// Race a stage against cancellation; the stage future is dropped if the
/// token fires first.
async fn cancellable<T, F>(stage: Stage, cancel: &CancellationToken, work: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, OracleError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(WorkflowError::Cancelled { stage }.into()),
        out = work => out.map_err(DelveError::from),
    }
}
