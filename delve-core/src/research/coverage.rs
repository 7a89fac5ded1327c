//! Coverage evaluation: is the evidence so far enough to answer the question?

use super::state::ResearchState;
use super::{MAX_GAPS, SUFFICIENCY_SENTINEL};
use crate::error::OracleError;
use crate::lines::{LineContract, contains_sentinel};
use crate::oracle::Oracle;
use crate::prompts::{self, COVERAGE_ROLE};
use std::sync::Arc;
use tracing::{info, warn};

pub struct CoverageEvaluator {
    oracle: Arc<dyn Oracle>,
    sample: usize,
}

impl CoverageEvaluator {
    /// `sample` bounds how many records (title and kind only) are shown.
    pub fn new(oracle: Arc<dyn Oracle>, sample: usize) -> Self {
        Self { oracle, sample }
    }

    /// Classify coverage, touching only `needs_more_search` and `gaps`.
    pub async fn evaluate(&self, state: &mut ResearchState) -> Result<(), OracleError> {
        let sample_len = state.search_results.len().min(self.sample);
        let prompt = prompts::coverage_prompt(state.query(), &state.search_results[..sample_len]);
        let reply = self.oracle.invoke(COVERAGE_ROLE, &prompt).await?;

        if contains_sentinel(&reply, SUFFICIENCY_SENTINEL) {
            state.needs_more_search = false;
            state.gaps.clear();
            info!(iteration = state.iteration, "Coverage judged sufficient");
            return Ok(());
        }

        let parsed = LineContract::capped(MAX_GAPS).parse(&reply);
        if parsed.lines.is_empty() {
            warn!("Coverage reply had neither the sentinel nor any gaps");
        }
        state.needs_more_search = true;
        state.gaps = parsed.into_lines();
        info!(
            iteration = state.iteration,
            gaps = state.gaps.len(),
            "Coverage judged insufficient"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{EvidenceRecord, ProviderKind, SearchHit};
    use crate::oracle::MockOracle;

    fn state_with_records(n: usize) -> ResearchState {
        let mut state = ResearchState::new("q");
        state.search_results = (0..n)
            .map(|i| {
                EvidenceRecord::from_hit(
                    "q",
                    ProviderKind::Web,
                    SearchHit::new(format!("title-{i}"), format!("https://w/{i}"), "s"),
                )
            })
            .collect();
        state
    }

    #[tokio::test]
    async fn test_sentinel_anywhere_means_sufficient() {
        let oracle = Arc::new(MockOracle::with_response(
            "After review: SUFFICIENT, nothing to add.",
        ));
        let evaluator = CoverageEvaluator::new(oracle, 30);
        let mut state = state_with_records(3);
        state.gaps = vec!["old gap".into()];
        state.needs_more_search = true;

        evaluator.evaluate(&mut state).await.unwrap();
        assert!(!state.needs_more_search);
        assert!(state.gaps.is_empty());
    }

    #[tokio::test]
    async fn test_gaps_capped_at_three() {
        let oracle = Arc::new(MockOracle::with_response(
            "Missing aspects:\n- a\n- b\n- c\n- d\n",
        ));
        let evaluator = CoverageEvaluator::new(oracle, 30);
        let mut state = state_with_records(1);

        evaluator.evaluate(&mut state).await.unwrap();
        assert!(state.needs_more_search);
        assert_eq!(state.gaps, vec!["Missing aspects:", "a", "b"]);
    }

    #[tokio::test]
    async fn test_no_gap_lines_still_needs_more() {
        let oracle = Arc::new(MockOracle::with_response("\n\n"));
        let evaluator = CoverageEvaluator::new(oracle, 30);
        let mut state = state_with_records(1);

        evaluator.evaluate(&mut state).await.unwrap();
        assert!(state.needs_more_search);
        assert!(state.gaps.is_empty());
    }

    #[tokio::test]
    async fn test_only_sample_is_shown() {
        let oracle = Arc::new(MockOracle::with_response("SUFFICIENT"));
        let evaluator = CoverageEvaluator::new(oracle.clone(), 30);
        let mut state = state_with_records(40);

        evaluator.evaluate(&mut state).await.unwrap();
        let prompt = &oracle.calls()[0].prompt;
        assert!(prompt.contains("title-29"));
        assert!(!prompt.contains("title-30"));
        assert_eq!(state.search_results.len(), 40);
    }
}
