//! Query planning: turn the question, or the open gaps, into sub-queries.

use super::state::ResearchState;
use super::MAX_SUBQUERIES_PER_ROUND;
use crate::error::OracleError;
use crate::lines::LineContract;
use crate::oracle::Oracle;
use crate::prompts::{self, PLANNER_ROLE};
use std::sync::Arc;
use tracing::{debug, warn};

/// Produces sub-queries for each planning round.
pub struct QueryPlanner {
    oracle: Arc<dyn Oracle>,
}

impl QueryPlanner {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self { oracle }
    }

    /// Run one planning round.
    ///
    /// The first round plans from the question alone; later rounds are steered
    /// by the current gaps (falling back to the question when there are
    /// none). New sub-queries are appended and `iteration` is incremented even
    /// if the reply held nothing usable. Returns the sub-queries added.
    pub async fn plan(&self, state: &mut ResearchState) -> Result<Vec<String>, OracleError> {
        let gaps: &[String] = if state.iteration == 0 { &[] } else { &state.gaps };
        let prompt = prompts::planner_prompt(state.query(), gaps);
        let reply = self.oracle.invoke(PLANNER_ROLE, &prompt).await?;

        let parsed = LineContract::capped(MAX_SUBQUERIES_PER_ROUND).parse(&reply);
        if parsed.truncated > 0 {
            warn!(
                dropped = parsed.truncated,
                "Planner returned more sub-queries than allowed; extra lines dropped"
            );
        }
        if parsed.lines.is_empty() {
            warn!(iteration = state.iteration + 1, "Planner returned no usable sub-queries");
        }

        let added = parsed.into_lines();
        state.subqueries.extend(added.iter().cloned());
        state.iteration += 1;
        debug!(
            iteration = state.iteration,
            added = added.len(),
            total = state.subqueries.len(),
            "Planning round complete"
        );
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::MockOracle;

    #[tokio::test]
    async fn test_first_round_appends_and_counts() {
        let oracle = Arc::new(MockOracle::with_response(
            "# Sub-queries\n- int8 quantization\n- GPTQ\n\n- AWQ benchmarks",
        ));
        let planner = QueryPlanner::new(oracle.clone());
        let mut state = ResearchState::new("transformer model quantization");

        let added = planner.plan(&mut state).await.unwrap();
        assert_eq!(added, vec!["int8 quantization", "GPTQ", "AWQ benchmarks"]);
        assert_eq!(state.subqueries, added);
        assert_eq!(state.iteration, 1);

        let calls = oracle.calls();
        assert_eq!(calls[0].role, PLANNER_ROLE);
        assert!(calls[0].prompt.contains("transformer model quantization"));
    }

    #[tokio::test]
    async fn test_later_round_uses_gaps_and_never_replaces() {
        let oracle = Arc::new(MockOracle::with_response("hardware kernels"));
        let planner = QueryPlanner::new(oracle.clone());
        let mut state = ResearchState::new("llm quantization");
        state.subqueries = vec!["first".into()];
        state.iteration = 1;
        state.gaps = vec!["GPU kernel support".into()];

        planner.plan(&mut state).await.unwrap();
        assert_eq!(state.subqueries, vec!["first", "hardware kernels"]);
        assert_eq!(state.iteration, 2);
        let prompt = &oracle.calls()[0].prompt;
        assert!(prompt.contains("- GPU kernel support"));
        assert!(!prompt.contains("llm quantization"));
    }

    #[tokio::test]
    async fn test_empty_reply_still_completes_round() {
        let oracle = Arc::new(MockOracle::with_response("\n# nothing here\n  \n"));
        let planner = QueryPlanner::new(oracle);
        let mut state = ResearchState::new("q");

        let added = planner.plan(&mut state).await.unwrap();
        assert!(added.is_empty());
        assert_eq!(state.iteration, 1);
    }

    #[tokio::test]
    async fn test_reply_capped_at_five() {
        let oracle = Arc::new(MockOracle::with_response("a\nb\nc\nd\ne\nf\ng"));
        let planner = QueryPlanner::new(oracle);
        let mut state = ResearchState::new("q");

        let added = planner.plan(&mut state).await.unwrap();
        assert_eq!(added.len(), MAX_SUBQUERIES_PER_ROUND);
    }

    #[tokio::test]
    async fn test_oracle_failure_propagates() {
        let oracle = Arc::new(MockOracle::new());
        oracle.queue_error(OracleError::AuthFailed {
            provider: "mock".into(),
        });
        let planner = QueryPlanner::new(oracle);
        let mut state = ResearchState::new("q");

        assert!(planner.plan(&mut state).await.is_err());
        assert_eq!(state.iteration, 0);
        assert!(state.subqueries.is_empty());
    }
}
