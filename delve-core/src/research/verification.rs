//! Cross-source verification of the collected evidence.

use super::state::ResearchState;
use crate::error::OracleError;
use crate::oracle::Oracle;
use crate::prompts::{self, VERIFICATION_ROLE};
use std::sync::Arc;
use tracing::info;

/// Reports contradictions, credibility and freshness over a capped sample.
pub struct VerificationAnalyst {
    oracle: Arc<dyn Oracle>,
    sample: usize,
}

impl VerificationAnalyst {
    pub fn new(oracle: Arc<dyn Oracle>, sample: usize) -> Self {
        Self { oracle, sample }
    }

    /// Store the oracle's report verbatim in `verification_report`.
    pub async fn verify(&self, state: &mut ResearchState) -> Result<(), OracleError> {
        let sample_len = state.search_results.len().min(self.sample);
        let prompt =
            prompts::verification_prompt(state.query(), &state.search_results[..sample_len]);
        state.verification_report = self.oracle.invoke(VERIFICATION_ROLE, &prompt).await?;
        info!(
            sources = sample_len,
            report_chars = state.verification_report.len(),
            "Verification complete"
        );
        Ok(())
    }
}
