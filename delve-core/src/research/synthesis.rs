//! Outline and article synthesis.
//!
//! Each stage is one oracle call over the full evidence set and writes its
//! field exactly once. Neither retries.

use super::state::ResearchState;
use crate::error::OracleError;
use crate::oracle::Oracle;
use crate::prompts::{self, OUTLINE_ROLE, WRITER_ROLE};
use std::sync::Arc;
use tracing::info;

pub struct OutlineSynthesizer {
    oracle: Arc<dyn Oracle>,
    language: String,
}

impl OutlineSynthesizer {
    pub fn new(oracle: Arc<dyn Oracle>, language: impl Into<String>) -> Self {
        Self {
            oracle,
            language: language.into(),
        }
    }

    pub async fn outline(&self, state: &mut ResearchState) -> Result<(), OracleError> {
        let prompt = prompts::outline_prompt(state.query(), &state.search_results, &self.language);
        state.outline = self.oracle.invoke(OUTLINE_ROLE, &prompt).await?;
        info!(chars = state.outline.len(), "Outline generated");
        Ok(())
    }
}

pub struct ArticleComposer {
    oracle: Arc<dyn Oracle>,
    language: String,
}

impl ArticleComposer {
    pub fn new(oracle: Arc<dyn Oracle>, language: impl Into<String>) -> Self {
        Self {
            oracle,
            language: language.into(),
        }
    }

    /// Write the cited article from the outline, evidence and verification notes.
    pub async fn compose(&self, state: &mut ResearchState) -> Result<(), OracleError> {
        let prompt = prompts::article_prompt(
            state.query(),
            &state.outline,
            &state.search_results,
            &state.verification_report,
            &self.language,
        );
        state.article = self.oracle.invoke(WRITER_ROLE, &prompt).await?;
        info!(chars = state.article.len(), "Article generated");
        Ok(())
    }
}
