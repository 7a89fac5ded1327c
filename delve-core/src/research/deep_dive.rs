//! Deep dive: follow the most promising academic leads to related work.

use super::state::ResearchState;
use crate::config::ResearchConfig;
use crate::error::OracleError;
use crate::evidence::{EvidenceRecord, ProviderKind};
use crate::lines::LineContract;
use crate::oracle::Oracle;
use crate::prompts::{self, DEEP_DIVE_ROLE};
use crate::sources::SearchProvider;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Provenance prefix for follow-up records.
pub const FOLLOWUP_PREFIX: &str = "related to: ";

/// An academic record chosen to be followed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Anchor {
    title: String,
    url: String,
}

pub struct DeepDiveExplorer {
    oracle: Arc<dyn Oracle>,
    academic: Arc<dyn SearchProvider>,
    candidates: usize,
    picks: usize,
    results_per_anchor: usize,
    depth_cap: usize,
}

impl DeepDiveExplorer {
    pub fn new(
        oracle: Arc<dyn Oracle>,
        academic: Arc<dyn SearchProvider>,
        config: &ResearchConfig,
    ) -> Self {
        Self {
            oracle,
            academic,
            candidates: config.deep_dive_candidates,
            picks: config.deep_dive_picks,
            results_per_anchor: config.results_per_provider,
            depth_cap: config.depth_cap(),
        }
    }

    /// Run one deep-dive round and return how many follow-up records it added.
    ///
    /// A no-op once `depth` has reached the cap. Otherwise `depth` is
    /// incremented exactly once, whether or not anything was found.
    pub async fn explore(&self, state: &mut ResearchState) -> Result<usize, OracleError> {
        if state.depth >= self.depth_cap {
            debug!(depth = state.depth, "Deep-dive depth cap reached");
            return Ok(0);
        }

        let candidates = self.candidates(state);
        if candidates.is_empty() {
            state.depth += 1;
            info!(depth = state.depth, "No unexplored academic sources to deepen");
            return Ok(0);
        }

        let titles: Vec<&str> = candidates.iter().map(|c| c.title.as_str()).collect();
        let prompt = prompts::deep_dive_prompt(state.query(), &titles, self.picks);
        let reply = self.oracle.invoke(DEEP_DIVE_ROLE, &prompt).await?;
        let chosen = LineContract::capped(self.picks).parse(&reply).into_lines();

        let anchors = match_anchors(&candidates, &chosen, self.picks);
        if anchors.is_empty() {
            state.depth += 1;
            warn!(
                depth = state.depth,
                returned = chosen.len(),
                "Deep-dive selection matched no candidate titles"
            );
            return Ok(0);
        }

        // Searches run together; merging stays in anchor order.
        let searches = anchors
            .iter()
            .map(|anchor| self.academic.search(&anchor.title, self.results_per_anchor));
        let related = join_all(searches).await;

        let mut followups = 0;
        for (anchor, hits) in anchors.iter().zip(related) {
            state.mark_explored(anchor.url.as_str());
            let origin = format!("{FOLLOWUP_PREFIX}{}", anchor.title);
            for hit in hits {
                if state.is_explored(&hit.url) {
                    continue;
                }
                state.mark_explored(hit.url.as_str());
                state.search_results.push(EvidenceRecord::from_hit(
                    origin.as_str(),
                    ProviderKind::AcademicFollowup,
                    hit,
                ));
                followups += 1;
            }
        }

        state.depth += 1;
        info!(
            depth = state.depth,
            anchors = anchors.len(),
            followups,
            "Deep-dive round complete"
        );
        Ok(followups)
    }

    /// Unexplored academic records, first occurrence per URL, capped.
    fn candidates(&self, state: &ResearchState) -> Vec<Anchor> {
        let mut seen = HashSet::new();
        state
            .search_results
            .iter()
            .filter(|r| r.kind == ProviderKind::Academic && !state.is_explored(&r.url))
            .filter(|r| seen.insert(r.url.as_str()))
            .take(self.candidates)
            .map(|r| Anchor {
                title: r.title.clone(),
                url: r.url.clone(),
            })
            .collect()
    }
}

/// Candidates (in presented order) containing any chosen line as an exact,
/// case-sensitive substring of their title; at most `picks`.
fn match_anchors(candidates: &[Anchor], chosen: &[String], picks: usize) -> Vec<Anchor> {
    candidates
        .iter()
        .filter(|c| chosen.iter().any(|line| c.title.contains(line.as_str())))
        .take(picks)
        .cloned()
        .collect()
}
