//! Evidence gathering: fan sub-queries out to every provider, then rewrite
//! and re-search the ones that came back nearly empty.

use super::state::ResearchState;
use crate::config::ResearchConfig;
use crate::error::OracleError;
use crate::evidence::{EvidenceRecord, ProviderKind, SearchHit};
use crate::lines::LineContract;
use crate::oracle::Oracle;
use crate::prompts::{self, REWRITER_ROLE};
use crate::sources::{FanOutSlot, ProviderSet};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What one search round did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundSummary {
    /// Records appended to `search_results`, including re-search results.
    pub added: usize,
    /// Sub-queries whose core-provider yield was below the threshold.
    pub low_yield: Vec<String>,
    /// Rewritten queries that were re-searched.
    pub rewritten: Vec<String>,
}

/// Result of one provider call, tagged with its position in the batch.
struct SlotOutcome {
    query_index: usize,
    query: String,
    kind: ProviderKind,
    hits: Vec<SearchHit>,
}

pub struct SourceAggregator {
    oracle: Arc<dyn Oracle>,
    providers: ProviderSet,
    config: ResearchConfig,
}

impl SourceAggregator {
    pub fn new(oracle: Arc<dyn Oracle>, providers: ProviderSet, config: ResearchConfig) -> Self {
        Self {
            oracle,
            providers,
            config,
        }
    }

    /// Search the most recent sub-queries and append the results.
    ///
    /// Provider calls run concurrently; results are merged by sub-query index
    /// and then fixed provider order, whatever order they complete in.
    pub async fn gather(&self, state: &mut ResearchState) -> Result<RoundSummary, OracleError> {
        let batch: Vec<String> = state
            .recent_subqueries(self.config.recent_subqueries)
            .to_vec();
        let slots = self.providers.fan_out(&self.config);
        let before = state.search_results.len();

        let outcomes = self.run_slots(&batch, &slots).await;

        let mut core_yield = vec![0usize; batch.len()];
        for outcome in outcomes {
            if outcome.kind.counts_toward_yield() {
                core_yield[outcome.query_index] += outcome.hits.len();
            }
            state.search_results.extend(
                outcome
                    .hits
                    .into_iter()
                    .map(|hit| EvidenceRecord::from_hit(outcome.query.as_str(), outcome.kind, hit)),
            );
        }

        let low_yield: Vec<String> = batch
            .iter()
            .zip(&core_yield)
            .filter(|(_, count)| **count < self.config.low_yield_threshold)
            .map(|(query, _)| query.clone())
            .collect();

        let rewritten = if low_yield.is_empty() {
            Vec::new()
        } else {
            self.improve_queries(state, &low_yield).await?
        };

        let added = state.search_results.len() - before;
        info!(
            subqueries = batch.len(),
            results = added,
            low_yield = low_yield.len(),
            rewritten = rewritten.len(),
            "Search round complete"
        );
        Ok(RoundSummary {
            added,
            low_yield,
            rewritten,
        })
    }

    /// Rewrite all low-yield queries with one oracle call and re-search the
    /// rewrites against the academic and web providers.
    ///
    /// Rewrites are an unordered batch with no positional link to the input.
    /// Results whose URL is already present are skipped; rewrites are not
    /// themselves checked for yield.
    async fn improve_queries(
        &self,
        state: &mut ResearchState,
        low_yield: &[String],
    ) -> Result<Vec<String>, OracleError> {
        let prompt = prompts::rewrite_prompt(low_yield);
        let reply = self.oracle.invoke(REWRITER_ROLE, &prompt).await?;

        let parsed = LineContract::capped(low_yield.len()).parse(&reply);
        if parsed.truncated > 0 || parsed.lines.len() < low_yield.len() {
            warn!(
                requested = low_yield.len(),
                returned = parsed.lines.len(),
                dropped = parsed.truncated,
                "Query rewrite reply did not match the requested count"
            );
        }
        let rewritten = parsed.into_lines();
        if rewritten.is_empty() {
            return Ok(rewritten);
        }

        let targets = self.providers.rewrite_targets(&self.config);
        let outcomes = self.run_slots(&rewritten, &targets).await;

        for outcome in outcomes {
            for hit in outcome.hits {
                if state.has_result_url(&hit.url) {
                    debug!(url = hit.url.as_str(), "Skipping re-search result already collected");
                    continue;
                }
                state.search_results.push(EvidenceRecord::from_hit(
                    outcome.query.as_str(),
                    outcome.kind,
                    hit,
                ));
            }
        }
        Ok(rewritten)
    }

    /// Call every slot for every query with bounded concurrency, returning
    /// outcomes in (query, slot) order.
    async fn run_slots(&self, queries: &[String], slots: &[FanOutSlot]) -> Vec<SlotOutcome> {
        let calls: Vec<(usize, String, FanOutSlot)> = queries
            .iter()
            .enumerate()
            .flat_map(|(index, query)| {
                slots
                    .iter()
                    .map(move |slot| (index, query.clone(), slot.clone()))
            })
            .collect();

        stream::iter(calls)
            .map(|(query_index, query, slot)| async move {
                let hits = slot.provider.search(&query, slot.max_results).await;
                debug!(
                    provider = slot.provider.name(),
                    kind = %slot.kind,
                    query = query.as_str(),
                    results = hits.len(),
                    "Provider call finished"
                );
                SlotOutcome {
                    query_index,
                    query,
                    kind: slot.kind,
                    hits,
                }
            })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::MockOracle;
    use crate::sources::MockSearchProvider;
    use std::time::Duration;

    fn hits(prefix: &str, n: usize) -> Vec<SearchHit> {
        (0..n)
            .map(|i| {
                SearchHit::new(
                    format!("{prefix} {i}"),
                    format!("https://{prefix}.example/{i}"),
                    "summary",
                )
            })
            .collect()
    }

    fn providers_with(
        academic: Arc<MockSearchProvider>,
        web: Arc<MockSearchProvider>,
    ) -> ProviderSet {
        let empty = Arc::new(MockSearchProvider::empty("empty"));
        ProviderSet {
            academic,
            web,
            competitions: empty.clone(),
            datasets: empty.clone(),
            notebooks: empty.clone(),
            discussions: empty,
        }
    }

    #[tokio::test]
    async fn test_only_recent_subqueries_searched() {
        let web = Arc::new(MockSearchProvider::from_fn("web", |q, _| Ok(hits(q, 2))));
        let academic = Arc::new(MockSearchProvider::empty("arxiv"));
        let aggregator = SourceAggregator::new(
            Arc::new(MockOracle::new()),
            providers_with(academic, web.clone()),
            ResearchConfig::default(),
        );
        let mut state = ResearchState::new("q");
        state.subqueries = (1..=7).map(|i| format!("sq{i}")).collect();

        let summary = aggregator.gather(&mut state).await.unwrap();
        let searched: Vec<_> = web.queries().into_iter().map(|(q, _)| q).collect();
        assert_eq!(searched, vec!["sq3", "sq4", "sq5", "sq6", "sq7"]);
        assert_eq!(summary.added, 10);
        assert!(summary.low_yield.is_empty());
    }

    #[tokio::test]
    async fn test_merge_order_is_deterministic() {
        // Earlier sub-queries answer slowest.
        let web = Arc::new(
            MockSearchProvider::from_fn("web", |q, _| Ok(hits(q, 2)))
                .with_delay(Duration::from_millis(5)),
        );
        let academic = Arc::new(MockSearchProvider::from_fn("arxiv", |q, _| {
            Ok(hits(&format!("paper-{q}"), 2))
        }));
        let aggregator = SourceAggregator::new(
            Arc::new(MockOracle::new()),
            providers_with(academic, web),
            ResearchConfig::default(),
        );
        let mut state = ResearchState::new("q");
        state.subqueries = vec!["a".into(), "b".into()];

        aggregator.gather(&mut state).await.unwrap();
        let order: Vec<_> = state
            .search_results
            .iter()
            .map(|r| (r.origin_query.as_str(), r.kind))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a", ProviderKind::Academic),
                ("a", ProviderKind::Academic),
                ("a", ProviderKind::Web),
                ("a", ProviderKind::Web),
                ("b", ProviderKind::Academic),
                ("b", ProviderKind::Academic),
                ("b", ProviderKind::Web),
                ("b", ProviderKind::Web),
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_provider_is_isolated() {
        let web = Arc::new(MockSearchProvider::failing("web"));
        let academic = Arc::new(MockSearchProvider::from_fn("arxiv", |q, _| Ok(hits(q, 3))));
        let aggregator = SourceAggregator::new(
            Arc::new(MockOracle::new()),
            providers_with(academic, web),
            ResearchConfig::default(),
        );
        let mut state = ResearchState::new("q");
        state.subqueries = vec!["x".into()];

        let summary = aggregator.gather(&mut state).await.unwrap();
        assert_eq!(summary.added, 3);
        assert!(state.search_results.iter().all(|r| r.kind == ProviderKind::Academic));
    }

    #[tokio::test]
    async fn test_discussion_slot_requests_ten() {
        let discussions = Arc::new(MockSearchProvider::empty("discussions"));
        let mut set = providers_with(
            Arc::new(MockSearchProvider::from_fn("arxiv", |q, _| Ok(hits(q, 3)))),
            Arc::new(MockSearchProvider::empty("web")),
        );
        set.discussions = discussions.clone();
        let aggregator =
            SourceAggregator::new(Arc::new(MockOracle::new()), set, ResearchConfig::default());
        let mut state = ResearchState::new("q");
        state.subqueries = vec!["x".into()];

        aggregator.gather(&mut state).await.unwrap();
        assert_eq!(discussions.queries(), vec![("x".to_string(), 10)]);
    }

    #[tokio::test]
    async fn test_low_yield_triggers_single_rewrite() {
        // "rare topic" finds one paper; everything else finds three.
        let academic = Arc::new(MockSearchProvider::from_fn("arxiv", |q, _| {
            Ok(if q == "rare topic" { hits("rare", 1) } else { hits(q, 3) })
        }));
        let web = Arc::new(MockSearchProvider::from_fn("web", |q, _| {
            Ok(if q == "rare topic" { Vec::new() } else { hits(&format!("web-{q}"), 3) })
        }));
        let oracle = Arc::new(MockOracle::with_response(
            "- broader rare topic survey\n- another rewrite",
        ));
        let aggregator = SourceAggregator::new(
            oracle.clone(),
            providers_with(academic.clone(), web.clone()),
            ResearchConfig::default(),
        );
        let mut state = ResearchState::new("q");
        state.subqueries = vec!["common".into(), "rare topic".into()];

        let summary = aggregator.gather(&mut state).await.unwrap();
        assert_eq!(summary.low_yield, vec!["rare topic"]);
        assert_eq!(summary.rewritten, vec!["broader rare topic survey"]);
        assert_eq!(oracle.calls_with_role(REWRITER_ROLE), 1);

        // Rewrites hit academic and web only, and are not added as sub-queries.
        assert!(academic
            .queries()
            .iter()
            .any(|(q, _)| q == "broader rare topic survey"));
        assert!(web.queries().iter().any(|(q, _)| q == "broader rare topic survey"));
        assert_eq!(state.subqueries.len(), 2);
        assert!(state
            .search_results
            .iter()
            .any(|r| r.origin_query == "broader rare topic survey"));
    }

    #[tokio::test]
    async fn test_rewrite_skips_known_urls() {
        // The rewrite finds the same single paper again.
        let academic = Arc::new(MockSearchProvider::from_fn("arxiv", |_, _| Ok(hits("same", 1))));
        let web = Arc::new(MockSearchProvider::empty("web"));
        let aggregator = SourceAggregator::new(
            Arc::new(MockOracle::with_response("rewritten")),
            providers_with(academic, web),
            ResearchConfig::default(),
        );
        let mut state = ResearchState::new("q");
        state.subqueries = vec!["thin".into()];

        let summary = aggregator.gather(&mut state).await.unwrap();
        assert_eq!(summary.rewritten, vec!["rewritten"]);
        assert_eq!(state.search_results.len(), 1);
        assert_eq!(summary.added, 1);
    }

    #[tokio::test]
    async fn test_notebooks_do_not_count_toward_yield() {
        let notebooks = Arc::new(MockSearchProvider::from_fn("kernels", |q, _| Ok(hits(q, 3))));
        let mut set = providers_with(
            Arc::new(MockSearchProvider::empty("arxiv")),
            Arc::new(MockSearchProvider::empty("web")),
        );
        set.notebooks = notebooks;
        let oracle = Arc::new(MockOracle::with_response(""));
        let aggregator = SourceAggregator::new(oracle.clone(), set, ResearchConfig::default());
        let mut state = ResearchState::new("q");
        state.subqueries = vec!["x".into()];

        let summary = aggregator.gather(&mut state).await.unwrap();
        assert_eq!(summary.low_yield, vec!["x"]);
        assert!(summary.rewritten.is_empty());
        assert_eq!(oracle.calls_with_role(REWRITER_ROLE), 1);
    }

    #[tokio::test]
    async fn test_rewrite_oracle_failure_is_fatal() {
        let oracle = Arc::new(MockOracle::new());
        oracle.queue_error(OracleError::Connection {
            message: "reset".into(),
        });
        let aggregator = SourceAggregator::new(
            oracle,
            providers_with(
                Arc::new(MockSearchProvider::empty("arxiv")),
                Arc::new(MockSearchProvider::empty("web")),
            ),
            ResearchConfig::default(),
        );
        let mut state = ResearchState::new("q");
        state.subqueries = vec!["x".into()];

        assert!(aggregator.gather(&mut state).await.is_err());
    }
}
