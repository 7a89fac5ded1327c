//! Search provider interface and the fixed provider set.

use crate::config::ResearchConfig;
use crate::error::ProviderError;
use crate::evidence::{ProviderKind, SearchHit};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// A keyword search over one external source.
///
/// Adapters implement [`fetch`](SearchProvider::fetch); callers use
/// [`search`](SearchProvider::search), which never fails.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &str;

    /// Run the query against the backing service.
    async fn fetch(&self, query: &str, max_results: usize)
    -> Result<Vec<SearchHit>, ProviderError>;

    /// Run the query, degrading any failure to an empty list.
    async fn search(&self, query: &str, max_results: usize) -> Vec<SearchHit> {
        match self.fetch(query, max_results).await {
            Ok(mut hits) => {
                hits.truncate(max_results);
                hits
            }
            Err(ProviderError::Unauthenticated { provider }) => {
                debug!(provider = provider.as_str(), "Skipping unauthenticated provider");
                Vec::new()
            }
            Err(e) => {
                warn!(provider = self.name(), query, error = %e, "Search failed; using no results");
                Vec::new()
            }
        }
    }
}

/// One provider per search slot, in the fixed fan-out order.
#[derive(Clone)]
pub struct ProviderSet {
    pub academic: Arc<dyn SearchProvider>,
    pub web: Arc<dyn SearchProvider>,
    pub competitions: Arc<dyn SearchProvider>,
    pub datasets: Arc<dyn SearchProvider>,
    pub notebooks: Arc<dyn SearchProvider>,
    pub discussions: Arc<dyn SearchProvider>,
}

/// A provider slot together with the kind its results are tagged with and
/// how many results it is asked for.
#[derive(Clone)]
pub struct FanOutSlot {
    pub kind: ProviderKind,
    pub provider: Arc<dyn SearchProvider>,
    pub max_results: usize,
}

impl ProviderSet {
    /// Use the same provider for every slot.
    pub fn uniform(provider: Arc<dyn SearchProvider>) -> Self {
        Self {
            academic: provider.clone(),
            web: provider.clone(),
            competitions: provider.clone(),
            datasets: provider.clone(),
            notebooks: provider.clone(),
            discussions: provider,
        }
    }

    /// Slots in fan-out order: academic, web, competition, dataset,
    /// notebook, discussion.
    pub fn fan_out(&self, config: &ResearchConfig) -> Vec<FanOutSlot> {
        let per = config.results_per_provider;
        vec![
            slot(ProviderKind::Academic, &self.academic, per),
            slot(ProviderKind::Web, &self.web, per),
            slot(ProviderKind::PlatformCompetition, &self.competitions, per),
            slot(ProviderKind::PlatformDataset, &self.datasets, per),
            slot(ProviderKind::PlatformNotebook, &self.notebooks, per),
            slot(
                ProviderKind::PlatformDiscussion,
                &self.discussions,
                config.discussion_results,
            ),
        ]
    }

    /// Slots used when re-searching rewritten queries.
    pub fn rewrite_targets(&self, config: &ResearchConfig) -> Vec<FanOutSlot> {
        let per = config.results_per_provider;
        vec![
            slot(ProviderKind::Academic, &self.academic, per),
            slot(ProviderKind::Web, &self.web, per),
        ]
    }
}

fn slot(kind: ProviderKind, provider: &Arc<dyn SearchProvider>, max_results: usize) -> FanOutSlot {
    FanOutSlot {
        kind,
        provider: provider.clone(),
        max_results,
    }
}

type Responder = Box<dyn Fn(&str, usize) -> Result<Vec<SearchHit>, ProviderError> + Send + Sync>;

/// A scripted search provider for tests.
pub struct MockSearchProvider {
    name: String,
    responder: Responder,
    delay: Option<Duration>,
    queries: Mutex<Vec<(String, usize)>>,
}

impl MockSearchProvider {
    /// A provider that finds nothing.
    pub fn empty(name: &str) -> Self {
        Self::from_fn(name, |_, _| Ok(Vec::new()))
    }

    /// A provider that fails every call.
    pub fn failing(name: &str) -> Self {
        let provider = name.to_string();
        Self::from_fn(name, move |_, _| {
            Err(ProviderError::Request {
                provider: provider.clone(),
                message: "connection refused".to_string(),
            })
        })
    }

    pub fn from_fn<F>(name: &str, respond: F) -> Self
    where
        F: Fn(&str, usize) -> Result<Vec<SearchHit>, ProviderError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            responder: Box::new(respond),
            delay: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering, to shuffle completion order.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queries received so far with the requested result counts.
    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((query.to_string(), max_results));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(query, max_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search_degrades_failure_to_empty() {
        let provider = MockSearchProvider::failing("web");
        assert!(provider.fetch("q", 3).await.is_err());
        assert!(provider.search("q", 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_truncates_to_max() {
        let provider = MockSearchProvider::from_fn("arxiv", |q, _| {
            Ok((0..5)
                .map(|i| SearchHit::new(format!("{q} {i}"), format!("https://x/{i}"), ""))
                .collect())
        });
        let hits = provider.search("llm", 3).await;
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "llm 0");
        assert_eq!(provider.queries(), vec![("llm".to_string(), 3)]);
    }

    #[tokio::test]
    async fn test_unauthenticated_is_empty() {
        let provider = MockSearchProvider::from_fn("kaggle", |_, _| {
            Err(ProviderError::Unauthenticated {
                provider: "kaggle".into(),
            })
        });
        assert!(provider.search("q", 3).await.is_empty());
    }

    #[test]
    fn test_fan_out_order_and_sizes() {
        let set = ProviderSet::uniform(Arc::new(MockSearchProvider::empty("mock")));
        let slots = set.fan_out(&ResearchConfig::default());
        let kinds: Vec<_> = slots.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ProviderKind::Academic,
                ProviderKind::Web,
                ProviderKind::PlatformCompetition,
                ProviderKind::PlatformDataset,
                ProviderKind::PlatformNotebook,
                ProviderKind::PlatformDiscussion,
            ]
        );
        let sizes: Vec<_> = slots.iter().map(|s| s.max_results).collect();
        assert_eq!(sizes, vec![3, 3, 3, 3, 3, 10]);

        let rewrite: Vec<_> = set
            .rewrite_targets(&ResearchConfig::default())
            .iter()
            .map(|s| s.kind)
            .collect();
        assert_eq!(rewrite, vec![ProviderKind::Academic, ProviderKind::Web]);
    }
}
