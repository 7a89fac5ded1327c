//! # Delve Tools
//!
//! Search provider adapters for the Delve research loop.
//! Provides arXiv paper search, DuckDuckGo web search (also used for the
//! discussion facet), and the Kaggle competition, dataset and notebook
//! listings.

pub mod arxiv;
pub mod kaggle;
mod text;
pub mod web;

use delve_core::config::SearchConfig;
use delve_core::error::ProviderError;
use delve_core::sources::ProviderSet;
use std::sync::Arc;
use std::time::Duration;

pub use arxiv::ArxivSearch;
pub use kaggle::{KaggleCredentials, KaggleFacet, KaggleSearch};
pub use web::WebSearch;

/// Build the production provider set, one adapter per slot.
///
/// Kaggle slots are always present; without credentials they report
/// [`ProviderError::Unauthenticated`] and contribute nothing.
pub fn default_providers(config: &SearchConfig) -> Result<ProviderSet, ProviderError> {
    let credentials = KaggleCredentials::resolve(config);
    if credentials.is_none() {
        tracing::info!("No Kaggle credentials found; Kaggle facets will return no results");
    }
    Ok(ProviderSet {
        academic: Arc::new(ArxivSearch::new(config)?),
        web: Arc::new(WebSearch::new(config)?),
        competitions: Arc::new(KaggleSearch::new(
            KaggleFacet::Competitions,
            credentials.clone(),
            config,
        )?),
        datasets: Arc::new(KaggleSearch::new(
            KaggleFacet::Datasets,
            credentials.clone(),
            config,
        )?),
        notebooks: Arc::new(KaggleSearch::new(
            KaggleFacet::Notebooks,
            credentials,
            config,
        )?),
        discussions: Arc::new(WebSearch::restricted_to(&config.discussion_site, config)?),
    })
}

/// Shared HTTP client for one adapter.
pub(crate) fn http_client(provider: &str, config: &SearchConfig) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(&config.user_agent)
        .build()
        .map_err(|e| ProviderError::Request {
            provider: provider.to_string(),
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// Map a transport failure to a provider error.
pub(crate) fn request_error(provider: &str, timeout_secs: u64, e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout {
            provider: provider.to_string(),
            timeout_secs,
        }
    } else {
        ProviderError::Request {
            provider: provider.to_string(),
            message: e.to_string(),
        }
    }
}

/// Send `request` and return the body, failing on non-success statuses.
pub(crate) async fn get_text(
    provider: &str,
    timeout_secs: u64,
    request: reqwest::RequestBuilder,
) -> Result<String, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| request_error(provider, timeout_secs, e))?;

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ProviderError::Unauthenticated {
            provider: provider.to_string(),
        });
    }
    if !status.is_success() {
        return Err(ProviderError::Status {
            provider: provider.to_string(),
            status: status.as_u16(),
        });
    }

    response
        .text()
        .await
        .map_err(|e| request_error(provider, timeout_secs, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_providers_builds_every_slot() {
        let config = SearchConfig {
            kaggle_username_env: "DELVE_TEST_NO_SUCH_USER".into(),
            kaggle_key_env: "DELVE_TEST_NO_SUCH_KEY".into(),
            kaggle_credentials_file: Some("/nonexistent/kaggle.json".into()),
            ..SearchConfig::default()
        };
        let providers = default_providers(&config).unwrap();
        assert_eq!(providers.academic.name(), "arxiv");
        assert_eq!(providers.web.name(), "web");
        assert_eq!(providers.competitions.name(), "kaggle-competitions");
        assert_eq!(providers.datasets.name(), "kaggle-datasets");
        assert_eq!(providers.notebooks.name(), "kaggle-notebooks");
        assert_eq!(providers.discussions.name(), "web:kaggle.com/discussions");
    }
}
