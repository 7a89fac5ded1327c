//! Kaggle search adapter for the competition, dataset and notebook facets.
//!
//! Talks to the Kaggle REST API with HTTP basic auth. Credentials come from
//! environment variables or a `kaggle.json` file; without them every call
//! reports [`ProviderError::Unauthenticated`].

use async_trait::async_trait;
use delve_core::config::SearchConfig;
use delve_core::error::ProviderError;
use delve_core::evidence::SearchHit;
use delve_core::sources::SearchProvider;
use serde::Deserialize;
use std::fmt;
use std::fmt::Display;
use std::path::{Path, PathBuf};

const KAGGLE_API_BASE: &str = "https://www.kaggle.com/api/v1";
const KAGGLE_SITE: &str = "https://www.kaggle.com";

/// Kaggle API username and key.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct KaggleCredentials {
    pub username: String,
    pub key: String,
}

impl fmt::Debug for KaggleCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KaggleCredentials")
            .field("username", &self.username)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl KaggleCredentials {
    /// Resolve credentials: environment variables first, then the
    /// configured (or default `~/.kaggle/kaggle.json`) credentials file.
    pub fn resolve(config: &SearchConfig) -> Option<Self> {
        Self::from_env(&config.kaggle_username_env, &config.kaggle_key_env).or_else(|| {
            let path = config
                .kaggle_credentials_file
                .clone()
                .or_else(default_credentials_path)?;
            Self::from_file(&path)
        })
    }

    pub fn from_env(username_env: &str, key_env: &str) -> Option<Self> {
        let username = std::env::var(username_env).ok().filter(|v| !v.is_empty())?;
        let key = std::env::var(key_env).ok().filter(|v| !v.is_empty())?;
        Some(Self { username, key })
    }

    /// Read a `kaggle.json` file. Missing or malformed files yield `None`.
    pub fn from_file(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str::<Self>(&content) {
            Ok(creds) if !creds.username.is_empty() && !creds.key.is_empty() => Some(creds),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed Kaggle credentials file");
                None
            }
        }
    }
}

fn default_credentials_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".kaggle").join("kaggle.json"))
}

/// Which Kaggle listing a [`KaggleSearch`] queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KaggleFacet {
    Competitions,
    Datasets,
    Notebooks,
}

impl KaggleFacet {
    pub fn provider_name(&self) -> &'static str {
        match self {
            KaggleFacet::Competitions => "kaggle-competitions",
            KaggleFacet::Datasets => "kaggle-datasets",
            KaggleFacet::Notebooks => "kaggle-notebooks",
        }
    }

    fn list_path(&self) -> &'static str {
        match self {
            KaggleFacet::Competitions => "competitions/list",
            KaggleFacet::Datasets => "datasets/list",
            KaggleFacet::Notebooks => "kernels/list",
        }
    }

    fn page_path(&self) -> &'static str {
        match self {
            KaggleFacet::Competitions => "competitions",
            KaggleFacet::Datasets => "datasets",
            KaggleFacet::Notebooks => "code",
        }
    }

    /// Public page for a listing `ref`. Some listings already carry a full URL.
    pub fn page_url(&self, reference: &str) -> String {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            reference.to_string()
        } else {
            format!("{}/{}/{}", KAGGLE_SITE, self.page_path(), reference)
        }
    }

    /// Parse a listing response into hits.
    pub fn parse(&self, body: &str) -> Result<Vec<SearchHit>, ProviderError> {
        let parse_error = |e: serde_json::Error| ProviderError::Parse {
            provider: self.provider_name().to_string(),
            message: e.to_string(),
        };
        let hits = match self {
            KaggleFacet::Competitions => serde_json::from_str::<Vec<Competition>>(body)
                .map_err(parse_error)?
                .into_iter()
                .map(|c| {
                    let summary = format!(
                        "{} | Deadline: {} | Reward: {}",
                        c.description.unwrap_or_default(),
                        or_unknown(c.deadline),
                        or_unknown(c.reward),
                    );
                    SearchHit::new(c.title, self.page_url(&c.reference), summary)
                })
                .collect(),
            KaggleFacet::Datasets => serde_json::from_str::<Vec<Dataset>>(body)
                .map_err(parse_error)?
                .into_iter()
                .map(|d| {
                    let summary = format!(
                        "{} | Size: {} bytes | Downloads: {}",
                        d.subtitle.unwrap_or_default(),
                        or_unknown(d.total_bytes),
                        or_unknown(d.download_count),
                    );
                    SearchHit::new(d.title, self.page_url(&d.reference), summary)
                })
                .collect(),
            KaggleFacet::Notebooks => serde_json::from_str::<Vec<Kernel>>(body)
                .map_err(parse_error)?
                .into_iter()
                .map(|k| {
                    let summary = format!(
                        "Author: {} | Votes: {} | Language: {}",
                        or_unknown(k.author),
                        or_unknown(k.total_votes),
                        or_unknown(k.language),
                    );
                    SearchHit::new(k.title, self.page_url(&k.reference), summary)
                })
                .collect(),
        };
        Ok(hits)
    }
}

fn or_unknown<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Competition {
    #[serde(rename = "ref")]
    reference: String,
    title: String,
    description: Option<String>,
    deadline: Option<String>,
    reward: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Dataset {
    #[serde(rename = "ref")]
    reference: String,
    title: String,
    subtitle: Option<String>,
    total_bytes: Option<u64>,
    download_count: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Kernel {
    #[serde(rename = "ref")]
    reference: String,
    title: String,
    author: Option<String>,
    total_votes: Option<i64>,
    language: Option<String>,
}

/// One Kaggle facet.
pub struct KaggleSearch {
    client: reqwest::Client,
    facet: KaggleFacet,
    credentials: Option<KaggleCredentials>,
    base_url: String,
    timeout_secs: u64,
}

impl KaggleSearch {
    pub fn new(
        facet: KaggleFacet,
        credentials: Option<KaggleCredentials>,
        config: &SearchConfig,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: crate::http_client(facet.provider_name(), config)?,
            facet,
            credentials,
            base_url: KAGGLE_API_BASE.to_string(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// Point the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn list_url(&self, query: &str, max_results: usize) -> String {
        let mut url = format!(
            "{}/{}?search={}&page=1",
            self.base_url.trim_end_matches('/'),
            self.facet.list_path(),
            urlencoding::encode(query),
        );
        if self.facet == KaggleFacet::Notebooks {
            url.push_str(&format!("&pageSize={}", max_results));
        }
        url
    }
}

#[async_trait]
impl SearchProvider for KaggleSearch {
    fn name(&self) -> &str {
        self.facet.provider_name()
    }

    async fn fetch(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ProviderError> {
        let Some(creds) = &self.credentials else {
            return Err(ProviderError::Unauthenticated {
                provider: self.name().to_string(),
            });
        };
        let url = self.list_url(query, max_results);
        tracing::debug!(provider = self.name(), %url, "Kaggle search");

        let request = self
            .client
            .get(&url)
            .basic_auth(&creds.username, Some(&creds.key));
        let body = crate::get_text(self.name(), self.timeout_secs, request).await?;
        let mut hits = self.facet.parse(&body)?;
        hits.truncate(max_results);
        Ok(hits)
    }
}
