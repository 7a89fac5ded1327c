//! Configuration system for Delve.
//!
//! Uses `figment` for layered configuration: defaults -> user file ->
//! workspace file -> explicit file -> environment -> CLI overrides.
//! Configuration is loaded from `~/.config/delve/config.toml` and/or
//! `.delve/config.toml` in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::research::{MAX_DEPTH, MAX_ITERATIONS};

/// Top-level configuration for Delve.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelveConfig {
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Reasoning oracle configuration.
///
/// Passed opaquely into the oracle at construction; the research loop never
/// reads these values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Backend name: "bedrock" or "anthropic".
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Cloud region (used by the Bedrock backend).
    pub region: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens to generate per call.
    pub max_tokens: usize,
    /// Request timeout. Generations can be long, so this defaults to minutes.
    pub timeout_secs: u64,
    /// Optional endpoint override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding the API key for the direct Anthropic backend.
    pub api_key_env: String,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: "bedrock".to_string(),
            model: "global.anthropic.claude-opus-4-5-20251101-v1:0".to_string(),
            region: "us-west-2".to_string(),
            temperature: 0.0,
            max_tokens: 4096,
            timeout_secs: 300,
            base_url: None,
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl OracleConfig {
    /// Validate this oracle config and return any warnings.
    ///
    /// Returns an empty Vec if the config looks sane.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !matches!(self.provider.as_str(), "bedrock" | "anthropic") {
            warnings.push(format!(
                "unknown oracle provider '{}'; expected 'bedrock' or 'anthropic'",
                self.provider
            ));
        }
        if self.temperature < 0.0 || self.temperature > 1.0 {
            warnings.push(format!(
                "temperature ({}) is outside the supported range 0.0–1.0",
                self.temperature
            ));
        }
        if self.max_tokens == 0 {
            warnings.push("max_tokens is 0; every generation will be empty".to_string());
        }
        if self.timeout_secs < 30 {
            warnings.push(format!(
                "timeout_secs ({}) is short for long generations",
                self.timeout_secs
            ));
        }
        warnings
    }
}

/// Retry policy for transient oracle failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Bounds and sample sizes for the research loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Planning/search rounds; clamped to `MAX_ITERATIONS`.
    pub max_iterations: usize,
    /// Deep-dive rounds; clamped to `MAX_DEPTH`.
    pub max_depth: usize,
    /// Results requested from each provider per sub-query.
    pub results_per_provider: usize,
    /// Results requested from the discussion search.
    pub discussion_results: usize,
    /// Only the most recent sub-queries are searched in a round.
    pub recent_subqueries: usize,
    /// Combined core-provider results below this mark a sub-query as low yield.
    pub low_yield_threshold: usize,
    /// Evidence records shown to the coverage evaluator.
    pub coverage_sample: usize,
    /// Evidence records shown to the verification analyst.
    pub verification_sample: usize,
    /// Candidate titles offered per deep-dive round.
    pub deep_dive_candidates: usize,
    /// Anchors followed per deep-dive round.
    pub deep_dive_picks: usize,
    /// Concurrent provider calls in flight.
    pub concurrency: usize,
    /// Language the outline and article are written in.
    pub language: String,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            max_depth: MAX_DEPTH,
            results_per_provider: 3,
            discussion_results: 10,
            recent_subqueries: 5,
            low_yield_threshold: 2,
            coverage_sample: 30,
            verification_sample: 20,
            deep_dive_candidates: 10,
            deep_dive_picks: 2,
            concurrency: 8,
            language: "English".to_string(),
        }
    }
}

impl ResearchConfig {
    /// Iteration cap actually enforced by the engine.
    pub fn iteration_cap(&self) -> usize {
        self.max_iterations.clamp(1, MAX_ITERATIONS)
    }

    /// Deep-dive cap actually enforced by the engine.
    pub fn depth_cap(&self) -> usize {
        self.max_depth.min(MAX_DEPTH)
    }
}

/// Search adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub kaggle_username_env: String,
    pub kaggle_key_env: String,
    /// Path to a `kaggle.json` credentials file; defaults to `~/.kaggle/kaggle.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kaggle_credentials_file: Option<PathBuf>,
    /// Site restriction used for the discussion facet.
    pub discussion_site: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: format!("Delve/{}", env!("CARGO_PKG_VERSION")),
            kaggle_username_env: "KAGGLE_USERNAME".to_string(),
            kaggle_key_env: "KAGGLE_KEY".to_string(),
            kaggle_credentials_file: None,
            discussion_site: "kaggle.com/discussions".to_string(),
        }
    }
}

/// Report persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("reports"),
        }
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `DELVE_`)
/// 3. Explicit config file (`--config`)
/// 4. Workspace-local config (`.delve/config.toml`)
/// 5. User config (`~/.config/delve/config.toml`)
/// 6. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
    overrides: Option<&DelveConfig>,
) -> Result<DelveConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(DelveConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "delve", "delve") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".delve").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = config_file {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    // DELVE_ORACLE__MODEL, DELVE_RESEARCH__LANGUAGE, ...
    figment = figment.merge(Env::prefixed("DELVE_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}
