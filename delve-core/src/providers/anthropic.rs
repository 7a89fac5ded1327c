//! Anthropic Messages API oracle.
//!
//! Auth via `x-api-key` plus the required `anthropic-version` header. The
//! role instruction is sent as the top-level `system` field and the task
//! prompt as the single user message.

use super::{extract_text, http_client, map_http_error, map_transport_error, messages_body, with_retry};
use crate::config::{OracleConfig, RetryConfig};
use crate::error::OracleError;
use crate::oracle::Oracle;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

/// The default Anthropic API base URL.
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// The required Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

const LABEL: &str = "Anthropic API";

/// Oracle backed by the Anthropic Messages API.
pub struct AnthropicOracle {
    client: Client,
    base_url: String,
    api_key: String,
    config: OracleConfig,
}

impl AnthropicOracle {
    /// Create a new Anthropic oracle from configuration.
    ///
    /// Reads the API key from the environment variable named by
    /// `config.api_key_env`; returns `OracleError::AuthFailed` if it is unset.
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| OracleError::AuthFailed {
            provider: format!("Anthropic (env var '{}' not set)", config.api_key_env),
        })?;
        Self::new_with_key(config, api_key)
    }

    /// Create a new Anthropic oracle with an explicitly provided API key.
    pub fn new_with_key(config: &OracleConfig, api_key: String) -> Result<Self, OracleError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            client: http_client(config)?,
            base_url,
            api_key,
            config: config.clone(),
        })
    }

    fn build_request_body(&self, role: &str, prompt: &str) -> Value {
        let mut body = messages_body(&self.config, role, prompt);
        body["model"] = Value::String(self.config.model.clone());
        body
    }

    async fn send_once(&self, body: &Value) -> Result<String, OracleError> {
        let url = format!("{}/messages", self.base_url);
        let timeout_secs = self.config.timeout_secs;

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| map_transport_error(LABEL, e, timeout_secs))?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| map_transport_error(LABEL, e, timeout_secs))?;

        if !status.is_success() {
            return Err(map_http_error(LABEL, status, &body_text, timeout_secs));
        }

        let response_json: Value =
            serde_json::from_str(&body_text).map_err(|e| OracleError::ResponseParse {
                message: format!("Invalid JSON in response: {}", e),
            })?;

        extract_text(&response_json)
    }

    fn retry_config(&self) -> &RetryConfig {
        &self.config.retry
    }
}

#[async_trait]
impl Oracle for AnthropicOracle {
    async fn invoke(&self, role: &str, prompt: &str) -> Result<String, OracleError> {
        let body = self.build_request_body(role, prompt);
        debug!(
            model = self.config.model.as_str(),
            prompt_chars = prompt.len(),
            "Sending Anthropic completion request"
        );
        with_retry(self.retry_config(), || self.send_once(&body)).await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
