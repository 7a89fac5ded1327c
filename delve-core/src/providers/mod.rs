//! Oracle implementations.
//!
//! Provides concrete implementations of the `Oracle` trait for:
//! - AWS Bedrock Runtime (`InvokeModel` with SigV4 signing), the default
//! - Anthropic Messages API
//!
//! Use `create_oracle()` to instantiate the appropriate oracle based on config.

pub mod anthropic;
pub mod bedrock;

use crate::config::OracleConfig;
use crate::error::OracleError;
use crate::oracle::Oracle;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub use crate::config::RetryConfig;
pub use anthropic::AnthropicOracle;
pub use bedrock::{AwsCredentials, BedrockOracle};

/// Execute an async operation with exponential backoff retry on transient errors.
///
/// Retries on `OracleError::RateLimited` (respects `retry_after_secs`),
/// `OracleError::Connection`, and `OracleError::Timeout`. Permanent errors
/// (auth, parse) return immediately.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T, OracleError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, OracleError>>,
{
    let mut last_err = None;
    for attempt in 0..=config.max_retries {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if !e.is_transient() || attempt == config.max_retries {
                    return Err(e);
                }

                let backoff_ms = compute_backoff(config, attempt, &e);
                tracing::warn!(
                    attempt = attempt + 1,
                    max = config.max_retries,
                    backoff_ms = backoff_ms,
                    error = %e,
                    "Retrying oracle call after transient error"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| OracleError::Connection {
        message: "All retry attempts exhausted".to_string(),
    }))
}

/// Compute backoff delay, respecting the server's retry-after on rate limits.
fn compute_backoff(config: &RetryConfig, attempt: u32, err: &OracleError) -> u64 {
    if let OracleError::RateLimited { retry_after_secs } = err {
        let server_ms = retry_after_secs * 1000;
        let computed = compute_exponential_backoff(config, attempt);
        return server_ms.max(computed);
    }
    compute_exponential_backoff(config, attempt)
}

/// Pure exponential backoff with optional jitter.
fn compute_exponential_backoff(config: &RetryConfig, attempt: u32) -> u64 {
    let base = config.initial_backoff_ms as f64 * config.backoff_multiplier.powi(attempt as i32);
    let capped = base.min(config.max_backoff_ms as f64) as u64;
    if config.jitter {
        // Up to 25% jitter.
        let jitter = (capped as f64 * 0.25 * rand_simple()) as u64;
        capped + jitter
    } else {
        capped
    }
}

fn rand_simple() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

/// Build the Anthropic Messages body shared by both backends.
///
/// The caller adds the backend-specific `model` or `anthropic_version` key.
pub(crate) fn messages_body(config: &OracleConfig, role: &str, prompt: &str) -> Value {
    serde_json::json!({
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
        "system": role,
        "messages": [
            { "role": "user", "content": prompt }
        ],
    })
}

/// Concatenate the text blocks of a Messages response.
pub(crate) fn extract_text(body: &Value) -> Result<String, OracleError> {
    let blocks = body["content"]
        .as_array()
        .ok_or_else(|| OracleError::ResponseParse {
            message: "Missing 'content' array in response".to_string(),
        })?;

    let mut text = String::new();
    for block in blocks {
        match block["type"].as_str().unwrap_or("text") {
            "text" => text.push_str(block["text"].as_str().unwrap_or("")),
            other => debug!(block_type = other, "Ignoring non-text content block"),
        }
    }
    Ok(text)
}

/// Map an HTTP status code to the appropriate `OracleError`.
pub(crate) fn map_http_error(
    label: &str,
    status: reqwest::StatusCode,
    body_text: &str,
    timeout_secs: u64,
) -> OracleError {
    match status.as_u16() {
        401 | 403 => OracleError::AuthFailed {
            provider: label.to_string(),
        },
        429 => {
            let retry_after = serde_json::from_str::<Value>(body_text)
                .ok()
                .and_then(|v| v["error"]["retry_after_secs"].as_u64())
                .unwrap_or(30);
            OracleError::RateLimited {
                retry_after_secs: retry_after,
            }
        }
        408 | 504 => OracleError::Timeout { timeout_secs },
        _ => OracleError::ApiRequest {
            message: format!("HTTP {} from {}: {}", status, label, body_text),
        },
    }
}

/// Map a transport failure from reqwest.
pub(crate) fn map_transport_error(label: &str, err: reqwest::Error, timeout_secs: u64) -> OracleError {
    if err.is_timeout() {
        OracleError::Timeout { timeout_secs }
    } else if err.is_connect() || err.is_request() {
        OracleError::Connection {
            message: format!("Request to {} failed: {}", label, err),
        }
    } else {
        OracleError::ApiRequest {
            message: format!("Request to {} failed: {}", label, err),
        }
    }
}

pub(crate) fn http_client(config: &OracleConfig) -> Result<reqwest::Client, OracleError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| OracleError::Connection {
            message: format!("Failed to build HTTP client: {}", e),
        })
}

/// Create an oracle based on the configuration.
///
/// - `"bedrock"` → `BedrockOracle` (AWS credentials from the environment)
/// - `"anthropic"` → `AnthropicOracle` (API key from `api_key_env`)
pub fn create_oracle(config: &OracleConfig) -> Result<Arc<dyn Oracle>, OracleError> {
    match config.provider.as_str() {
        "bedrock" => Ok(Arc::new(BedrockOracle::new(config)?)),
        "anthropic" => Ok(Arc::new(AnthropicOracle::new(config)?)),
        other => Err(OracleError::ApiRequest {
            message: format!(
                "Unknown oracle provider '{}'; expected 'bedrock' or 'anthropic'",
                other
            ),
        }),
    }
}

/// Lowercase hex encoding.
pub(crate) mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes
            .as_ref()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}
