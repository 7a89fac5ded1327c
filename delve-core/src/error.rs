//! Error types for the Delve research core.
//!
//! Uses `thiserror` for public API error types. Oracle failures are fatal to a
//! run; provider failures are recovered at the adapter boundary and only ever
//! appear in logs.

use crate::research::Stage;
use std::path::PathBuf;

/// Top-level error type for the Delve core library.
#[derive(Debug, thiserror::Error)]
pub enum DelveError {
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),
}

/// Errors from the reasoning oracle.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

impl OracleError {
    /// Whether the error is transient and worth retrying inside the client.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            OracleError::RateLimited { .. }
                | OracleError::Timeout { .. }
                | OracleError::Connection { .. }
        )
    }
}

/// Errors from a search provider adapter.
///
/// These never cross `SearchProvider::search`; they degrade to an empty
/// result list there.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {message}")]
    Request { provider: String, message: String },

    #[error("{provider} returned HTTP {status}")]
    Status { provider: String, status: u16 },

    #[error("{provider} response could not be parsed: {message}")]
    Parse { provider: String, message: String },

    #[error("{provider} is not authenticated")]
    Unauthenticated { provider: String },

    #[error("{provider} timed out after {timeout_secs}s")]
    Timeout { provider: String, timeout_secs: u64 },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from the workflow engine.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Research run was cancelled during {stage}")]
    Cancelled { stage: Stage },

    #[error("Research query is empty")]
    EmptyQuery,

    #[error("Unknown provider kind: {tag}")]
    UnknownProviderKind { tag: String },
}

/// A type alias for results using the top-level `DelveError`.
pub type Result<T> = std::result::Result<T, DelveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_oracle() {
        let err = DelveError::Oracle(OracleError::ApiRequest {
            message: "connection refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "Oracle error: API request failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_workflow() {
        let err = DelveError::Workflow(WorkflowError::Cancelled {
            stage: Stage::Searching,
        });
        assert_eq!(
            err.to_string(),
            "Workflow error: Research run was cancelled during searching"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = DelveError::Config(ConfigError::FileNotFound {
            path: PathBuf::from("delve.toml"),
        });
        assert_eq!(
            err.to_string(),
            "Configuration error: Configuration file not found: delve.toml"
        );
    }

    #[test]
    fn test_provider_error_variants() {
        let err = ProviderError::Status {
            provider: "arxiv".into(),
            status: 503,
        };
        assert_eq!(err.to_string(), "arxiv returned HTTP 503");

        let err = ProviderError::Unauthenticated {
            provider: "kaggle".into(),
        };
        assert_eq!(err.to_string(), "kaggle is not authenticated");
    }

    #[test]
    fn test_transient_classification() {
        assert!(OracleError::RateLimited { retry_after_secs: 5 }.is_transient());
        assert!(OracleError::Timeout { timeout_secs: 300 }.is_transient());
        assert!(
            OracleError::Connection {
                message: "reset".into()
            }
            .is_transient()
        );
        assert!(
            !OracleError::AuthFailed {
                provider: "bedrock".into()
            }
            .is_transient()
        );
        assert!(
            !OracleError::ResponseParse {
                message: "bad json".into()
            }
            .is_transient()
        );
    }
}
