//! AWS Bedrock Runtime oracle.
//!
//! Calls `InvokeModel` with an Anthropic Messages body and signs each request
//! with AWS Signature Version 4. Credentials come from the standard
//! `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`
//! environment variables.

use super::{
    extract_text, hex, http_client, map_http_error, map_transport_error, messages_body, with_retry,
};
use crate::config::OracleConfig;
use crate::error::OracleError;
use crate::oracle::Oracle;
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Url};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Body field required by Anthropic models on Bedrock.
const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

const SIGNING_SERVICE: &str = "bedrock";

const LABEL: &str = "Bedrock";

/// Static AWS credentials.
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AwsCredentials {
    /// Read credentials from the environment.
    pub fn from_env() -> Result<Self, OracleError> {
        let read = |var: &str| {
            std::env::var(var).map_err(|_| OracleError::AuthFailed {
                provider: format!("Bedrock (env var '{}' not set)", var),
            })
        };
        Ok(Self {
            access_key_id: read("AWS_ACCESS_KEY_ID")?,
            secret_access_key: read("AWS_SECRET_ACCESS_KEY")?,
            session_token: std::env::var("AWS_SESSION_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
        })
    }
}

/// Oracle backed by AWS Bedrock Runtime.
pub struct BedrockOracle {
    client: Client,
    endpoint: Url,
    credentials: AwsCredentials,
    config: OracleConfig,
}

impl BedrockOracle {
    /// Create a Bedrock oracle using credentials from the environment.
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        Self::new_with_credentials(config, AwsCredentials::from_env()?)
    }

    pub fn new_with_credentials(
        config: &OracleConfig,
        credentials: AwsCredentials,
    ) -> Result<Self, OracleError> {
        let base = config
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", config.region));
        let path = format!("/model/{}/invoke", urlencoding::encode(&config.model));
        let endpoint = Url::parse(&base)
            .and_then(|url| url.join(&path))
            .map_err(|e| OracleError::ApiRequest {
                message: format!("Invalid Bedrock endpoint '{}': {}", base, e),
            })?;

        Ok(Self {
            client: http_client(config)?,
            endpoint,
            credentials,
            config: config.clone(),
        })
    }

    fn build_request_body(&self, role: &str, prompt: &str) -> Value {
        let mut body = messages_body(&self.config, role, prompt);
        body["anthropic_version"] = Value::String(BEDROCK_ANTHROPIC_VERSION.to_string());
        body
    }

    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    async fn send_once(&self, payload: &[u8]) -> Result<String, OracleError> {
        let timeout_secs = self.config.timeout_secs;
        let amz_date = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let host = self.host();

        let mut headers = vec![
            ("content-type", "application/json".to_string()),
            ("host", host),
            ("x-amz-date", amz_date.clone()),
        ];
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token", token.clone()));
        }
        let authorization = sign_v4(
            &self.credentials,
            &self.config.region,
            SIGNING_SERVICE,
            &amz_date,
            "POST",
            &canonical_uri(self.endpoint.path()),
            &headers,
            payload,
        );

        let mut request = self.client.post(self.endpoint.clone());
        for (name, value) in &headers {
            if *name != "host" {
                request = request.header(*name, value);
            }
        }
        let response = request
            .header("accept", "application/json")
            .header("authorization", authorization)
            .body(payload.to_vec())
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
}

#[async_trait]
impl Oracle for BedrockOracle {
    async fn invoke(&self, role: &str, prompt: &str) -> Result<String, OracleError> {
        let body = self.build_request_body(role, prompt);
        let payload = serde_json::to_vec(&body).map_err(|e| OracleError::ApiRequest {
            message: format!("Failed to encode request body: {}", e),
        })?;
        debug!(
            model = self.config.model.as_str(),
            region = self.config.region.as_str(),
            prompt_chars = prompt.len(),
            "Sending Bedrock InvokeModel request"
        );
        with_retry(&self.config.retry, || self.send_once(&payload)).await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Canonical URI for SigV4: every path segment is URI-encoded again, so an
/// already-encoded `%3A` becomes `%253A`.
fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Derive the SigV4 signing key for one day, region and service.
fn signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// Compute the `Authorization` header value for a request without a query
/// string. `headers` must have lowercase names sorted by name.
#[allow(clippy::too_many_arguments)]
fn sign_v4(
    credentials: &AwsCredentials,
    region: &str,
    service: &str,
    amz_date: &str,
    method: &str,
    canonical_uri: &str,
    headers: &[(&str, String)],
    payload: &[u8],
) -> String {
    let date_stamp = &amz_date[..8];
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        method,
        canonical_uri,
        canonical_headers,
        signed_headers,
        sha256_hex(payload)
    );

    let scope = format!("{}/{}/{}/aws4_request", date_stamp, region, service);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        scope,
        sha256_hex(canonical_request.as_bytes())
    );

    let key = signing_key(&credentials.secret_access_key, date_stamp, region, service);
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

    format!(
        "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
        credentials.access_key_id, scope, signed_headers, signature
    )
}
