use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

use crate::error::MaintenanceError;

/// Errors from a single platform request.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("API ({url}) returned error ({status}): {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ClientError {
    fn is_retryable(&self) -> bool {
        match self {
            ClientError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            ClientError::Request { .. } => true,
        }
    }
}

/// Retry behavior for read requests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }
}

impl RetryConfig {
    /// delay = base_delay_ms * 2^(attempt - 1), saturating at `u64::MAX`.
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        self.base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// JSON-over-HTTP client for the platform API, shared by every HTTP adapter.
pub struct PlatformClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_key_header: String,
    retry: RetryConfig,
}

impl PlatformClient {
    pub fn new(
        base_url: String,
        api_key: String,
        api_key_header: String,
        verify_tls: bool,
        retry: RetryConfig,
    ) -> Result<Self, MaintenanceError> {
        if base_url.is_empty() {
            return Err(MaintenanceError::Config(
                "base_url is not set (config file or MAINTCTL_BASE_URL)".into(),
            ));
        }
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .danger_accept_invalid_certs(!verify_tls)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            api_key_header,
            retry,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GETs `path`, retrying transient failures with exponential backoff.
    pub async fn get_json(&self, path: &str) -> Result<Value, ClientError> {
        let mut attempt = 1;
        loop {
            match self.send(Method::GET, path, None).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay_ms = self.retry.delay_for_attempt(attempt);
                    debug!(path, attempt, delay_ms, error = %e, "Retrying GET");
                    sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Sends a single state-changing request. Never retried here: the
    /// transition engine owns the retry budget for actions.
    pub async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        self.send(method, path, body).await
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, ClientError> {
        let url = self.url(path);
        let mut request = self
            .client
            .request(method, &url)
            .header(self.api_key_header.as_str(), &self.api_key)
            .header("content-type", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|source| ClientError::Request {
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| ClientError::Request {
            url: url.clone(),
            source,
        })?;
        if !status.is_success() {
            return Err(ClientError::Status {
                url,
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}
