//! Anthropic Messages API client.
//!
//! Sends one non-streaming `POST /v1/messages` request per call. No retries
//! and no fallback models: every failure is returned to the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::config::ModelConfig;
use super::errors::InferenceError;
use super::types::{MessagesRequest, MessagesResponse};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// API version header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

// ─── ModelApi ────────────────────────────────────────────────────────────────

/// The model boundary the orchestrator talks to.
#[async_trait]
pub trait ModelApi: Send + Sync {
    async fn create_message(
        &self,
        request: MessagesRequest,
    ) -> Result<MessagesResponse, InferenceError>;
}

// ─── MessagesClient ──────────────────────────────────────────────────────────

/// HTTP client for the hosted Messages API.
pub struct MessagesClient {
    http: HttpClient,
    api_key: String,
    base_url: String,
    request_timeout: Duration,
}

impl MessagesClient {
    /// Build a client. Fails when no API key is configured.
    ///
    /// Does NOT check connectivity; that happens on the first request.
    pub fn new(config: &ModelConfig) -> Result<Self, InferenceError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| InferenceError::ConfigError {
                reason: format!(
                    "no API key configured (set {} or api_key in the model config)",
                    super::config::API_KEY_ENV
                ),
            })?;

        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: config.base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.clone(),
            request_timeout,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

#[async_trait]
impl ModelApi for MessagesClient {
    async fn create_message(
        &self,
        request: MessagesRequest,
    ) -> Result<MessagesResponse, InferenceError> {
        let url = self.messages_url();

        tracing::info!(
            url = %url,
            model = %request.model,
            tools = request.tools.as_ref().map_or(0, Vec::len),
            max_tokens = request.max_tokens,
            "sending messages request"
        );

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout {
                        duration_secs: self.request_timeout.as_secs(),
                    }
                } else {
                    InferenceError::ConnectionFailed {
                        endpoint: url.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body_text, "model API error");
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let body_text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout {
                    duration_secs: self.request_timeout.as_secs(),
                }
            } else {
                InferenceError::InvalidResponse {
                    reason: format!("failed to read response body: {e}"),
                }
            }
        })?;

        let parsed: MessagesResponse =
            serde_json::from_str(&body_text).map_err(|e| InferenceError::InvalidResponse {
                reason: format!("failed to decode response: {e}"),
            })?;

        tracing::debug!(
            id = %parsed.id,
            blocks = parsed.content.len(),
            stop_reason = ?parsed.stop_reason,
            "messages response received"
        );
        Ok(parsed)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
