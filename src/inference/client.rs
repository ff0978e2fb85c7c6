//! OpenAI-compatible model client.
//!
//! Sends non-streaming chat completion requests and parses the reply into a
//! [`ModelReply`]. Transient failures are retried with bounded exponential
//! backoff; the client itself holds no per-request state and is shared by
//! every in-flight request through an `Arc`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use crate::agent_core::truncate::truncate_utf8;

use super::config::ModelConfig;
use super::errors::InferenceError;
use super::response::parse_completion_response;
use super::types::{
    ChatCompletionRequest, ChatMessage, CompletionParams, ModelReply, ToolChoice, ToolDefinition,
};

/// Error bodies from the backend are cut to this many bytes before they are
/// logged or wrapped into an error.
const MAX_ERROR_BODY_BYTES: usize = 512;

/// Ceiling on the sleep between two attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

// ─── ChatModel ───────────────────────────────────────────────────────────────

/// The seam between the orchestrator and the model backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one completion over `messages`. Never mutates the conversation.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        tool_choice: Option<ToolChoice>,
        params: &CompletionParams,
    ) -> Result<ModelReply, InferenceError>;

    /// Model used when a request does not name one.
    fn default_model(&self) -> &str;
}

// ─── ModelClient ─────────────────────────────────────────────────────────────

/// HTTP client for the configured chat completion endpoint.
pub struct ModelClient {
    http: HttpClient,
    config: ModelConfig,
}

impl ModelClient {
    /// Build a client from config. Does NOT check connectivity; that happens
    /// on the first request.
    pub fn from_config(config: ModelConfig) -> Result<Self, InferenceError> {
        config.validate()?;

        let http = HttpClient::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: config.base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { http, config })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// A single HTTP round-trip, no retries.
    async fn try_complete(
        &self,
        body: &ChatCompletionRequest<'_>,
    ) -> Result<ModelReply, InferenceError> {
        let url = self.completions_url();

        let mut request = self.http.post(&url).json(body);
        if let Some(key) = self.config.api_key() {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout {
                    duration_secs: self.config.request_timeout_secs,
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
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: truncate_utf8(&body_text, MAX_ERROR_BODY_BYTES).to_string(),
            });
        }

        let body_text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout {
                    duration_secs: self.config.request_timeout_secs,
                }
            } else {
                InferenceError::MalformedResponse {
                    reason: format!("failed to read response body: {e}"),
                }
            }
        })?;

        parse_completion_response(&body_text, body.model)
    }
}

#[async_trait]
impl ChatModel for ModelClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        tool_choice: Option<ToolChoice>,
        params: &CompletionParams,
    ) -> Result<ModelReply, InferenceError> {
        let body = ChatCompletionRequest {
            model: params.model.as_deref().unwrap_or(&self.config.model_name),
            messages,
            tools: tools.filter(|t| !t.is_empty()),
            tool_choice: tools.filter(|t| !t.is_empty()).and(tool_choice),
            temperature: params.temperature.unwrap_or(self.config.temperature),
            max_tokens: params.max_tokens.or(self.config.max_tokens),
            stream: false,
        };

        // Log the request metadata (not the full body; it can be huge)
        tracing::info!(
            model = %body.model,
            message_count = body.messages.len(),
            tool_count = body.tools.map(<[ToolDefinition]>::len).unwrap_or(0),
            tool_choice = ?body.tool_choice,
            "model request"
        );

        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error: Option<InferenceError> = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = backoff_delay(self.config.retry_base_delay(), attempt);
                tokio::time::sleep(delay).await;
            }

            match self.try_complete(&body).await {
                Ok(reply) => {
                    tracing::info!(
                        model = %reply.model,
                        attempt,
                        tool_calls = reply.tool_calls.len(),
                        total_tokens = reply.usage.total_tokens,
                        finish_reason = ?reply.finish_reason,
                        "model reply"
                    );
                    return Ok(reply);
                }
                Err(e) if e.is_retriable() => {
                    tracing::warn!(attempt, max_attempts, error = %e, "model request failed, retrying");
                    last_error = Some(e);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "model request failed (not retriable)");
                    return Err(e);
                }
            }
        }

        Err(InferenceError::RetriesExhausted {
            attempts: max_attempts,
            last: Box::new(last_error.unwrap_or(InferenceError::MalformedResponse {
                reason: "no attempt was made".into(),
            })),
        })
    }

    fn default_model(&self) -> &str {
        &self.config.model_name
    }
}

/// Sleep before `attempt` (2-based): `base * 2^(attempt-2)`, capped.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(2));
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
