//! `POST /api/chat`

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::agent_core::ChatResponse;
use crate::inference::types::{ChatMessage, CompletionParams};

use super::error::ApiError;
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ChatRequest {
    fn params(&self) -> Result<CompletionParams, ApiError> {
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ApiError::bad_request(format!(
                    "temperature must be within 0.0..=2.0, got {t}"
                )));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(ApiError::bad_request("max_tokens must be positive"));
        }
        Ok(CompletionParams {
            model: self.model.clone().filter(|m| !m.trim().is_empty()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })
    }
}

pub(crate) async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;
    if request.messages.is_empty() {
        return Err(ApiError::bad_request("messages must not be empty"));
    }
    let params = request.params()?;

    let response = state
        .orchestrator
        .respond(request.messages, &params, request.session_id)
        .await?;
    Ok(Json(response))
}
