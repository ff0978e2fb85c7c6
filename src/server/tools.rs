//! `POST /api/tools`: run a tool directly, without the model.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::agent_core::ToolOutcome;

use super::error::ApiError;
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ToolInvocation {
    pub action: String,
    #[serde(default)]
    pub params: Value,
}

pub(crate) async fn invoke_tool(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ToolInvocation>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(invocation) = payload?;
    tracing::info!(action = %invocation.action, "direct tool invocation");

    let outcome = state
        .orchestrator
        .router()
        .dispatch_direct(&invocation.action, invocation.params)
        .await;
    into_json(outcome)
}

/// Success payload as the body, failures as structured errors.
pub(crate) fn into_json(outcome: ToolOutcome) -> Result<Json<Value>, ApiError> {
    match outcome {
        ToolOutcome::Success(payload) => Ok(Json(payload)),
        ToolOutcome::Failed { kind, message } => Err(ApiError::from_tool_failure(kind, message)),
    }
}
