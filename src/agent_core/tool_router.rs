//! Dispatches model tool calls to the database gateway.
//!
//! The ToolRouter is the bridge between the model's tool call decisions and
//! the database. It handles:
//! - Validation through the tool registry (nothing invalid is executed)
//! - Concurrent execution of every call in one reply
//! - Conversion of every failure into a textual tool result
//! - Size capping of payloads before they reach the model

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde_json::{json, Value};

use crate::database::{ColumnInfo, DatabaseError, DatabaseGateway};
use crate::inference::types::ToolCall;
use crate::tools::{ToolRegistry, ToolRequest};

use super::truncate::cap_tool_result;
use super::types::{ToolErrorKind, ToolOutcome, ToolResult};

// ─── ToolRouter ─────────────────────────────────────────────────────────────

/// Validates and executes tool calls. Shared by every request.
pub struct ToolRouter {
    registry: Arc<ToolRegistry>,
    gateway: Arc<dyn DatabaseGateway>,
    /// Cap on the serialized payload sent to the model (0 disables).
    max_result_bytes: usize,
}

impl ToolRouter {
    pub fn new(
        registry: Arc<ToolRegistry>,
        gateway: Arc<dyn DatabaseGateway>,
        max_result_bytes: usize,
    ) -> Self {
        Self {
            registry,
            gateway,
            max_result_bytes,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn gateway(&self) -> &Arc<dyn DatabaseGateway> {
        &self.gateway
    }

    // ─── Dispatch ───────────────────────────────────────────────────────

    /// Execute every call of one reply concurrently.
    ///
    /// Results come back in the order of `tool_calls`; a failing call never
    /// affects its siblings.
    pub async fn dispatch_tool_calls(&self, tool_calls: &[ToolCall]) -> Vec<ToolResult> {
        join_all(tool_calls.iter().map(|tc| self.dispatch_single(tc))).await
    }

    /// Validate → execute → render a single call.
    pub async fn dispatch_single(&self, tool_call: &ToolCall) -> ToolResult {
        let start = Instant::now();

        let outcome = match self.registry.resolve(&tool_call.name, &tool_call.arguments) {
            Ok(request) => self.execute(&request).await,
            Err(e) => {
                tracing::warn!(
                    tool = %tool_call.name,
                    call_id = %tool_call.id,
                    error = %e,
                    "tool call rejected before execution"
                );
                ToolOutcome::failed(ToolErrorKind::from(&e), e.to_string())
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &outcome {
            ToolOutcome::Success(_) => tracing::info!(
                tool = %tool_call.name,
                call_id = %tool_call.id,
                elapsed_ms,
                "tool call succeeded"
            ),
            ToolOutcome::Failed { kind, message } => tracing::info!(
                tool = %tool_call.name,
                call_id = %tool_call.id,
                elapsed_ms,
                kind = kind.as_str(),
                error = %message,
                "tool call failed"
            ),
        }

        ToolResult {
            tool_call_id: tool_call.id.clone(),
            name: tool_call.name.clone(),
            content: self.render(&outcome),
            outcome,
        }
    }

    /// Run a direct (model-less) invocation by action name.
    pub async fn dispatch_direct(&self, action: &str, params: Value) -> ToolOutcome {
        match self.registry.resolve_direct(action, params) {
            Ok(request) => self.execute(&request).await,
            Err(e) => ToolOutcome::failed(ToolErrorKind::from(&e), e.to_string()),
        }
    }

    /// Execute an already validated request.
    pub async fn execute(&self, request: &ToolRequest) -> ToolOutcome {
        match self.run(request).await {
            Ok(payload) => ToolOutcome::Success(payload),
            Err(e) => ToolOutcome::failed(ToolErrorKind::from(&e), e.to_string()),
        }
    }

    async fn run(&self, request: &ToolRequest) -> Result<Value, DatabaseError> {
        let payload = match request {
            ToolRequest::ListTables => json!({ "tables": self.gateway.list_tables().await? }),
            ToolRequest::DescribeTable { table_name } => {
                let columns = self.gateway.describe_table(table_name).await?;
                let columns: Vec<ColumnInfo> = columns.iter().map(ColumnInfo::from).collect();
                json!({ "columns": columns })
            }
            ToolRequest::ExecuteQuery { query } => {
                to_payload(&self.gateway.execute_query(query).await?)?
            }
            ToolRequest::GetTableContent { table_name, query } => {
                to_payload(&self.gateway.table_content(table_name, query).await?)?
            }
        };
        Ok(payload)
    }

    /// Text handed to the model for an outcome.
    fn render(&self, outcome: &ToolOutcome) -> String {
        match outcome {
            ToolOutcome::Success(payload) => {
                cap_tool_result(payload.to_string(), self.max_result_bytes)
            }
            ToolOutcome::Failed { kind, message } => format!("{}: {message}", kind.as_str()),
        }
    }
}

fn to_payload<T: serde::Serialize>(value: &T) -> Result<Value, DatabaseError> {
    serde_json::to_value(value).map_err(|e| DatabaseError::Execution {
        reason: format!("result could not be serialized: {e}"),
    })
}

// ─── Tests ──────────────────────────────────────────────────────────────────
