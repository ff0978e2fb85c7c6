//! Shared types for the agent core.
//!
//! Tool results with their in-process outcome, and the metadata reported
//! back to callers about which tools ran.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::DatabaseError;
use crate::tools::ToolCallError;

// ─── Tool outcomes ──────────────────────────────────────────────────────────

/// Classification of a failed tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// Malformed or missing arguments; nothing was executed.
    Validation,
    /// Unknown tool, table or column.
    NotFound,
    /// The database rejected or failed the statement.
    Execution,
}

impl ToolErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolErrorKind::Validation => "validation_error",
            ToolErrorKind::NotFound => "not_found",
            ToolErrorKind::Execution => "execution_error",
        }
    }
}

impl From<&ToolCallError> for ToolErrorKind {
    fn from(err: &ToolCallError) -> Self {
        match err {
            ToolCallError::UnknownTool { .. } => ToolErrorKind::NotFound,
            ToolCallError::InvalidArguments { .. } => ToolErrorKind::Validation,
        }
    }
}

impl From<&DatabaseError> for ToolErrorKind {
    fn from(err: &DatabaseError) -> Self {
        if err.is_not_found() {
            ToolErrorKind::NotFound
        } else {
            ToolErrorKind::Execution
        }
    }
}

/// What happened when a tool ran. Kept in-process for logging and metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(Value),
    Failed { kind: ToolErrorKind, message: String },
}

impl ToolOutcome {
    pub fn failed(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        ToolOutcome::Failed {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success(_))
    }

    pub fn error_kind(&self) -> Option<ToolErrorKind> {
        match self {
            ToolOutcome::Success(_) => None,
            ToolOutcome::Failed { kind, .. } => Some(*kind),
        }
    }
}

/// The answer to one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    /// Equals the id of the originating tool call.
    pub tool_call_id: String,
    pub name: String,
    /// Text sent back to the model: serialized payload or `kind: message`.
    pub content: String,
    pub outcome: ToolOutcome,
}

// ─── Reported metadata ──────────────────────────────────────────────────────

/// One entry of `tools_used` in the chat response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolUsage {
    pub name: String,
    pub tool_call_id: String,
    /// `"success"` or the error kind.
    pub outcome: String,
}

impl From<&ToolResult> for ToolUsage {
    fn from(result: &ToolResult) -> Self {
        Self {
            name: result.name.clone(),
            tool_call_id: result.tool_call_id.clone(),
            outcome: result
                .outcome
                .error_kind()
                .map_or("success", ToolErrorKind::as_str)
                .to_string(),
        }
    }
}
