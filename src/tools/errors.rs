//! Tool call validation errors.

use thiserror::Error;

/// Raised while resolving a raw tool call into a [`super::ToolRequest`].
/// Neither variant ever reaches the database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolCallError {
    /// Tool name not in the registry (or not offered on this surface).
    #[error("unknown tool: '{name}'")]
    UnknownTool { name: String },

    /// Arguments missing, mistyped, or rejected by a guard.
    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },
}
