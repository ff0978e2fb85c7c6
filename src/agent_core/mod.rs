//! Orchestration layer for dbchat.
//!
//! Submodules:
//! - `orchestrator`: Single-hop state machine driving one chat turn
//! - `tool_router`: Validates and dispatches model tool calls to the database
//! - `conversation`: Conversation history and the session store seam
//! - `tool_gate`: Whether the tool catalog is offered for a turn
//! - `response`: Chat response composer
//! - `truncate`: UTF-8 safe truncation of tool payloads
//! - `types`: Tool outcomes and reported metadata
//! - `errors`: Request-level error types

pub mod conversation;
pub mod errors;
pub mod orchestrator;
pub mod response;
pub mod tool_gate;
pub mod tool_router;
pub mod truncate;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use conversation::{Conversation, InMemorySessionStore, SessionStore};
pub use errors::AgentError;
pub use orchestrator::{Orchestrator, TurnOutcome};
pub use response::ChatResponse;
pub use tool_gate::{ToolGate, ToolOffering};
pub use tool_router::ToolRouter;
pub use types::{ToolErrorKind, ToolOutcome, ToolResult, ToolUsage};
