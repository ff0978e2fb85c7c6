//! Model client for OpenAI-compatible chat completion endpoints.
//!
//! This module handles all communication with the language-model backend:
//! - Non-streaming chat completions with tool definitions
//! - Bounded retry with exponential backoff on transient failures
//! - Parsing replies into text content or raw tool calls
//!
//! The backend is interchangeable via config; anything that speaks
//! `POST {base_url}/chat/completions` works.

pub mod client;
pub mod config;
pub mod errors;
pub mod response;
pub mod types;

// Re-exports for convenience
pub use client::{ChatModel, ModelClient};
pub use config::ModelConfig;
pub use errors::InferenceError;
pub use types::{
    ChatMessage, CompletionParams, ModelReply, Role, ToolCall, ToolChoice, ToolDefinition, Usage,
};
