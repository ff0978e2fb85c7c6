//! The ordered message history of one chat turn.
//!
//! Responsibilities:
//! - Hold the append-only `Vec<ChatMessage>` the model sees
//! - Record assistant replies and tool results in protocol order
//! - Check that every tool message answers an announced tool call
//! - Persist histories between requests through a [`SessionStore`]

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::inference::types::{ChatMessage, ModelReply, Role};

use super::errors::AgentError;
use super::types::ToolResult;

// ─── Conversation ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = ChatMessage>) {
        self.messages.extend(messages);
    }

    /// Insert `prompt` as the first message unless a system message exists.
    pub fn ensure_system_prompt(&mut self, prompt: &str) {
        if !self.messages.iter().any(|m| m.role == Role::System) {
            self.messages.insert(0, ChatMessage::system(prompt));
        }
    }

    /// Text of the most recent user message.
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .and_then(|m| m.content.as_deref())
    }

    /// Append the assistant message announcing `reply`'s tool calls.
    pub fn push_tool_call_reply(&mut self, reply: &ModelReply) {
        self.messages.push(ChatMessage::assistant_tool_calls(
            reply.content.clone(),
            &reply.tool_calls,
        ));
    }

    /// Append one `tool` message per result, in the given order.
    pub fn push_tool_results(&mut self, results: &[ToolResult]) {
        self.messages.extend(results.iter().map(|r| {
            ChatMessage::tool_result(r.tool_call_id.clone(), r.name.clone(), r.content.clone())
        }));
    }

    /// Check the tool-call protocol over the whole history.
    ///
    /// Every `tool` message must answer a call id announced by an earlier
    /// assistant message, at most once.
    pub fn validate_tool_sequence(&self) -> Result<(), AgentError> {
        let mut announced: HashSet<&str> = HashSet::new();
        let mut answered: HashSet<&str> = HashSet::new();

        for (index, message) in self.messages.iter().enumerate() {
            match message.role {
                Role::Assistant => announced.extend(message.tool_call_ids()),
                Role::Tool => {
                    let id = message.tool_call_id.as_deref().unwrap_or_default();
                    if !announced.contains(id) {
                        return Err(AgentError::InvalidRequest {
                            reason: format!(
                                "tool message at position {index} answers unknown tool call '{id}'"
                            ),
                        });
                    }
                    if !answered.insert(id) {
                        return Err(AgentError::InvalidRequest {
                            reason: format!("tool call '{id}' is answered more than once"),
                        });
                    }
                }
                Role::System | Role::User => {}
            }
        }
        Ok(())
    }
}

// ─── Session store ──────────────────────────────────────────────────────────

/// Where conversations live between requests.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<Conversation>, AgentError>;
    async fn put(&self, session_id: &str, conversation: Conversation) -> Result<(), AgentError>;
}

/// Histories kept by [`InMemorySessionStore::new`].
pub const DEFAULT_SESSION_CAPACITY: usize = 1000;

/// Process-local store; histories are lost on restart.
///
/// Holds at most `capacity` sessions. Writing past the limit evicts the
/// session written least recently.
#[derive(Debug)]
pub struct InMemorySessionStore {
    capacity: usize,
    inner: RwLock<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    sessions: HashMap<String, (u64, Conversation)>,
    clock: u64,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SESSION_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: RwLock::new(StoreInner::default()),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<Conversation>, AgentError> {
        let inner = self.inner.read().await;
        Ok(inner.sessions.get(session_id).map(|(_, conv)| conv.clone()))
    }

    async fn put(&self, session_id: &str, conversation: Conversation) -> Result<(), AgentError> {
        let mut inner = self.inner.write().await;
        inner.clock += 1;
        let stamp = inner.clock;
        inner
            .sessions
            .insert(session_id.to_string(), (stamp, conversation));

        while inner.sessions.len() > self.capacity {
            let Some(oldest) = inner
                .sessions
                .iter()
                .min_by_key(|(_, (written, _))| *written)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            inner.sessions.remove(&oldest);
            tracing::debug!(session_id = %oldest, "session evicted");
        }
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
