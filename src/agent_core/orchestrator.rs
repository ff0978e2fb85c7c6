//! Single-hop tool-calling orchestrator.
//!
//! One chat turn runs through a fixed state machine:
//!
//! ```text
//! AwaitFirstReply ──(no tool calls)──────────────────────────▶ Done
//!        │
//!        └──(tool calls)──▶ ExecutingTools ──▶ AwaitFinalReply ──▶ Done
//! ```
//!
//! 1. **First reply**: the model sees the conversation and the tool catalog
//!    with `tool_choice = auto`.
//! 2. **Execute**: every requested call is validated and run concurrently;
//!    results are appended in call order.
//! 3. **Final reply**: the model sees the results with the same catalog but
//!    `tool_choice = none`; its text is the answer. Tool calls in this reply
//!    are logged and dropped.
//!
//! There is never a second tool round, which bounds every turn to two model
//! calls and one database round-trip.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::inference::types::{
    ChatMessage, CompletionParams, ModelReply, ToolCall, ToolChoice, Usage,
};
use crate::inference::ChatModel;

use super::conversation::{Conversation, SessionStore};
use super::errors::AgentError;
use super::response::ChatResponse;
use super::tool_gate::ToolGate;
use super::tool_router::ToolRouter;
use super::types::ToolResult;

// ─── Types ──────────────────────────────────────────────────────────────────

/// Everything one turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Final answer text (empty if the model sent none).
    pub content: String,
    /// Model that produced the final answer.
    pub model: String,
    /// Summed over every model call of the turn.
    pub usage: Usage,
    /// In call order; empty when no tool ran.
    pub tool_results: Vec<ToolResult>,
    /// History including tool traffic and the final assistant message.
    pub conversation: Conversation,
}

enum TurnState {
    AwaitFirstReply,
    ExecutingTools(ModelReply),
    AwaitFinalReply,
    Done(ModelReply),
}

impl TurnState {
    fn label(&self) -> &'static str {
        match self {
            TurnState::AwaitFirstReply => "await_first_reply",
            TurnState::ExecutingTools(_) => "executing_tools",
            TurnState::AwaitFinalReply => "await_final_reply",
            TurnState::Done(_) => "done",
        }
    }
}

// ─── Orchestrator ───────────────────────────────────────────────────────────

/// Drives chat turns. Holds only shared, immutable collaborators, so one
/// instance serves every concurrent request.
pub struct Orchestrator {
    model: Arc<dyn ChatModel>,
    router: Arc<ToolRouter>,
    gate: ToolGate,
    system_prompt: String,
    sessions: Option<Arc<dyn SessionStore>>,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        router: Arc<ToolRouter>,
        gate: ToolGate,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            model,
            router,
            gate,
            system_prompt: system_prompt.into(),
            sessions: None,
        }
    }

    /// Persist conversations between requests in `store`.
    pub fn with_sessions(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(store);
        self
    }

    pub fn router(&self) -> &Arc<ToolRouter> {
        &self.router
    }

    pub fn default_model(&self) -> &str {
        self.model.default_model()
    }

    /// Answer inbound `messages`, restoring and saving session history when
    /// the caller names a session and sessions are enabled.
    ///
    /// With a `session_id`, stored history comes first and the inbound
    /// messages are appended to it. Without one the turn is stateless and
    /// nothing is stored.
    pub async fn respond(
        &self,
        messages: Vec<ChatMessage>,
        params: &CompletionParams,
        session_id: Option<String>,
    ) -> Result<ChatResponse, AgentError> {
        let session_id = session_id.filter(|id| !id.trim().is_empty());
        let (Some(store), Some(session_id)) = (&self.sessions, session_id) else {
            let outcome = self.run(Conversation::from_messages(messages), params).await?;
            return Ok(ChatResponse::compose(&outcome, None));
        };

        let mut conversation = store.get(&session_id).await?.unwrap_or_default();
        let restored = conversation.len();
        conversation.extend(messages);
        tracing::debug!(session_id = %session_id, restored, "session loaded");

        let outcome = self.run(conversation, params).await?;
        store.put(&session_id, outcome.conversation.clone()).await?;

        Ok(ChatResponse::compose(&outcome, Some(session_id)))
    }

    /// Run one turn over `conversation`.
    pub async fn run(
        &self,
        mut conversation: Conversation,
        params: &CompletionParams,
    ) -> Result<TurnOutcome, AgentError> {
        if conversation.last_user_text().is_none() {
            return Err(AgentError::InvalidRequest {
                reason: "the conversation has no user message".into(),
            });
        }
        conversation.validate_tool_sequence()?;
        conversation.ensure_system_prompt(&self.system_prompt);

        // Decided once: the same catalog (or none) goes out on every call.
        let tools = self
            .gate
            .should_offer(&conversation)
            .then(|| self.router.registry().definitions());

        let mut usage = Usage::default();
        let mut tool_results: Vec<ToolResult> = Vec::new();
        let mut state = TurnState::AwaitFirstReply;

        tracing::info!(
            messages = conversation.len(),
            tools_offered = tools.is_some(),
            model = params.model.as_deref().unwrap_or(self.model.default_model()),
            "turn started"
        );

        let final_reply = loop {
            tracing::debug!(state = state.label(), "turn state");
            state = match state {
                TurnState::AwaitFirstReply => {
                    let mut reply = self
                        .model
                        .complete(
                            conversation.messages(),
                            tools,
                            tools.map(|_| ToolChoice::Auto),
                            params,
                        )
                        .await?;
                    usage += reply.usage;

                    if !reply.has_tool_calls() {
                        TurnState::Done(reply)
                    } else if tools.is_none() {
                        tracing::warn!(
                            count = reply.tool_calls.len(),
                            "model requested tools that were not offered; ignoring"
                        );
                        reply.tool_calls.clear();
                        TurnState::Done(reply)
                    } else {
                        ensure_unique_ids(&mut reply.tool_calls);
                        TurnState::ExecutingTools(reply)
                    }
                }
                TurnState::ExecutingTools(reply) => {
                    conversation.push_tool_call_reply(&reply);
                    tool_results = self.router.dispatch_tool_calls(&reply.tool_calls).await;
                    conversation.push_tool_results(&tool_results);

                    let failed = tool_results
                        .iter()
                        .filter(|r| !r.outcome.is_success())
                        .count();
                    tracing::info!(
                        tools = tool_results.len(),
                        failed,
                        "tool round complete"
                    );
                    TurnState::AwaitFinalReply
                }
                TurnState::AwaitFinalReply => {
                    let reply = self
                        .model
                        .complete(
                            conversation.messages(),
                            tools,
                            Some(ToolChoice::Disabled),
                            params,
                        )
                        .await?;
                    usage += reply.usage;

                    if reply.has_tool_calls() {
                        let names: Vec<&str> =
                            reply.tool_calls.iter().map(|tc| tc.name.as_str()).collect();
                        tracing::warn!(
                            tools = ?names,
                            "final reply requested more tools; ignoring"
                        );
                    }
                    TurnState::Done(reply)
                }
                TurnState::Done(reply) => break reply,
            };
        };

        let content = final_reply.content.unwrap_or_default();
        conversation.push(ChatMessage::assistant(content.clone()));

        tracing::info!(
            model = %final_reply.model,
            tools_used = tool_results.len(),
            total_tokens = usage.total_tokens,
            "turn complete"
        );

        Ok(TurnOutcome {
            content,
            model: final_reply.model,
            usage,
            tool_results,
            conversation,
        })
    }
}

/// Replace empty or repeated call ids so every call can be answered once.
fn ensure_unique_ids(calls: &mut [ToolCall]) {
    let mut seen = HashSet::new();
    for call in calls.iter_mut() {
        if call.id.is_empty() || !seen.insert(call.id.clone()) {
            let fresh = format!("call_{}", Uuid::new_v4());
            tracing::debug!(old = %call.id, new = %fresh, "reassigned tool call id");
            seen.insert(fresh.clone());
            call.id = fresh;
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_core::conversation::InMemorySessionStore;
    use crate::agent_core::testing::{text_reply, tool_reply, FakeGateway, ScriptedModel};
    use crate::agent_core::tool_gate::ToolOffering;
    use crate::agent_core::types::ToolErrorKind;
    use crate::inference::types::Role;
    use crate::inference::InferenceError;
    use crate::tools::ToolRegistry;

    fn orchestrator(model: Arc<ScriptedModel>, gateway: Arc<FakeGateway>) -> Orchestrator {
        let router = Arc::new(ToolRouter::new(Arc::new(ToolRegistry::new()), gateway, 10_000));
        Orchestrator::new(model, router, ToolGate::always(), "You answer questions about a database.")
    }

    fn ask(text: &str) -> Conversation {
        Conversation::from_messages(vec![ChatMessage::user(text)])
    }

    #[tokio::test]
    async fn test_no_tool_calls_returns_first_reply() {
        let model = Arc::new(ScriptedModel::new(vec![text_reply("Hello! Ask me about your data.")]));
        let gateway = Arc::new(FakeGateway::with_tables(&["usuarios"]));
        let orch = orchestrator(model.clone(), gateway.clone());

        let outcome = orch.run(ask("hi"), &CompletionParams::default()).await.unwrap();

        assert_eq!(outcome.content, "Hello! Ask me about your data.");
        assert!(outcome.tool_results.is_empty());
        assert_eq!(model.calls().len(), 1);
        assert_eq!(gateway.call_count(), 0);
        assert_eq!(outcome.usage.total_tokens, 10);
    }

    #[tokio::test]
    async fn test_list_tables_scenario() {
        let model = Arc::new(ScriptedModel::new(vec![
            tool_reply(&[("call_1", "list_tables", "{}")]),
            text_reply("There are two tables: pedidos and usuarios."),
        ]));
        let gateway = Arc::new(FakeGateway::with_tables(&["usuarios", "pedidos"]));
        let orch = orchestrator(model.clone(), gateway);

        let outcome = orch
            .run(ask("list all tables"), &CompletionParams::default())
            .await
            .unwrap();

        assert_eq!(outcome.content, "There are two tables: pedidos and usuarios.");
        assert_eq!(outcome.tool_results.len(), 1);
        assert_eq!(outcome.tool_results[0].content, r#"{"tables":["pedidos","usuarios"]}"#);
        assert_eq!(outcome.usage.total_tokens, 30);

        let calls = model.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].tool_choice, Some(ToolChoice::Auto));
        assert_eq!(calls[1].tool_choice, Some(ToolChoice::Disabled));
        // Same catalog on both calls.
        assert_eq!(calls[0].tools, calls[1].tools);
        assert_eq!(calls[0].tools.as_ref().unwrap().len(), 3);

        // Second call sees: system, user, assistant(tool_calls), tool.
        let roles: Vec<Role> = calls[1].messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::Tool]);
        assert_eq!(calls[1].messages[3].tool_call_id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn test_results_align_with_calls_in_order() {
        let model = Arc::new(ScriptedModel::new(vec![
            tool_reply(&[
                ("a", "describe_table", r#"{"table_name":"nonexistent"}"#),
                ("b", "execute_query", r#"{"query":"SELECT * FROM missing_table"}"#),
                ("c", "list_tables", "{}"),
                ("d", "describe_table", "{}"),
            ]),
            text_reply("Some of that failed."),
        ]));
        let gateway = Arc::new(FakeGateway::with_tables(&["usuarios"]));
        let orch = orchestrator(model, gateway);

        let outcome = orch.run(ask("explore"), &CompletionParams::default()).await.unwrap();

        let ids: Vec<&str> = outcome
            .tool_results
            .iter()
            .map(|r| r.tool_call_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        let kinds: Vec<Option<ToolErrorKind>> = outcome
            .tool_results
            .iter()
            .map(|r| r.outcome.error_kind())
            .collect();
        assert_eq!(
            kinds,
            vec![
                Some(ToolErrorKind::NotFound),
                Some(ToolErrorKind::Execution),
                None,
                Some(ToolErrorKind::Validation),
            ]
        );
        assert_eq!(outcome.content, "Some of that failed.");
        assert!(outcome.conversation.validate_tool_sequence().is_ok());
    }

    #[tokio::test]
    async fn test_tool_calls_in_final_reply_are_ignored() {
        let model = Arc::new(ScriptedModel::new(vec![
            tool_reply(&[("call_1", "list_tables", "{}")]),
            Ok(ModelReply {
                content: Some("Here you go.".into()),
                ..tool_reply(&[("call_2", "list_tables", "{}")]).unwrap()
            }),
        ]));
        let gateway = Arc::new(FakeGateway::with_tables(&["usuarios"]));
        let orch = orchestrator(model.clone(), gateway.clone());

        let outcome = orch.run(ask("tables?"), &CompletionParams::default()).await.unwrap();

        assert_eq!(outcome.content, "Here you go.");
        assert_eq!(model.calls().len(), 2);
        assert_eq!(gateway.call_count(), 1);
        assert_eq!(outcome.tool_results.len(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_aborts_turn() {
        let model = Arc::new(ScriptedModel::new(vec![
            tool_reply(&[("call_1", "list_tables", "{}")]),
            Err(InferenceError::RetriesExhausted {
                attempts: 3,
                last: Box::new(InferenceError::Timeout { duration_secs: 60 }),
            }),
        ]));
        let gateway = Arc::new(FakeGateway::with_tables(&["usuarios"]));
        let orch = orchestrator(model, gateway);

        let err = orch.run(ask("tables?"), &CompletionParams::default()).await.unwrap_err();
        assert!(matches!(err, AgentError::Transport(_)));
    }

    #[tokio::test]
    async fn test_keyword_gate_skips_catalog() {
        let model = Arc::new(ScriptedModel::new(vec![text_reply("Hi!")]));
        let gateway = Arc::new(FakeGateway::with_tables(&["usuarios"]));
        let router = Arc::new(ToolRouter::new(Arc::new(ToolRegistry::new()), gateway, 0));
        let gate = ToolGate::new(ToolOffering::Keywords, &["table".to_string()]);
        let orch = Orchestrator::new(model.clone(), router, gate, "prompt");

        orch.run(ask("good morning"), &CompletionParams::default()).await.unwrap();

        let calls = model.calls();
        assert!(calls[0].tools.is_none());
        assert!(calls[0].tool_choice.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_call_ids_are_reassigned() {
        let model = Arc::new(ScriptedModel::new(vec![
            tool_reply(&[("dup", "list_tables", "{}"), ("dup", "list_tables", "{}")]),
            text_reply("done"),
        ]));
        let gateway = Arc::new(FakeGateway::with_tables(&["usuarios"]));
        let orch = orchestrator(model, gateway);

        let outcome = orch.run(ask("tables"), &CompletionParams::default()).await.unwrap();
        assert_eq!(outcome.tool_results[0].tool_call_id, "dup");
        assert_ne!(outcome.tool_results[1].tool_call_id, "dup");
        assert!(outcome.conversation.validate_tool_sequence().is_ok());
    }

    #[tokio::test]
    async fn test_missing_user_message_rejected() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let gateway = Arc::new(FakeGateway::with_tables(&[]));
        let orch = orchestrator(model.clone(), gateway);

        let err = orch
            .run(Conversation::new(), &CompletionParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidRequest { .. }));
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn test_params_forwarded_to_model() {
        let model = Arc::new(ScriptedModel::new(vec![text_reply("ok")]));
        let gateway = Arc::new(FakeGateway::with_tables(&[]));
        let orch = orchestrator(model.clone(), gateway);
        let params = CompletionParams {
            model: Some("other-model".into()),
            temperature: Some(0.2),
            max_tokens: Some(100),
        };

        orch.run(ask("hi"), &params).await.unwrap();
        assert_eq!(model.calls()[0].params, params);
    }

    #[tokio::test]
    async fn test_sessions_restore_history() {
        let model = Arc::new(ScriptedModel::new(vec![
            text_reply("first answer"),
            text_reply("second answer"),
        ]));
        let gateway = Arc::new(FakeGateway::with_tables(&[]));
        let store = Arc::new(InMemorySessionStore::new());
        let orch = orchestrator(model.clone(), gateway).with_sessions(store);

        let first = orch
            .respond(
                vec![ChatMessage::user("one")],
                &CompletionParams::default(),
                Some("s-1".into()),
            )
            .await
            .unwrap();
        assert_eq!(first.session_id.as_deref(), Some("s-1"));

        orch.respond(
            vec![ChatMessage::user("two")],
            &CompletionParams::default(),
            Some("s-1".into()),
        )
        .await
        .unwrap();

        let second_call = &model.calls()[1];
        let texts: Vec<&str> = second_call
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| m.content.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(texts, vec!["one", "first answer", "two"]);
    }

    #[tokio::test]
    async fn test_sessionless_requests_are_not_stored() {
        let replies = (0..200).map(|_| text_reply("ok")).collect();
        let model = Arc::new(ScriptedModel::new(replies));
        let gateway = Arc::new(FakeGateway::with_tables(&[]));
        let store = Arc::new(InMemorySessionStore::new());
        let orch = orchestrator(model, gateway).with_sessions(store.clone());

        for _ in 0..200 {
            let response = orch
                .respond(vec![ChatMessage::user("hi")], &CompletionParams::default(), None)
                .await
                .unwrap();
            assert!(response.session_id.is_none());
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_session_store_stays_bounded() {
        let replies = (0..50).map(|_| text_reply("ok")).collect();
        let model = Arc::new(ScriptedModel::new(replies));
        let gateway = Arc::new(FakeGateway::with_tables(&[]));
        let store = Arc::new(InMemorySessionStore::with_capacity(10));
        let orch = orchestrator(model, gateway).with_sessions(store.clone());

        for i in 0..50 {
            orch.respond(
                vec![ChatMessage::user("hi")],
                &CompletionParams::default(),
                Some(format!("session-{i}")),
            )
            .await
            .unwrap();
        }
        assert_eq!(store.len().await, 10);
        assert!(store.get("session-49").await.unwrap().is_some());
        assert!(store.get("session-0").await.unwrap().is_none());
    }

    #[test]
    fn test_ensure_unique_ids_fills_blanks() {
        let mut calls = vec![
            ToolCall {
                id: String::new(),
                name: "list_tables".into(),
                arguments: String::new(),
            },
            ToolCall {
                id: "x".into(),
                name: "list_tables".into(),
                arguments: String::new(),
            },
        ];
        ensure_unique_ids(&mut calls);
        assert!(calls[0].id.starts_with("call_"));
        assert_eq!(calls[1].id, "x");
    }
}
