//! Shared types for the model client.
//!
//! These mirror the OpenAI Chat Completions API types, used for both
//! request building and response parsing.

use serde::{Deserialize, Serialize};

// ─── Request Types ───────────────────────────────────────────────────────────

/// A single message in the conversation.
///
/// Serialization notes for OpenAI-compatible backends:
/// - `content` is `""` (not `null`) for assistant messages that only carry
///   tool calls. Several gateways reject `null` content.
/// - `name`, `tool_call_id` and `tool_calls` are skipped when `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, serialize_with = "serialize_content")]
    pub content: Option<String>,
    /// Tool name, set on `tool` role messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool call results are sent back as `tool` role messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Assistant messages may contain tool calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallResponse>>,
}

/// Emit `""` instead of `null` when `content` is `None`.
fn serialize_content<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(s) => serializer.serialize_str(s),
        None => serializer.serialize_str(""),
    }
}

impl ChatMessage {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            name: None,
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Assistant message announcing the tool calls of a reply.
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: &[ToolCall]) -> Self {
        Self {
            role: Role::Assistant,
            content,
            name: None,
            tool_call_id: None,
            tool_calls: Some(tool_calls.iter().map(ToolCallResponse::from).collect()),
        }
    }

    /// `tool` role message answering the call with `tool_call_id`.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            name: Some(name.into()),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
        }
    }

    /// Ids of the tool calls carried by this message (empty for most messages).
    pub fn tool_call_ids(&self) -> impl Iterator<Item = &str> {
        self.tool_calls
            .iter()
            .flatten()
            .map(|tc| tc.id.as_str())
    }
}

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Tool definition sent in the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub r#type: String,
    pub function: FunctionDefinition,
}

/// Function definition within a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Whether the model may invoke the tools it was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ToolChoice {
    #[serde(rename = "auto")]
    Auto,
    /// Tools stay in the request but the model must answer in text.
    #[serde(rename = "none")]
    Disabled,
}

/// Request body for `POST {base_url}/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

/// Per-request overrides of the configured model parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionParams {
    /// Model name to use instead of the configured one.
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

// ─── Response Types ──────────────────────────────────────────────────────────

/// A tool call extracted from the model's reply.
///
/// `arguments` is kept as the raw serialized text the model produced;
/// validation happens in the tool registry, never here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this tool call (generated if the model doesn't provide one).
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Tool call as sent/returned in the OpenAI wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResponse {
    pub id: String,
    pub r#type: String,
    pub function: FunctionCallResponse,
}

/// Function call details in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallResponse {
    pub name: String,
    pub arguments: String,
}

impl From<&ToolCall> for ToolCallResponse {
    fn from(tc: &ToolCall) -> Self {
        Self {
            id: tc.id.clone(),
            r#type: "function".to_string(),
            function: FunctionCallResponse {
                name: tc.name.clone(),
                arguments: tc.arguments.clone(),
            },
        }
    }
}

/// Token accounting reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens += rhs.prompt_tokens;
        self.completion_tokens += rhs.completion_tokens;
        self.total_tokens += rhs.total_tokens;
    }
}

/// A parsed, complete model reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    /// Text content, `None` when the model returned nothing or only tool calls.
    pub content: Option<String>,
    /// Requested tool calls, in the order the model emitted them.
    pub tool_calls: Vec<ToolCall>,
    /// Model name echoed by the backend.
    pub model: String,
    pub usage: Usage,
    /// `"stop"`, `"tool_calls"`, `"length"`, ...
    pub finish_reason: Option<String>,
}

impl ModelReply {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(
        messages: &'a [ChatMessage],
        tools: Option<&'a [ToolDefinition]>,
        tool_choice: Option<ToolChoice>,
    ) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: "test",
            messages,
            tools,
            tool_choice,
            temperature: 0.7,
            max_tokens: None,
            stream: false,
        }
    }

    #[test]
    fn test_max_tokens_and_tools_omitted_when_none() {
        let json = serde_json::to_string(&request(&[], None, None)).unwrap();
        assert!(!json.contains("max_tokens"));
        assert!(!json.contains("tools"));
        assert!(!json.contains("tool_choice"));
    }

    #[test]
    fn test_tool_choice_serialization() {
        let tools = vec![ToolDefinition {
            r#type: "function".into(),
            function: FunctionDefinition {
                name: "list_tables".into(),
                description: "List tables".into(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            },
        }];
        let json =
            serde_json::to_string(&request(&[], Some(&tools), Some(ToolChoice::Disabled))).unwrap();
        assert!(json.contains("\"tool_choice\":\"none\""));

        let json =
            serde_json::to_string(&request(&[], Some(&tools), Some(ToolChoice::Auto))).unwrap();
        assert!(json.contains("\"tool_choice\":\"auto\""));
    }

    #[test]
    fn test_null_content_serialized_as_empty_string() {
        let call = ToolCall {
            id: "call_1".into(),
            name: "list_tables".into(),
            arguments: "{}".into(),
        };
        let msg = ChatMessage::assistant_tool_calls(None, &[call]);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["content"], "");
        assert_eq!(json["tool_calls"][0]["type"], "function");
        assert_eq!(json["tool_calls"][0]["function"]["arguments"], "{}");
        assert!(json.get("tool_call_id").is_none());
    }

    #[test]
    fn test_tool_result_message_shape() {
        let msg = ChatMessage::tool_result("call_9", "describe_table", "{\"columns\":[]}");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_9");
        assert_eq!(json["name"], "describe_table");
    }

    #[test]
    fn test_usage_accumulates() {
        let mut total = Usage::default();
        total += Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        };
        total += Usage {
            prompt_tokens: 20,
            completion_tokens: 1,
            total_tokens: 21,
        };
        assert_eq!(total.prompt_tokens, 30);
        assert_eq!(total.total_tokens, 36);
    }

    #[test]
    fn test_inbound_message_deserializes_without_optional_fields() {
        let msg: ChatMessage =
            serde_json::from_str(r#"{"role":"user","content":"list all tables"}"#).unwrap();
        assert_eq!(msg, ChatMessage::user("list all tables"));
    }
}
