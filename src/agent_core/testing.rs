//! Scripted fakes for the model and database seams, shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::database::{
    ColumnDetail, ContentQuery, DatabaseError, DatabaseGateway, JsonRow, QueryOutcome,
    QueryResult, TableContent,
};
use crate::inference::types::{
    ChatMessage, CompletionParams, ModelReply, ToolCall, ToolChoice, ToolDefinition, Usage,
};
use crate::inference::{ChatModel, InferenceError};

// ─── Model ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub tool_choice: Option<ToolChoice>,
    pub params: CompletionParams,
}

/// Replays canned replies in order and records every request.
pub(crate) struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ModelReply, InferenceError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<ModelReply, InferenceError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        tool_choice: Option<ToolChoice>,
        params: &CompletionParams,
    ) -> Result<ModelReply, InferenceError> {
        self.calls.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            tools: tools.map(<[ToolDefinition]>::to_vec),
            tool_choice,
            params: params.clone(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(InferenceError::MalformedResponse {
                    reason: "script exhausted".into(),
                })
            })
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }
}

pub(crate) fn usage(total: u32) -> Usage {
    Usage {
        prompt_tokens: total - 1,
        completion_tokens: 1,
        total_tokens: total,
    }
}

pub(crate) fn text_reply(content: &str) -> Result<ModelReply, InferenceError> {
    Ok(ModelReply {
        content: Some(content.to_string()),
        tool_calls: vec![],
        model: "scripted-model".into(),
        usage: usage(10),
        finish_reason: Some("stop".into()),
    })
}

/// Reply requesting `(id, name, arguments)` tool calls.
pub(crate) fn tool_reply(calls: &[(&str, &str, &str)]) -> Result<ModelReply, InferenceError> {
    Ok(ModelReply {
        content: None,
        tool_calls: calls
            .iter()
            .map(|(id, name, args)| ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments: args.to_string(),
            })
            .collect(),
        model: "scripted-model".into(),
        usage: usage(20),
        finish_reason: Some("tool_calls".into()),
    })
}

// ─── Database ───────────────────────────────────────────────────────────────

/// In-memory gateway. Any SQL mentioning `missing` fails like an unknown
/// relation would; SQL calling `pg_sleep` hits the statement timeout.
pub(crate) struct FakeGateway {
    tables: Vec<String>,
    calls: AtomicUsize,
    query_barrier: Option<tokio::sync::Barrier>,
}

impl FakeGateway {
    pub fn with_tables(tables: &[&str]) -> Self {
        let mut tables: Vec<String> = tables.iter().map(|t| t.to_string()).collect();
        tables.sort();
        Self {
            tables,
            calls: AtomicUsize::new(0),
            query_barrier: None,
        }
    }

    /// Make `execute_query` wait until `parties` queries are in flight.
    pub fn with_query_barrier(mut self, parties: usize) -> Self {
        self.query_barrier = Some(tokio::sync::Barrier::new(parties));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn require_table(&self, table: &str) -> Result<(), DatabaseError> {
        if self.tables.iter().any(|t| t == table) {
            Ok(())
        } else {
            Err(DatabaseError::TableNotFound {
                table: table.to_string(),
            })
        }
    }
}

#[async_trait]
impl DatabaseGateway for FakeGateway {
    async fn list_tables(&self) -> Result<Vec<String>, DatabaseError> {
        self.hit();
        Ok(self.tables.clone())
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnDetail>, DatabaseError> {
        self.hit();
        self.require_table(table)?;
        Ok(vec![
            ColumnDetail {
                column_name: "id".into(),
                data_type: "integer".into(),
                is_nullable: false,
                character_maximum_length: None,
                column_default: Some(format!("nextval('{table}_id_seq'::regclass)")),
            },
            ColumnDetail {
                column_name: "nombre".into(),
                data_type: "character varying".into(),
                is_nullable: true,
                character_maximum_length: Some(100),
                column_default: None,
            },
        ])
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryOutcome, DatabaseError> {
        self.hit();
        if let Some(barrier) = &self.query_barrier {
            barrier.wait().await;
        }
        if sql.contains("pg_sleep") {
            return Err(DatabaseError::Timeout { after_ms: 60_000 });
        }
        if sql.contains("missing") {
            return Err(DatabaseError::Execution {
                reason: "relation \"missing_table\" does not exist".into(),
            });
        }
        if sql.trim_start().to_ascii_lowercase().starts_with("update") {
            return Ok(QueryOutcome::Affected { affected_rows: 2 });
        }
        let mut row = JsonRow::new();
        row.insert("count".into(), json!(3));
        Ok(QueryOutcome::Rows(QueryResult {
            columns: vec!["count".into()],
            rows: vec![row],
        }))
    }

    async fn table_content(
        &self,
        table: &str,
        query: &ContentQuery,
    ) -> Result<TableContent, DatabaseError> {
        self.hit();
        self.require_table(table)?;
        let mut row = JsonRow::new();
        row.insert("id".into(), json!(1));
        row.insert("nombre".into(), json!("Ana"));
        Ok(TableContent {
            table: table.to_string(),
            columns: vec!["id".into(), "nombre".into()],
            data: vec![row],
            total: 1,
            limit: query.limit,
            offset: query.offset,
        })
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
