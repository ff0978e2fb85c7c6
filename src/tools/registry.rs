//! The fixed catalog of database tools.
//!
//! Provides:
//! - The closed set of tools as [`ToolKind`]
//! - The OpenAI-format definitions sent to the model on every call
//! - Validation of raw tool call arguments into a typed [`ToolRequest`]
//!
//! Validation happens here and only here; a request that fails it never
//! reaches the database gateway.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::database::types::{ContentQuery, OrderDirection};
use crate::inference::types::{FunctionDefinition, ToolDefinition};

use super::errors::ToolCallError;
use super::guard::blocked_phrase;

// ─── ToolKind ────────────────────────────────────────────────────────────────

/// Every operation the service can run on behalf of a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ListTables,
    DescribeTable,
    ExecuteQuery,
    /// Paged table read. Only reachable through the direct tool endpoint.
    GetTableContent,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::ListTables,
        ToolKind::DescribeTable,
        ToolKind::ExecuteQuery,
        ToolKind::GetTableContent,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::ListTables => "list_tables",
            ToolKind::DescribeTable => "describe_table",
            ToolKind::ExecuteQuery => "execute_query",
            ToolKind::GetTableContent => "get_table_content",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Whether the tool is part of the catalog sent to the model.
    pub fn offered_to_model(self) -> bool {
        !matches!(self, ToolKind::GetTableContent)
    }

    fn description(self) -> &'static str {
        match self {
            ToolKind::ListTables => {
                "List every table in the public schema of the database, sorted by name."
            }
            ToolKind::DescribeTable => {
                "Describe the columns of a table: name, data type and whether it accepts NULL."
            }
            ToolKind::ExecuteQuery => {
                "Execute a PostgreSQL statement and return the resulting rows, or the number of affected rows for statements that return none."
            }
            ToolKind::GetTableContent => {
                "Read one page of a table, optionally ordered by a column."
            }
        }
    }

    fn parameters(self) -> Value {
        match self {
            ToolKind::ListTables => json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
            ToolKind::DescribeTable => json!({
                "type": "object",
                "properties": {
                    "table_name": {
                        "type": "string",
                        "description": "Name of the table to describe"
                    }
                },
                "required": ["table_name"],
                "additionalProperties": false
            }),
            ToolKind::ExecuteQuery => json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The SQL statement to execute"
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
            ToolKind::GetTableContent => json!({
                "type": "object",
                "properties": {
                    "table_name": { "type": "string" },
                    "limit": { "type": "integer", "minimum": 1 },
                    "offset": { "type": "integer", "minimum": 0 },
                    "order_by": { "type": "string" },
                    "order_direction": { "type": "string", "enum": ["ASC", "DESC"] }
                },
                "required": ["table_name"],
                "additionalProperties": false
            }),
        }
    }

    pub fn definition(self) -> ToolDefinition {
        ToolDefinition {
            r#type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name().to_string(),
                description: self.description().to_string(),
                parameters: self.parameters(),
            },
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Argument shapes ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DescribeTableArgs {
    table_name: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ExecuteQueryArgs {
    query: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TableContentArgs {
    table_name: String,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
    #[serde(default)]
    order_by: Option<String>,
    #[serde(default)]
    order_direction: Option<OrderDirection>,
}

// ─── ToolRequest ─────────────────────────────────────────────────────────────

/// A validated tool invocation, ready for the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ToolRequest {
    ListTables,
    DescribeTable { table_name: String },
    ExecuteQuery { query: String },
    GetTableContent { table_name: String, query: ContentQuery },
}

impl ToolRequest {
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolRequest::ListTables => ToolKind::ListTables,
            ToolRequest::DescribeTable { .. } => ToolKind::DescribeTable,
            ToolRequest::ExecuteQuery { .. } => ToolKind::ExecuteQuery,
            ToolRequest::GetTableContent { .. } => ToolKind::GetTableContent,
        }
    }

    /// The arguments in the same JSON shape the model sends.
    pub fn arguments(&self) -> Value {
        match self {
            ToolRequest::ListTables => json!({}),
            ToolRequest::DescribeTable { table_name } => json!({ "table_name": table_name }),
            ToolRequest::ExecuteQuery { query } => json!({ "query": query }),
            ToolRequest::GetTableContent { table_name, query } => {
                let mut args = json!({ "table_name": table_name });
                if let Some(limit) = query.limit {
                    args["limit"] = json!(limit);
                }
                if let Some(offset) = query.offset {
                    args["offset"] = json!(offset);
                }
                if let Some(order_by) = &query.order_by {
                    args["order_by"] = json!(order_by);
                }
                if let Some(direction) = query.order_direction {
                    args["order_direction"] = json!(direction.as_sql());
                }
                args
            }
        }
    }
}

// ─── ToolRegistry ────────────────────────────────────────────────────────────

/// Immutable tool catalog, built once at startup and shared by every request.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            definitions: ToolKind::ALL
                .into_iter()
                .filter(|kind| kind.offered_to_model())
                .map(ToolKind::definition)
                .collect(),
        }
    }

    /// Definitions sent to the model, identical on every call.
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Validate a model-issued tool call.
    ///
    /// `raw_arguments` is the serialized text from the reply; blank text is
    /// read as `{}`. Tools not offered to the model are unknown here.
    pub fn resolve(&self, name: &str, raw_arguments: &str) -> Result<ToolRequest, ToolCallError> {
        let kind = ToolKind::from_name(name)
            .filter(|kind| kind.offered_to_model())
            .ok_or_else(|| ToolCallError::UnknownTool {
                name: name.to_string(),
            })?;

        let args = if raw_arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str::<Value>(raw_arguments).map_err(|e| {
                ToolCallError::InvalidArguments {
                    tool: name.to_string(),
                    reason: format!("arguments are not valid JSON: {e}"),
                }
            })?
        };

        parse_request(kind, args)
    }

    /// Validate a direct (model-less) invocation. Every tool is reachable.
    pub fn resolve_direct(&self, action: &str, params: Value) -> Result<ToolRequest, ToolCallError> {
        let kind = ToolKind::from_name(action).ok_or_else(|| ToolCallError::UnknownTool {
            name: action.to_string(),
        })?;
        parse_request(kind, params)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_request(kind: ToolKind, args: Value) -> Result<ToolRequest, ToolCallError> {
    let invalid = |reason: String| ToolCallError::InvalidArguments {
        tool: kind.name().to_string(),
        reason,
    };

    let args = match args {
        Value::Null => json!({}),
        Value::Object(_) => args,
        other => return Err(invalid(format!("arguments must be a JSON object, got {other}"))),
    };

    fn decode<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, String> {
        serde_json::from_value(args).map_err(|e| e.to_string())
    }

    fn non_blank(field: &str, value: String) -> Result<String, String> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            Err(format!("'{field}' must not be empty"))
        } else {
            Ok(trimmed.to_string())
        }
    }

    match kind {
        ToolKind::ListTables => {
            decode::<NoArgs>(args).map_err(invalid)?;
            Ok(ToolRequest::ListTables)
        }
        ToolKind::DescribeTable => {
            let parsed: DescribeTableArgs = decode(args).map_err(invalid)?;
            Ok(ToolRequest::DescribeTable {
                table_name: non_blank("table_name", parsed.table_name).map_err(invalid)?,
            })
        }
        ToolKind::ExecuteQuery => {
            let parsed: ExecuteQueryArgs = decode(args).map_err(invalid)?;
            let query = non_blank("query", parsed.query).map_err(invalid)?;
            if let Some(phrase) = blocked_phrase(&query) {
                return Err(invalid(format!("statements containing '{phrase}' are not allowed")));
            }
            Ok(ToolRequest::ExecuteQuery { query })
        }
        ToolKind::GetTableContent => {
            let parsed: TableContentArgs = decode(args).map_err(invalid)?;
            let query = ContentQuery {
                limit: parsed.limit,
                offset: parsed.offset,
                order_by: parsed.order_by,
                order_direction: parsed.order_direction,
            };
            query.validate().map_err(invalid)?;
            Ok(ToolRequest::GetTableContent {
                table_name: non_blank("table_name", parsed.table_name).map_err(invalid)?,
                query,
            })
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
