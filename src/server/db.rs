//! `/api/db/*`: read-through façade over the database gateway.
//!
//! Table listing, content and raw queries go through the tool registry so
//! they get the same validation as model calls; the structure endpoint reads
//! the gateway directly for the full column metadata.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::ContentQuery;
use crate::tools::ToolKind;

use super::error::ApiError;
use super::tools::into_json;
use super::AppState;

pub(crate) async fn list_tables(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let outcome = state
        .orchestrator
        .router()
        .dispatch_direct(ToolKind::ListTables.name(), json!({}))
        .await;
    into_json(outcome)
}

pub(crate) async fn table_content(
    State(state): State<Arc<AppState>>,
    Path(table_name): Path<String>,
    query: Result<Query<ContentQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;

    let mut params = serde_json::to_value(&query)
        .map_err(|e| ApiError::internal(format!("cannot encode query parameters: {e}")))?;
    params["table_name"] = json!(table_name);

    let outcome = state
        .orchestrator
        .router()
        .dispatch_direct(ToolKind::GetTableContent.name(), params)
        .await;
    into_json(outcome)
}

pub(crate) async fn table_structure(
    State(state): State<Arc<AppState>>,
    Path(table_name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let columns = state
        .orchestrator
        .router()
        .gateway()
        .describe_table(&table_name)
        .await?;
    Ok(Json(json!({ "table": table_name, "columns": columns })))
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// Runs SQL verbatim. Same trust boundary as the `execute_query` tool.
pub(crate) async fn run_query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let outcome = state
        .orchestrator
        .router()
        .dispatch_direct(ToolKind::ExecuteQuery.name(), json!({ "query": request.query }))
        .await;
    into_json(outcome)
}
