//! The seam between tool execution and the relational store.

use async_trait::async_trait;

use super::errors::DatabaseError;
use super::types::{ColumnDetail, ContentQuery, QueryOutcome, TableContent};

/// Schema the gateway operates in.
pub const DEFAULT_SCHEMA: &str = "public";

/// Database operations reachable from tools and the HTTP façade.
///
/// Implementations must be safe to call concurrently; every call acquires
/// its own pooled connection and releases it on return or drop.
#[async_trait]
pub trait DatabaseGateway: Send + Sync {
    /// Table names in [`DEFAULT_SCHEMA`], ascending.
    async fn list_tables(&self) -> Result<Vec<String>, DatabaseError>;

    /// Columns of `table` in declaration order.
    ///
    /// Fails with [`DatabaseError::TableNotFound`] for an unknown table.
    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnDetail>, DatabaseError>;

    /// Run caller-supplied SQL verbatim.
    ///
    /// This is a trust boundary: the text is not rewritten or restricted
    /// here, so callers must sit behind an authorization layer.
    async fn execute_query(&self, sql: &str) -> Result<QueryOutcome, DatabaseError>;

    /// One page of `table`, with optional ordering.
    async fn table_content(
        &self,
        table: &str,
        query: &ContentQuery,
    ) -> Result<TableContent, DatabaseError>;

    /// Cheap connectivity probe.
    async fn ping(&self) -> Result<(), DatabaseError>;
}
