//! PostgreSQL gateway backed by a shared `sqlx` pool.

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Either, Executor};

use crate::config::DatabaseConfig;

use super::errors::{sanitize_message, DatabaseError};
use super::gateway::{DatabaseGateway, DEFAULT_SCHEMA};
use super::types::{ColumnDetail, ContentQuery, QueryOutcome, QueryResult, TableContent};
use super::values::{column_names, row_to_json};

/// Slack granted on top of `statement_timeout` for the client-side bound, so
/// the server-side cancellation normally fires first and reports cleanly.
const CLIENT_TIMEOUT_GRACE: Duration = Duration::from_millis(500);

/// Leading keywords of statements that return rows even when none match.
const ROW_RETURNING_KEYWORDS: &[&str] = &["select", "with", "values", "table", "show", "explain"];

/// Tables and views alike, so everything listed can also be described.
const LIST_TABLES_SQL: &str = "SELECT table_name::text
     FROM information_schema.tables
     WHERE table_schema = $1
     ORDER BY table_name";

const TABLE_EXISTS_SQL: &str = "SELECT EXISTS (
         SELECT 1 FROM information_schema.tables
         WHERE table_schema = $1 AND table_name = $2
     )";

pub struct PgGateway {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PgGateway {
    pub fn new(pool: PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }

    /// Build a lazily connecting pool from config.
    ///
    /// Every pooled connection carries the configured `statement_timeout`.
    /// No connection is opened until the first query.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let options = PgConnectOptions::from_str(&config.url)
            .map_err(|e| DatabaseError::Unavailable {
                reason: format!("invalid database url: {}", sanitize_message(&e.to_string())),
            })?
            .options([("statement_timeout", config.statement_timeout_ms.to_string())]);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_lazy_with(options);

        Ok(Self::new(pool, config.statement_timeout()))
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.statement_timeout.as_millis()).unwrap_or(u64::MAX)
    }

    fn map_err(&self, err: sqlx::Error) -> DatabaseError {
        DatabaseError::from_sqlx(err, self.timeout_ms())
    }

    /// Run `fut` under the client-side timeout.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, DatabaseError>>,
    ) -> Result<T, DatabaseError> {
        match tokio::time::timeout(self.statement_timeout + CLIENT_TIMEOUT_GRACE, fut).await {
            Ok(result) => result,
            Err(_) => Err(DatabaseError::Timeout {
                after_ms: self.timeout_ms(),
            }),
        }
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DatabaseError> {
        sqlx::query_scalar::<_, bool>(TABLE_EXISTS_SQL)
        .bind(DEFAULT_SCHEMA)
        .bind(table)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| self.map_err(e))
    }

    async fn column_details(&self, table: &str) -> Result<Vec<ColumnDetail>, DatabaseError> {
        let rows = sqlx::query_as::<_, (String, String, String, Option<i32>, Option<String>)>(
            "SELECT column_name::text,
                    data_type::text,
                    is_nullable::text,
                    character_maximum_length::int4,
                    column_default::text
             FROM information_schema.columns
             WHERE table_schema = $1 AND table_name = $2
             ORDER BY ordinal_position",
        )
        .bind(DEFAULT_SCHEMA)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| self.map_err(e))?;

        Ok(rows
            .into_iter()
            .map(
                |(column_name, data_type, nullable, character_maximum_length, column_default)| {
                    ColumnDetail {
                        column_name,
                        data_type,
                        is_nullable: nullable.eq_ignore_ascii_case("YES"),
                        character_maximum_length,
                        column_default,
                    }
                },
            )
            .collect())
    }

    async fn run_verbatim(&self, sql: &str) -> Result<QueryOutcome, DatabaseError> {
        // A plain &str goes through the simple query protocol, which accepts
        // multiple statements and needs no prepare step.
        let mut stream = self.pool.fetch_many(sql);

        let mut result = QueryResult::default();
        let mut affected_rows = 0u64;

        while let Some(step) = stream.try_next().await.map_err(|e| self.map_err(e))? {
            match step {
                Either::Left(done) => affected_rows += done.rows_affected(),
                Either::Right(row) => {
                    if result.columns.is_empty() {
                        result.columns = column_names(&row);
                    }
                    result.rows.push(row_to_json(&row));
                }
            }
        }

        if !result.rows.is_empty() || returns_rows(sql) {
            Ok(QueryOutcome::Rows(result))
        } else {
            Ok(QueryOutcome::Affected { affected_rows })
        }
    }

    async fn page(&self, table: &str, query: &ContentQuery) -> Result<TableContent, DatabaseError> {
        let columns = self.column_details(table).await?;
        if columns.is_empty() && !self.table_exists(table).await? {
            return Err(DatabaseError::TableNotFound {
                table: table.to_string(),
            });
        }

        let mut sql = format!("SELECT * FROM {}", qualified(table));
        if let Some(order_by) = query.order_by.as_deref() {
            if !columns.iter().any(|c| c.column_name == order_by) {
                return Err(DatabaseError::ColumnNotFound {
                    table: table.to_string(),
                    column: order_by.to_string(),
                });
            }
            let direction = query.order_direction.unwrap_or_default();
            sql.push_str(&format!(" ORDER BY {} {}", quote_ident(order_by), direction.as_sql()));
        }
        // LIMIT NULL means no limit; OFFSET NULL means no offset.
        sql.push_str(" LIMIT $1 OFFSET $2");

        let rows = sqlx::query(&sql)
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.map_err(e))?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM {}",
            qualified(table)
        ))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| self.map_err(e))?;

        Ok(TableContent {
            table: table.to_string(),
            columns: columns.into_iter().map(|c| c.column_name).collect(),
            data: rows.iter().map(row_to_json).collect(),
            total,
            limit: query.limit,
            offset: query.offset,
        })
    }
}

#[async_trait]
impl DatabaseGateway for PgGateway {
    async fn list_tables(&self) -> Result<Vec<String>, DatabaseError> {
        self.bounded(async {
            sqlx::query_scalar::<_, String>(LIST_TABLES_SQL)
            .bind(DEFAULT_SCHEMA)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.map_err(e))
        })
        .await
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnDetail>, DatabaseError> {
        self.bounded(async {
            let columns = self.column_details(table).await?;
            // A table with zero columns is legal in PostgreSQL.
            if columns.is_empty() && !self.table_exists(table).await? {
                return Err(DatabaseError::TableNotFound {
                    table: table.to_string(),
                });
            }
            Ok(columns)
        })
        .await
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryOutcome, DatabaseError> {
        tracing::debug!(sql_len = sql.len(), "executing verbatim sql");
        self.bounded(self.run_verbatim(sql)).await
    }

    async fn table_content(
        &self,
        table: &str,
        query: &ContentQuery,
    ) -> Result<TableContent, DatabaseError> {
        self.bounded(self.page(table, query)).await
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        self.bounded(async {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map(|_| ())
                .map_err(|e| self.map_err(e))
        })
        .await
    }
}

/// Whether a statement is expected to produce a row set.
fn returns_rows(sql: &str) -> bool {
    let lower = sql.trim_start().to_ascii_lowercase();
    let first_word = lower
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default();
    ROW_RETURNING_KEYWORDS.contains(&first_word)
        || lower.split_whitespace().any(|word| word == "returning")
}

/// Double-quote an identifier, doubling embedded quotes.
fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn qualified(table: &str) -> String {
    format!("{}.{}", quote_ident(DEFAULT_SCHEMA), quote_ident(table))
}
