//! Database gateway. Executes validated tool requests against PostgreSQL.
//!
//! Submodules:
//! - `gateway`: The `DatabaseGateway` trait the agent and HTTP layers depend on
//! - `postgres`: `sqlx` pool implementation with statement timeouts
//! - `values`: Row → JSON conversion
//! - `types`: Column metadata, query outcomes, table pages
//! - `errors`: Gateway error types and credential masking

pub mod errors;
pub mod gateway;
pub mod postgres;
pub mod types;
pub mod values;

pub use errors::{sanitize_message, DatabaseError};
pub use gateway::{DatabaseGateway, DEFAULT_SCHEMA};
pub use postgres::PgGateway;
pub use types::{
    ColumnDetail, ColumnInfo, ContentQuery, JsonRow, OrderDirection, QueryOutcome, QueryResult,
    TableContent,
};
