//! PostgreSQL row to JSON conversion.

use serde_json::{json, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use super::types::JsonRow;

/// Column names of a row, in result order.
pub fn column_names(row: &PgRow) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

/// Convert a row into a `column → value` map.
///
/// Temporal values become ISO-8601 strings and numerics keep their exact
/// decimal text. Unknown types fall back to the raw text representation.
pub fn row_to_json(row: &PgRow) -> JsonRow {
    let mut map = JsonRow::new();
    for (i, col) in row.columns().iter().enumerate() {
        map.insert(col.name().to_string(), column_value(row, i, col.type_info().name()));
    }
    map
}

fn column_value(row: &PgRow, i: usize, type_name: &str) -> Value {
    let is_null = row.try_get_raw(i).map(|raw| raw.is_null()).unwrap_or(true);
    if is_null {
        return Value::Null;
    }

    let decoded = match type_name {
        "BOOL" => row.try_get::<bool, _>(i).map(|v| json!(v)),
        "INT2" => row.try_get::<i16, _>(i).map(|v| json!(v)),
        "INT4" => row.try_get::<i32, _>(i).map(|v| json!(v)),
        "INT8" => row.try_get::<i64, _>(i).map(|v| json!(v)),
        "FLOAT4" => row.try_get::<f32, _>(i).map(|v| json!(v)),
        "FLOAT8" => row.try_get::<f64, _>(i).map(|v| json!(v)),
        "NUMERIC" => row
            .try_get::<rust_decimal::Decimal, _>(i)
            .map(|v| json!(v.to_string())),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<String, _>(i).map(|v| json!(v))
        }
        "UUID" => row.try_get::<uuid::Uuid, _>(i).map(|v| json!(v)),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(i)
            .map(|v| json!(v.format("%Y-%m-%d").to_string())),
        "TIME" => row
            .try_get::<chrono::NaiveTime, _>(i)
            .map(|v| json!(v.format("%H:%M:%S%.f").to_string())),
        "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(i)
            .map(|dt| json!(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(i)
            .map(|dt| json!(dt.to_rfc3339())),
        "JSON" | "JSONB" => row.try_get::<Value, _>(i),
        _ => return raw_text(row, i),
    };

    decoded.unwrap_or_else(|_| raw_text(row, i))
}

/// Text form of a value, when the wire representation is UTF-8.
fn raw_text(row: &PgRow, i: usize) -> Value {
    row.try_get_raw(i)
        .ok()
        .and_then(|raw| raw.as_str().ok().map(|s| json!(s)))
        .unwrap_or(Value::Null)
}
