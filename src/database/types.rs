//! Shapes returned by the database gateway.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Column metadata as exposed to the model by `describe_table`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
    pub is_nullable: bool,
}

/// Full column metadata, served by the table structure endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDetail {
    pub column_name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub character_maximum_length: Option<i32>,
    pub column_default: Option<String>,
}

impl From<&ColumnDetail> for ColumnInfo {
    fn from(detail: &ColumnDetail) -> Self {
        Self {
            column_name: detail.column_name.clone(),
            data_type: detail.data_type.clone(),
            is_nullable: detail.is_nullable,
        }
    }
}

/// A row keyed by column name.
pub type JsonRow = Map<String, Value>;

/// Rows produced by a row-returning statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names in result order. Empty when no row came back.
    pub columns: Vec<String>,
    pub rows: Vec<JsonRow>,
}

/// Outcome of running one verbatim SQL text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    Rows(QueryResult),
    Affected { affected_rows: u64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderDirection {
    #[default]
    #[serde(alias = "asc")]
    Asc,
    #[serde(alias = "desc")]
    Desc,
}

impl OrderDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// Paging and ordering for the table content view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub order_direction: Option<OrderDirection>,
}

impl ContentQuery {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(limit) = self.limit {
            if limit < 1 {
                return Err(format!("limit must be at least 1, got {limit}"));
            }
        }
        if let Some(offset) = self.offset {
            if offset < 0 {
                return Err(format!("offset must not be negative, got {offset}"));
            }
        }
        if matches!(self.order_by.as_deref(), Some(col) if col.trim().is_empty()) {
            return Err("order_by must not be empty".into());
        }
        Ok(())
    }
}

/// One page of a table plus its total row count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableContent {
    pub table: String,
    pub columns: Vec<String>,
    pub data: Vec<JsonRow>,
    pub total: i64,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_serializes_without_tag() {
        let affected = serde_json::to_value(QueryOutcome::Affected { affected_rows: 3 }).unwrap();
        assert_eq!(affected, json!({"affected_rows": 3}));

        let mut row = JsonRow::new();
        row.insert("id".into(), json!(1));
        let rows = serde_json::to_value(QueryOutcome::Rows(QueryResult {
            columns: vec!["id".into()],
            rows: vec![row],
        }))
        .unwrap();
        assert_eq!(rows, json!({"columns": ["id"], "rows": [{"id": 1}]}));
    }

    #[test]
    fn test_order_direction_accepts_lowercase() {
        let dir: OrderDirection = serde_json::from_value(json!("desc")).unwrap();
        assert_eq!(dir, OrderDirection::Desc);
        assert_eq!(dir.as_sql(), "DESC");
    }

    #[test]
    fn test_content_query_validation() {
        assert!(ContentQuery::default().validate().is_ok());
        let bad_limit = ContentQuery {
            limit: Some(0),
            ..Default::default()
        };
        assert!(bad_limit.validate().is_err());
        let bad_offset = ContentQuery {
            offset: Some(-1),
            ..Default::default()
        };
        assert!(bad_offset.validate().is_err());
    }

    #[test]
    fn test_column_info_drops_extra_metadata() {
        let detail = ColumnDetail {
            column_name: "email".into(),
            data_type: "character varying".into(),
            is_nullable: false,
            character_maximum_length: Some(255),
            column_default: None,
        };
        let info = serde_json::to_value(ColumnInfo::from(&detail)).unwrap();
        assert_eq!(
            info,
            json!({"column_name": "email", "data_type": "character varying", "is_nullable": false})
        );
    }
}
