//! Statement guard for verbatim SQL.
//!
//! Rejects cluster and schema level DDL plus blanket privilege changes.
//! This is a tripwire, not an authorization layer: everything else runs as
//! written.

const BLOCKED_PHRASES: &[&str] = &[
    "drop database",
    "drop schema",
    "alter database",
    "alter schema",
    "create database",
    "create schema",
    "drop role",
    "create role",
    "grant all",
    "revoke all",
];

/// Returns the offending phrase when `sql` contains a blocked statement.
pub fn blocked_phrase(sql: &str) -> Option<&'static str> {
    let normalized = sql
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase();
    BLOCKED_PHRASES
        .iter()
        .copied()
        .find(|phrase| normalized.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_database_level_ddl() {
        assert_eq!(blocked_phrase("DROP DATABASE shop"), Some("drop database"));
        assert_eq!(
            blocked_phrase("select 1;\n  create\tschema x"),
            Some("create schema")
        );
        assert_eq!(blocked_phrase("GRANT ALL ON t TO bob"), Some("grant all"));
    }

    #[test]
    fn test_allows_ordinary_statements() {
        assert_eq!(blocked_phrase("SELECT * FROM usuarios"), None);
        assert_eq!(blocked_phrase("DROP TABLE tmp_import"), None);
        assert_eq!(blocked_phrase("CREATE TRIGGER t AFTER INSERT ON p FOR EACH ROW EXECUTE FUNCTION f()"), None);
    }
}
