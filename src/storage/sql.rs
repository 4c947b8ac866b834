//! # SQL Helpers
//!
//! Statement building and error mapping shared by the Postgres and SQLite
//! backends. Both use one table per namespace, `(id, data)`, named exactly
//! as the namespace.

use super::errors::StorageError;

/// Postgres SQLSTATE for `undefined_table`
const PG_UNDEFINED_TABLE: &str = "42P01";

/// Double-quote an identifier. Callers only pass names that passed
/// `is_storage_identifier`, so no escaping is needed.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

/// Whether `err` means the namespace table does not exist
pub(crate) fn is_missing_table(err: &sqlx::Error) -> bool {
    match err.as_database_error() {
        Some(db) => {
            db.code().as_deref() == Some(PG_UNDEFINED_TABLE)
                || db.message().contains("no such table")
        }
        None => false,
    }
}

/// Map an unexpected driver failure
pub(crate) fn internal(op: &str, err: sqlx::Error) -> StorageError {
    StorageError::Internal(format!("error on {}: {}", op, err))
}

pub(crate) fn create_table(namespace: &str, data_type: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, data {} NOT NULL)",
        quote_ident(namespace),
        data_type
    )
}

pub(crate) fn drop_table(namespace: &str) -> String {
    format!("DROP TABLE {}", quote_ident(namespace))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_shapes() {
        assert_eq!(
            create_table("users", "JSON"),
            "CREATE TABLE IF NOT EXISTS \"users\" (id TEXT PRIMARY KEY, data JSON NOT NULL)"
        );
        assert_eq!(drop_table("users_schema"), "DROP TABLE \"users_schema\"");
    }

    #[test]
    fn test_non_database_errors_are_not_missing_tables() {
        assert!(!is_missing_table(&sqlx::Error::RowNotFound));
        assert!(!is_missing_table(&sqlx::Error::PoolClosed));
    }
}
