//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ├──► NotFound / DuplicateId  → caller's contract was broken      │
//! │       │                                                                 │
//! │       └──► everything else         → storage failure, the mutation     │
//! │                                      did not take effect               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `update_product` / `update_multi_transaction` on an unknown id
    /// - `fetch_one` returns no rows
    ///
    /// Ledger lookups of a missing product never produce this; they skip.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A caller-supplied id collides with an existing row.
    #[error("{entity} with id '{id}' already exists")]
    DuplicateId { entity: String, id: String },

    /// Unique constraint violation on a non-key column.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration or legacy backfill failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Fills in the offending id on a `DuplicateId` raised by an insert.
    ///
    /// SQLite only reports `table.id`, not the value.
    pub fn with_id(self, id: &str) -> Self {
        match self {
            DbError::DuplicateId { entity, .. } => DbError::DuplicateId {
                entity,
                id: id.to_string(),
            },
            other => other,
        }
    }

    /// Whether the error means the row is missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. })
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
///     "UNIQUE ... <table>.id" → DbError::DuplicateId
///     "UNIQUE ... other"      → DbError::UniqueViolation
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite: "UNIQUE constraint failed: <table>.<column>"
                if let Some(field) = msg.split("UNIQUE constraint failed: ").nth(1) {
                    match field.strip_suffix(".id") {
                        Some(table) => DbError::DuplicateId {
                            entity: table.to_string(),
                            id: "unknown".to_string(),
                        },
                        None => DbError::UniqueViolation {
                            field: field.to_string(),
                            value: "unknown".to_string(),
                        },
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_id_only_touches_duplicate_id() {
        let err = DbError::DuplicateId {
            entity: "products".to_string(),
            id: "unknown".to_string(),
        }
        .with_id("p1");
        assert_eq!(err.to_string(), "products with id 'p1' already exists");

        let err = DbError::not_found("Product", "p1").with_id("p2");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Product not found: p1");
    }
}
