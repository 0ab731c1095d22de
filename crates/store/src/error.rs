//! Storage error model.
//!
//! Constraint violations and not-found conditions are *not* errors at this
//! layer: operations collapse them to boolean results so callers cannot
//! distinguish "already exists" from "no effect". Only driver and
//! connectivity failures surface as `StoreError`, tagged with the operation
//! that hit them, and are never retried internally.

use thiserror::Error;

/// Result type used across the store.
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-level failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Driver or connectivity failure during an operation. Fatal to the
    /// caller; retry policy, if any, belongs to the layer above.
    #[error("database error in {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },

    /// Schema creation or default-account seeding failed during `open`.
    #[error("schema bootstrap failed: {0}")]
    Bootstrap(String),
}

/// Map an sqlx error to a `StoreError`, tagging the failing operation.
pub(crate) fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    let message = match &err {
        sqlx::Error::Database(db_err) => db_err.message().to_string(),
        sqlx::Error::PoolClosed => "connection pool closed".to_string(),
        other => other.to_string(),
    };
    StoreError::Storage { operation, message }
}

/// Whether an error is a unique-constraint violation.
///
/// Uses `ErrorKind` rather than engine error codes: SQLite reports 1555/2067
/// where Postgres reports 23505, and the kind abstracts over both.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation)
        }
        _ => false,
    }
}
