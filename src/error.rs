// Engine error taxonomy.
//
// Argument checks (InvalidArgument) run before any store access. The store
// reports input it rejects (duplicate id, counter overflow) with the same
// variant. Store failures are never defaulted to zero: a count that could not
// be read is an error, not "no engagement".
//
// Vote inconsistency (yes + no != votes) has no variant here. It is
// advisory, reported through tracing and `curator status`, never returned.

/// Errors produced by the scoring engine and the counter store.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Caller-fixable input problem: negative count, negative weight,
    /// non-positive half-life, wrong content kind, zero page size,
    /// duplicate id, counter overflow.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The counter store could not be reached or timed out.
    /// Callers decide whether to retry; the engine never does.
    #[error("counter store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("content item not found: {id}")]
    NotFound { id: String },

    /// A compare-and-replace lost against a concurrent replace of the same record.
    #[error("concurrent replace detected for content item {id}")]
    Conflict { id: String },

    /// A stored record could not be decoded. Retrying returns the same row.
    #[error("stored record is unreadable: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn invalid(message: impl Into<String>) -> Self {
        EngineError::InvalidArgument(message.into())
    }

    /// Whether a caller may reasonably retry the same call later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::StoreUnavailable(_) | EngineError::Conflict { .. }
        )
    }
}

// Constraint violations are the caller's input (duplicate id, negative
// field), decode failures are bad stored data. Everything else is treated as
// the store being unreachable.

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                EngineError::InvalidArgument(err.to_string())
            }
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::IntegralValueOutOfRange(..) => EngineError::Corrupt(err.to_string()),
            _ => EngineError::StoreUnavailable(err.to_string()),
        }
    }
}

/// SQLSTATE for `numeric_value_out_of_range` (e.g. bigint overflow).
#[cfg(feature = "postgres")]
const PG_NUMERIC_OUT_OF_RANGE: &str = "22003";

#[cfg(feature = "postgres")]
impl From<sqlx_core::Error> for EngineError {
    fn from(err: sqlx_core::Error) -> Self {
        match &err {
            sqlx_core::Error::Database(db_err)
                if db_err.is_unique_violation()
                    || db_err.is_check_violation()
                    || db_err.is_foreign_key_violation()
                    || db_err.code().as_deref() == Some(PG_NUMERIC_OUT_OF_RANGE) =>
            {
                EngineError::InvalidArgument(err.to_string())
            }
            sqlx_core::Error::ColumnDecode { .. }
            | sqlx_core::Error::Decode(_)
            | sqlx_core::Error::ColumnNotFound(_)
            | sqlx_core::Error::TypeNotFound { .. } => EngineError::Corrupt(err.to_string()),
            _ => EngineError::StoreUnavailable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(EngineError::StoreUnavailable("timeout".into()).is_retryable());
        assert!(EngineError::Conflict { id: "p1".into() }.is_retryable());
        assert!(!EngineError::invalid("negative weight").is_retryable());
        assert!(!EngineError::NotFound { id: "p1".into() }.is_retryable());
        assert!(!EngineError::Corrupt("bad row".into()).is_retryable());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_sqlite_constraint_violation_is_invalid_argument() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: EngineError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
        assert!(!err.is_retryable());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_sqlite_decode_failure_is_corrupt() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err: EngineError = conn
            .query_row("SELECT 'not a number'", [], |row| row.get::<_, i64>(0))
            .unwrap_err()
            .into();
        assert!(matches!(err, EngineError::Corrupt(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_display_includes_context() {
        let err = EngineError::NotFound { id: "post-42".into() };
        assert_eq!(err.to_string(), "content item not found: post-42");
    }
}
