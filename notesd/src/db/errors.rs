use sqlx::error::ErrorKind;
use thiserror::Error;

/// Unified error type for database operations that application code can handle
#[derive(Error, Debug)]
pub enum DbError {
    /// Entity not found by the given identifier (only raised by writes; lookups return `None`)
    #[error("Entity not found")]
    NotFound,

    /// Unique constraint violation
    #[error("Unique constraint violation: {message}")]
    UniqueViolation { table: Option<String>, message: String },

    /// Foreign key constraint violation
    #[error("Foreign key constraint violation: {message}")]
    ForeignKeyViolation { table: Option<String>, message: String },

    /// Check constraint violation (length limits)
    #[error("Check constraint violation: {message}")]
    CheckViolation { table: Option<String>, message: String },

    /// Required column left empty
    #[error("Not-null constraint violation: {message}")]
    NotNullViolation { table: Option<String>, message: String },

    /// The caller's cancellation token fired before the statement finished
    #[error("Database operation cancelled")]
    Cancelled,

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DbError {
    /// Whether this error came from a storage-level constraint
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DbError::UniqueViolation { .. }
                | DbError::ForeignKeyViolation { .. }
                | DbError::CheckViolation { .. }
                | DbError::NotNullViolation { .. }
        )
    }
}

/// Convert from sqlx::Error using sqlx's error kind categorization
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::Database(db_err) => {
                let table = db_err.table().map(|s| s.to_string());
                let message = db_err.message().to_string();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::UniqueViolation { table, message },
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { table, message },
                    ErrorKind::CheckViolation => DbError::CheckViolation { table, message },
                    ErrorKind::NotNullViolation => DbError::NotNullViolation { table, message },
                    // All other database errors are non-recoverable - convert to anyhow
                    _ => DbError::Other(anyhow::Error::from(err)),
                }
            }
            // All other sqlx errors are non-recoverable - convert to anyhow with context
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

/// Type alias for database operation results
pub type Result<T> = std::result::Result<T, DbError>;
