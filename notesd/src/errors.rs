use crate::db::errors::DbError;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// The configured storage provider is not one this build can talk to
    #[error("Unsupported DB_PROVIDER: {provider}. Supported: {supported}", supported = .supported.join(", "))]
    UnsupportedProvider { provider: String, supported: Vec<&'static str> },

    /// The connection string could not be turned into connect options
    #[error("Invalid database connection string: {message}")]
    InvalidConnectionString { message: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Schema migration failed on startup
    #[error("Failed to apply database migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
