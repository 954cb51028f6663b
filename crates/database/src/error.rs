//! Error types for the database layer

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("database query error: {0}")]
    Query(#[from] sqlx::Error),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
