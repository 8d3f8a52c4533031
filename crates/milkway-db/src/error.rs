//! Database errors

use thiserror::Error;

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Record not found
    #[error("record not found")]
    NotFound,

    /// Stored value could not be decoded into a domain type
    #[error("decode error: {0}")]
    Decode(String),
}

/// Database result type alias
pub type DbResult<T> = Result<T, DbError>;
