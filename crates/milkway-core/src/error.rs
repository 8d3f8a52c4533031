//! Fulfillment errors

use milkway_types::DeliveryEventId;
use thiserror::Error;

/// Fulfillment engine errors
#[derive(Error, Debug)]
pub enum FulfillmentError {
    /// Referenced entity is unknown
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Illegal state transition (open-ended pause, cancel of cancelled, ...)
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Concurrent resolution race lost, or duplicate delivery event
    #[error("conflict: {0}")]
    Conflict(String),

    /// Event matched no pending occurrence; queued for manual reconciliation
    #[error("event {event_id} matched no occurrence")]
    UnmatchedEvent {
        /// The recorded (but unmatched) delivery event
        event_id: DeliveryEventId,
    },

    /// Actor is not allowed to perform the operation
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Storage operation exceeded its deadline; safe to retry
    #[error("timed out during {0}")]
    Timeout(&'static str),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl FulfillmentError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::InvalidState(_) => 422,
            Self::Conflict(_) => 409,
            Self::UnmatchedEvent { .. } => 422,
            Self::Forbidden(_) => 403,
            Self::Timeout(_) => 503,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::Conflict(_) => "CONFLICT",
            Self::UnmatchedEvent { .. } => "UNMATCHED_EVENT",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Timeout(_) => "TIMEOUT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller may safely retry the operation as-is
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<milkway_db::DbError> for FulfillmentError {
    fn from(err: milkway_db::DbError) -> Self {
        tracing::error!("Database error: {}", err);
        Self::Database(err.to_string())
    }
}

impl From<milkway_types::InvalidSubscription> for FulfillmentError {
    fn from(err: milkway_types::InvalidSubscription) -> Self {
        Self::InvalidState(err.to_string())
    }
}
