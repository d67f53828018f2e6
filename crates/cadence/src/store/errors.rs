use sea_orm::DbErr;
use thiserror::Error;

/// Errors raised by an [`EventStore`](super::EventStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sea-orm.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl StoreError {
    /// Whether retrying the operation may succeed (lock contention, dropped
    /// connections, timeouts).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(err) => is_retryable_db_error(err),
        }
    }
}

pub(crate) fn is_retryable_db_error(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(_) | DbErr::Query(_) => {
            let err_str = err.to_string().to_lowercase();
            err_str.contains("locked")
                || err_str.contains("busy")
                || err_str.contains("timeout")
                || err_str.contains("connection")
                || err_str.contains("temporarily unavailable")
        }
        _ => false,
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
