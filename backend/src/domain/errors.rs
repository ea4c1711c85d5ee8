//! Error taxonomy for every ledger engine operation.

use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Bad input; resubmitting corrected input will work
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already settled: {0}")]
    AlreadySettled(String),

    #[error("Cannot {action} {entity} in state {from}")]
    InvalidTransition {
        entity: String,
        from: String,
        action: &'static str,
    },

    #[error("Notification failed: {0}")]
    NotificationFailed(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Lost too many optimistic-concurrency races on one record
    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        LedgerError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        LedgerError::NotFound(msg.into())
    }

    pub fn invalid_transition(
        entity: impl Into<String>,
        from: impl ToString,
        action: &'static str,
    ) -> Self {
        LedgerError::InvalidTransition {
            entity: entity.into(),
            from: from.to_string(),
            action,
        }
    }
}

/// How many times a service re-reads and retries after losing a
/// compare-and-swap before giving up with [`LedgerError::Conflict`].
pub const MAX_UPDATE_ATTEMPTS: usize = 8;
