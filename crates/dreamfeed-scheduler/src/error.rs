use thiserror::Error;

use crate::types::ScheduleStatus;

/// Errors that can occur within the scheduling subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A schedule definition failed validation.
    #[error("Invalid schedule: {0}")]
    Validation(String),

    /// A cron expression or calendar reference could not be used.
    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),

    /// No schedule with the given ID exists (or it belongs to another owner).
    #[error("Schedule not found: {id}")]
    NotFound { id: String },

    /// The requested lifecycle action is not allowed from the current status.
    #[error("Cannot {action} a schedule in status {from}")]
    InvalidTransition {
        from: ScheduleStatus,
        action: &'static str,
    },

    /// A stored row could not be decoded back into a schedule.
    #[error("Corrupt schedule record {id}: {reason}")]
    InvalidRecord { id: String, reason: String },

    /// The calendar collaborator reported a failure.
    #[error("Calendar lookup failed: {0}")]
    Calendar(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
