use chrono::NaiveDate;
use thiserror::Error;

use crate::models::TaskId;

/// Reasons a recurrence rule is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("Frequency must be at least 1")]
    ZeroFrequency,

    #[error("Select at least one day of the week")]
    EmptyWeekdays,

    #[error("Monthly date must be between 1 and 31, got {0}")]
    MonthlyDateOutOfRange(u32),

    #[error("Must end after at least 1 occurrence")]
    ZeroEndCount,

    #[error("End date {end} is before start date {start}")]
    EndBeforeStart { end: NaiveDate, start: NaiveDate },

    #[error("No matching weekday within one week after {after}")]
    NoMatchingWeekday { after: NaiveDate },
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Serialization error")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(#[from] RuleError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Update failed for task {task_id}")]
    UpdateFailed {
        task_id: TaskId,
        #[source]
        source: Box<CoreError>,
    },

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Ambiguous short ID. Did you mean one of these?")]
    AmbiguousId(Vec<(String, String)>), // Vec of (ID, Title)
}

impl CoreError {
    /// Wraps a store failure raised while replacing a parent's instance set.
    /// Rule violations and lookups pass through unchanged.
    pub(crate) fn into_update_failure(self, task_id: TaskId) -> Self {
        match self {
            CoreError::InvalidRule(_)
            | CoreError::InvalidInput(_)
            | CoreError::NotFound(_)
            | CoreError::UpdateFailed { .. } => self,
            other => CoreError::UpdateFailed {
                task_id,
                source: Box::new(other),
            },
        }
    }
}
