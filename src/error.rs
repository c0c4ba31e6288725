//! Structured error handling for the approval core.
//!
//! Every failure a caller can act on is a distinct variant; boundary layers
//! map variants to response codes via [`CoreError::http_status`] without
//! string-matching messages.

use thiserror::Error;
use uuid::Uuid;

use crate::state_machine::states::Stage;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Decision targeted a stage the task has already moved past.
    /// Recoverable: refetch the task and retry against fresh state.
    #[error("stale stage for task {task_uuid}: decision targets {expected}, task is at {actual}")]
    StaleStage {
        task_uuid: Uuid,
        expected: Stage,
        actual: Stage,
    },

    /// Decision attempted on a task whose overall status is terminal.
    #[error("task {task_uuid} is terminal ({status}); no further decisions allowed")]
    TerminalState { task_uuid: Uuid, status: String },

    /// Terminal-stage approval attempted while sub-items remain unapproved.
    #[error("task {task_uuid} has {remaining} unapproved sub-item(s); cannot finalize")]
    IncompleteSubItems { task_uuid: Uuid, remaining: usize },

    /// Export request spans tasks with inconsistent batching state.
    #[error("mixed batch selection: {reason}")]
    MixedBatch { reason: String },

    /// Counter increment could not be committed after bounded retries.
    #[error("sequence allocation for scope {scope_key} exhausted after {attempts} attempt(s)")]
    AllocationExhausted { scope_key: String, attempts: u32 },

    /// Referenced task or batch does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("database error: {0}")]
    Database(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    /// Create a NotFound error for a task id.
    pub fn task_not_found(task_uuid: Uuid) -> Self {
        Self::NotFound {
            kind: "task",
            id: task_uuid.to_string(),
        }
    }

    /// Create a NotFound error for a batch id.
    pub fn batch_not_found(batch_uuid: Uuid) -> Self {
        Self::NotFound {
            kind: "batch",
            id: batch_uuid.to_string(),
        }
    }

    /// Create a MixedBatch error with context.
    pub fn mixed_batch(reason: impl Into<String>) -> Self {
        Self::MixedBatch {
            reason: reason.into(),
        }
    }

    /// Create a Validation error with context.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether the caller can recover by refetching state and retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StaleStage { .. } | Self::AllocationExhausted { .. } | Self::Database(_)
        )
    }

    /// HTTP status hint for the API boundary.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::StaleStage { .. } | Self::MixedBatch { .. } => 409,
            Self::TerminalState { .. } => 409,
            Self::IncompleteSubItems { .. } => 422,
            Self::NotFound { .. } => 404,
            Self::Validation(_) | Self::Configuration(_) => 400,
            Self::AllocationExhausted { .. } => 503,
            Self::Database(_) => 500,
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound {
                kind: "row",
                id: String::new(),
            },
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("JSON serialization error: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
