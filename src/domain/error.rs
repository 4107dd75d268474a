//! Error types for domain validation and parsing.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{RunId, RunStatus, TaskId};

/// Errors raised while mutating a task run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunDomainError {
    /// The requested status write would regress the run lifecycle.
    #[error("invalid status transition for task_id={task_id} run_id={run_id}: {from} -> {to}")]
    InvalidStatusTransition {
        /// Owning task identifier.
        task_id: TaskId,
        /// Run identifier.
        run_id: RunId,
        /// Status recorded before the write.
        from: RunStatus,
        /// Status the write attempted to set.
        to: RunStatus,
    },

    /// The end time precedes the recorded start time.
    #[error("end time {end} precedes start time {start}")]
    EndBeforeStart {
        /// Recorded run start.
        start: DateTime<Utc>,
        /// Rejected run end.
        end: DateTime<Utc>,
    },
}

/// Error returned while parsing run statuses from the wire.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("No such status: '{0}'")]
pub struct ParseStatusError(pub String);

/// Error returned while parsing task types from the wire.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("No such task type: '{0}'")]
pub struct ParseTaskTypeError(pub String);
