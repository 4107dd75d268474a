//! Task run records: the per-task index and the run detail aggregate.

use chrono::{DateTime, Utc};

use super::{RunDomainError, RunId, RunStatus, TaskId, Trigger};

/// Compact header for one run inside the per-task index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRunRecord {
    run_id: RunId,
    date_created: DateTime<Utc>,
}

impl TaskRunRecord {
    /// Creates an index entry.
    #[must_use]
    pub const fn new(run_id: RunId, date_created: DateTime<Utc>) -> Self {
        Self {
            run_id,
            date_created,
        }
    }

    /// Returns the run identifier.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Returns the run creation timestamp.
    #[must_use]
    pub const fn date_created(&self) -> DateTime<Utc> {
        self.date_created
    }
}

/// Append-only index of every run of one task.
///
/// Entries are ordered by append time and are never removed by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRuns {
    task_id: TaskId,
    runs: Vec<TaskRunRecord>,
}

impl TaskRuns {
    /// Creates an empty index for a task.
    #[must_use]
    pub const fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            runs: Vec::new(),
        }
    }

    /// Reconstructs an index from persisted entries.
    #[must_use]
    pub const fn from_persisted(task_id: TaskId, runs: Vec<TaskRunRecord>) -> Self {
        Self { task_id, runs }
    }

    /// Returns the owning task identifier.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the index entries in append order.
    #[must_use]
    pub fn runs(&self) -> &[TaskRunRecord] {
        &self.runs
    }

    /// Appends a run header.
    pub fn append(&mut self, record: TaskRunRecord) {
        self.runs.push(record);
    }

    /// Returns the entry for a run identifier, if present.
    #[must_use]
    pub fn find(&self, run_id: RunId) -> Option<&TaskRunRecord> {
        self.runs.iter().find(|record| record.run_id() == run_id)
    }

    /// Returns the highest run identifier recorded so far.
    #[must_use]
    pub fn highest_run_id(&self) -> Option<RunId> {
        self.runs.iter().map(TaskRunRecord::run_id).max()
    }

    /// Returns the identifier the next run should receive.
    #[must_use]
    pub fn next_run_id(&self) -> RunId {
        self.highest_run_id().map_or(RunId::new(1), RunId::next)
    }
}

/// Detailed record of a single run.
#[derive(Debug)]
pub struct TaskRunMetadata {
    id: RunId,
    task_id: TaskId,
    name: String,
    trigger: Box<dyn Trigger>,
    status: RunStatus,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    logs: Vec<String>,
    error: String,
}

impl Clone for TaskRunMetadata {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            task_id: self.task_id,
            name: self.name.clone(),
            trigger: self.trigger.clone(),
            status: self.status,
            start_time: self.start_time,
            end_time: self.end_time,
            logs: self.logs.clone(),
            error: self.error.clone(),
        }
    }
}

impl PartialEq for TaskRunMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.task_id == other.task_id
            && self.name == other.name
            && *self.trigger == *other.trigger
            && self.status == other.status
            && self.start_time == other.start_time
            && self.end_time == other.end_time
            && self.logs == other.logs
            && self.error == other.error
    }
}

impl TaskRunMetadata {
    /// Creates a freshly-triggered run in the `Pending` state.
    #[must_use]
    pub fn new(
        id: RunId,
        task_id: TaskId,
        name: impl Into<String>,
        trigger: Box<dyn Trigger>,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            task_id,
            name: name.into(),
            trigger,
            status: RunStatus::Pending,
            start_time,
            end_time: None,
            logs: Vec::new(),
            error: String::new(),
        }
    }

    /// Reconstructs a run from persisted fields.
    #[expect(
        clippy::too_many_arguments,
        reason = "Persisted run construction intentionally mirrors stored fields"
    )]
    #[must_use]
    pub fn from_persisted(
        id: RunId,
        task_id: TaskId,
        name: String,
        trigger: Box<dyn Trigger>,
        status: RunStatus,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        logs: Vec<String>,
        error: String,
    ) -> Self {
        Self {
            id,
            task_id,
            name,
            trigger,
            status,
            start_time,
            end_time,
            logs,
            error,
        }
    }

    /// Returns the run identifier.
    #[must_use]
    pub const fn id(&self) -> RunId {
        self.id
    }

    /// Returns the owning task identifier.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the run name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the trigger that created the run.
    #[must_use]
    pub fn trigger(&self) -> &dyn Trigger {
        self.trigger.as_ref()
    }

    /// Returns the current lifecycle status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Returns the run start timestamp.
    #[must_use]
    pub const fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Returns the run end timestamp, unset until a terminal transition.
    #[must_use]
    pub const fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Returns the appended log lines in order.
    #[must_use]
    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    /// Returns the failure message, empty unless the run failed.
    #[must_use]
    pub fn error(&self) -> &str {
        &self.error
    }

    /// Writes a new lifecycle status.
    ///
    /// # Errors
    ///
    /// Returns [`RunDomainError::InvalidStatusTransition`] when the current
    /// status is terminal or the write would regress the lifecycle. The run
    /// is left unchanged on error.
    pub fn transition_status(&mut self, to: RunStatus) -> Result<(), RunDomainError> {
        if !self.status.can_transition_to(to) {
            return Err(RunDomainError::InvalidStatusTransition {
                task_id: self.task_id,
                run_id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Records a failure message. Only meaningful on a `Failed` run.
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = error.into();
    }

    /// Overwrites the start timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`RunDomainError::EndBeforeStart`] when an end timestamp is
    /// already recorded and precedes the new start.
    pub fn set_start_time(&mut self, start: DateTime<Utc>) -> Result<(), RunDomainError> {
        if let Some(end) = self.end_time {
            if end < start {
                return Err(RunDomainError::EndBeforeStart { start, end });
            }
        }
        self.start_time = start;
        Ok(())
    }

    /// Records the end timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`RunDomainError::EndBeforeStart`] when the end precedes the
    /// recorded start.
    pub fn set_end_time(&mut self, end: DateTime<Utc>) -> Result<(), RunDomainError> {
        if end < self.start_time {
            return Err(RunDomainError::EndBeforeStart {
                start: self.start_time,
                end,
            });
        }
        self.end_time = Some(end);
        Ok(())
    }

    /// Appends a log line.
    pub fn append_log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
    }
}

/// Collection of run detail records.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskRunList(Vec<TaskRunMetadata>);

impl TaskRunList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a record.
    pub fn push(&mut self, run: TaskRunMetadata) {
        self.0.push(run);
    }

    /// Keeps only runs with the given status, preserving order.
    pub fn filter_by_status(&mut self, status: RunStatus) {
        self.0.retain(|run| run.status() == status);
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when the list holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the records.
    pub fn iter(&self) -> std::slice::Iter<'_, TaskRunMetadata> {
        self.0.iter()
    }
}

impl IntoIterator for TaskRunList {
    type Item = TaskRunMetadata;
    type IntoIter = std::vec::IntoIter<TaskRunMetadata>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a TaskRunList {
    type Item = &'a TaskRunMetadata;
    type IntoIter = std::slice::Iter<'a, TaskRunMetadata>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<TaskRunMetadata>> for TaskRunList {
    fn from(runs: Vec<TaskRunMetadata>) -> Self {
        Self(runs)
    }
}
