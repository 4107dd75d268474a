//! Task aggregate and related types.

use chrono::{DateTime, Utc};
use std::fmt;

use super::{ParseTaskTypeError, TaskId, TaskTarget};

/// Category of work a task describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    /// Creation or refresh of a managed resource.
    ResourceCreation,
}

impl TaskType {
    /// Returns the canonical wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResourceCreation => "ResourceCreation",
        }
    }
}

impl TryFrom<&str> for TaskType {
    type Error = ParseTaskTypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "ResourceCreation" => Ok(Self::ResourceCreation),
            _ => Err(ParseTaskTypeError(value.to_owned())),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistent description of a work item.
///
/// Task metadata is immutable once written; only the per-task run index and
/// the run detail records change after creation.
#[derive(Debug)]
pub struct TaskMetadata {
    id: TaskId,
    name: String,
    task_type: TaskType,
    target: Box<dyn TaskTarget>,
    date_created: DateTime<Utc>,
}

impl Clone for TaskMetadata {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            task_type: self.task_type,
            target: self.target.clone(),
            date_created: self.date_created,
        }
    }
}

impl PartialEq for TaskMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.task_type == other.task_type
            && *self.target == *other.target
            && self.date_created == other.date_created
    }
}

impl TaskMetadata {
    /// Creates task metadata.
    #[must_use]
    pub fn new(
        id: TaskId,
        name: impl Into<String>,
        task_type: TaskType,
        target: Box<dyn TaskTarget>,
        date_created: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            task_type,
            target,
            date_created,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the task type.
    #[must_use]
    pub const fn task_type(&self) -> TaskType {
        self.task_type
    }

    /// Returns the task target.
    #[must_use]
    pub fn target(&self) -> &dyn TaskTarget {
        self.target.as_ref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn date_created(&self) -> DateTime<Utc> {
        self.date_created
    }
}

/// Collection of task metadata records.
///
/// Ordering reflects whatever the storage scan returned; callers must not
/// rely on it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskMetadataList(Vec<TaskMetadata>);

impl TaskMetadataList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a record.
    pub fn push(&mut self, task: TaskMetadata) {
        self.0.push(task);
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
    pub fn iter(&self) -> std::slice::Iter<'_, TaskMetadata> {
        self.0.iter()
    }
}

impl IntoIterator for TaskMetadataList {
    type Item = TaskMetadata;
    type IntoIter = std::vec::IntoIter<TaskMetadata>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a TaskMetadataList {
    type Item = &'a TaskMetadata;
    type IntoIter = std::slice::Iter<'a, TaskMetadata>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<TaskMetadata>> for TaskMetadataList {
    fn from(tasks: Vec<TaskMetadata>) -> Self {
        Self(tasks)
    }
}
