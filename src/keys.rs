//! Persisted key layout over the ordered key/value store.
//!
//! Every query the manager serves is either a point lookup or a prefix scan
//! over these keys. The strings are part of the storage contract: other
//! writers and readers sharing a store must produce byte-identical keys.
//!
//! Date components in run-detail keys render from UTC with the month as its
//! English name and day/year as unpadded decimal integers, so scans across
//! month boundaries group by month name rather than lexical day order.

use chrono::{DateTime, Datelike, Utc};

use crate::domain::{RunId, TaskId};

/// Prefix of every task detail key.
pub const TASK_METADATA_PREFIX: &str = "/tasks/metadata/task_id=";

/// Prefix of every per-task runs-index key.
pub const TASK_RUNS_PREFIX: &str = "/tasks/runs/task_id=";

/// Prefix of every run detail key. Intentionally carries no leading slash.
pub const RUN_METADATA_PREFIX: &str = "tasks/runs/metadata";

/// Suffix appended to a run detail key to form its lock key.
const LOCK_SUFFIX: &str = "/lock";

/// Key holding the detail record of a task.
#[must_use]
pub fn task_metadata_key(id: TaskId) -> String {
    format!("{TASK_METADATA_PREFIX}{id}")
}

/// Key holding the runs index of a task.
#[must_use]
pub fn task_runs_key(id: TaskId) -> String {
    format!("{TASK_RUNS_PREFIX}{id}")
}

/// Key holding the detail record of a run, dated by its creation time.
#[must_use]
pub fn run_metadata_key(task_id: TaskId, run_id: RunId, date: DateTime<Utc>) -> String {
    format!(
        "{}/task_id={task_id}/run_id={run_id}",
        run_day_prefix(date)
    )
}

/// Prefix covering every run created on the given UTC day.
#[must_use]
pub fn run_day_prefix(date: DateTime<Utc>) -> String {
    format!(
        "{RUN_METADATA_PREFIX}/{}/{}/{}",
        date.year(),
        date.format("%B"),
        date.day()
    )
}

/// Lock key guarding the run stored at `run_detail_key`.
#[must_use]
pub fn run_lock_key(run_detail_key: &str) -> String {
    format!("{run_detail_key}{LOCK_SUFFIX}")
}

/// Extracts the numeric suffix of a `task_id=<n>` key.
///
/// Returns `None` when the key carries no `task_id=` marker or the suffix
/// is not a decimal integer.
#[must_use]
pub fn parse_task_id_suffix(key: &str) -> Option<u64> {
    let (_, suffix) = key.rsplit_once("task_id=")?;
    suffix.parse().ok()
}
