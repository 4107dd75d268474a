//! Task manager: the bookkeeping surface consulted by executors.

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::RequestContext;
use crate::codec::{self, CodecError, CodecRegistry};
use crate::domain::{
    RunDomainError, RunId, RunStatus, TaskId, TaskMetadata, TaskMetadataList, TaskRunList,
    TaskRunMetadata, TaskRunRecord, TaskRuns, TaskTarget, TaskType, Trigger,
};
use crate::keys;
use crate::ports::{LockLease, StorageError, StorageProvider};

/// Result type for task manager operations.
pub type TaskManagerResult<T> = Result<T, TaskManagerError>;

/// Errors returned by [`TaskManager`] operations.
#[derive(Debug, Error)]
pub enum TaskManagerError {
    /// No task detail record exists for the identifier.
    #[error("task not found for id: {0}")]
    TaskNotFound(TaskId),

    /// The runs index has no entry for the run identifier.
    #[error("run not found")]
    RunNotFound,

    /// The runs index references a run whose detail record is absent.
    ///
    /// Indicates a partially-applied `create_task_run`; the index is left
    /// untouched and the run can be recreated by retrying.
    #[error("run detail missing for task_id={task_id} run_id={run_id}")]
    RunDetailMissing {
        /// Owning task identifier.
        task_id: TaskId,
        /// Indexed run identifier.
        run_id: RunId,
    },

    /// A key under the task prefix does not carry a parsable id suffix.
    #[error("invalid format for key: '{0}'")]
    MalformedKey(String),

    /// A persisted record failed to decode.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The storage backend failed, or a lease was contended or stale.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A run mutation violated a domain rule.
    #[error(transparent)]
    Domain(#[from] RunDomainError),

    /// The request context was cancelled before the next storage call.
    #[error("operation cancelled")]
    Cancelled,

    /// The operation is reserved but not implemented.
    #[error("not implemented: {0}")]
    Unsupported(&'static str),
}

/// Proof of lease holdership over one run.
///
/// Returned by [`TaskManager::lock_task_run`]; every mutating run operation
/// takes a reference to it, so holdership is established by construction
/// rather than re-checked per call. Unlocking is fenced by the lease token.
#[derive(Debug)]
pub struct RunLock {
    task_id: TaskId,
    run_id: RunId,
    detail_key: String,
    lease: LockLease,
}

impl RunLock {
    /// Returns the locked run's owning task identifier.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the locked run identifier.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Returns the instant the lease lapses unless refreshed.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.lease.expires_at()
    }
}

/// Persistent task and task-run manager.
///
/// Stateless in memory: every operation is a small bounded number of
/// storage calls, and all concurrency safety derives from the storage
/// backend and the lease lock. Reads take no locks.
pub struct TaskManager<S, C>
where
    S: StorageProvider,
    C: Clock + Send + Sync,
{
    storage: Arc<S>,
    clock: Arc<C>,
    registry: Arc<CodecRegistry>,
    lock_ttl: TimeDelta,
}

impl<S, C> TaskManager<S, C>
where
    S: StorageProvider,
    C: Clock + Send + Sync,
{
    /// Default lease TTL for run locks and the runs-index lease.
    const DEFAULT_LOCK_TTL_SECS: i64 = 30;

    /// Creates a manager over the given storage and clock with the
    /// built-in codec registries.
    #[must_use]
    pub fn new(storage: Arc<S>, clock: Arc<C>) -> Self {
        Self {
            storage,
            clock,
            registry: Arc::new(CodecRegistry::new()),
            lock_ttl: TimeDelta::seconds(Self::DEFAULT_LOCK_TTL_SECS),
        }
    }

    /// Replaces the codec registries, e.g. to register host-specific
    /// trigger or target variants.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<CodecRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Overrides the lease TTL used for run locks.
    #[must_use]
    pub fn with_lock_ttl(mut self, ttl: TimeDelta) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Creates a task and initializes its empty runs index.
    ///
    /// Identifier allocation scans existing task keys and assigns
    /// `max + 1`, starting at 1. The detail and index records are written
    /// separately; a failure between the two leaves a task whose index is
    /// healed to the empty list on first read, so retrying is safe.
    /// Creation is not de-duplicated: repeating the call with identical
    /// arguments creates a fresh task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskManagerError::MalformedKey`] when an existing task key
    /// fails to parse, or storage/codec errors.
    pub async fn create_task(
        &self,
        ctx: &RequestContext,
        name: impl Into<String>,
        task_type: TaskType,
        target: Box<dyn TaskTarget>,
    ) -> TaskManagerResult<TaskMetadata> {
        let name = name.into();
        debug!(request_id = %ctx.request_id(), task = %name, "creating task");

        ctx.ensure_active()?;
        let existing = self.storage.list_keys(keys::TASK_METADATA_PREFIX).await?;
        let id = next_task_id(&existing)?;

        let metadata = TaskMetadata::new(id, name, task_type, target, self.clock.utc());
        let encoded = codec::encode_task(&metadata)?;
        ctx.ensure_active()?;
        self.storage
            .set(&keys::task_metadata_key(id), &encoded)
            .await?;

        let index = codec::encode_runs_index(&TaskRuns::new(id))?;
        ctx.ensure_active()?;
        self.storage.set(&keys::task_runs_key(id), &index).await?;

        Ok(metadata)
    }

    /// Fetches a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskManagerError::TaskNotFound`] when no record exists,
    /// or storage/codec errors.
    pub async fn get_task_by_id(
        &self,
        ctx: &RequestContext,
        id: TaskId,
    ) -> TaskManagerResult<TaskMetadata> {
        debug!(request_id = %ctx.request_id(), task_id = %id, "fetching task");

        ctx.ensure_active()?;
        let values = self
            .storage
            .get(&keys::task_metadata_key(id), false)
            .await?;
        let raw = values
            .first()
            .ok_or(TaskManagerError::TaskNotFound(id))?;
        Ok(codec::decode_task(raw, &self.registry)?)
    }

    /// Fetches every task. Ordering is unspecified.
    ///
    /// # Errors
    ///
    /// Any decode failure aborts the whole call.
    pub async fn get_all_tasks(&self, ctx: &RequestContext) -> TaskManagerResult<TaskMetadataList> {
        debug!(request_id = %ctx.request_id(), "fetching all tasks");

        ctx.ensure_active()?;
        let values = self.storage.get(keys::TASK_METADATA_PREFIX, true).await?;
        let mut tasks = TaskMetadataList::new();
        for raw in &values {
            tasks.push(codec::decode_task(raw, &self.registry)?);
        }
        Ok(tasks)
    }

    /// Reserved lookup by target.
    ///
    /// # Errors
    ///
    /// Always returns [`TaskManagerError::Unsupported`]; target uniqueness
    /// semantics are unresolved.
    pub async fn get_task_by_target(
        &self,
        ctx: &RequestContext,
        _target: &dyn TaskTarget,
    ) -> TaskManagerResult<TaskMetadataList> {
        debug!(request_id = %ctx.request_id(), "fetching tasks by target");
        Err(TaskManagerError::Unsupported("get_task_by_target"))
    }

    /// Creates a run of a task.
    ///
    /// The new run starts `Pending` with its start time stamped from the
    /// manager clock. The runs index is updated under a lease on the index
    /// key, so concurrent creators on the same task serialize instead of
    /// losing run ids. The index append and the detail write are still two
    /// separate storage calls: a failure between them leaves an index
    /// entry whose detail read reports
    /// [`TaskManagerError::RunDetailMissing`].
    ///
    /// # Errors
    ///
    /// Returns [`TaskManagerError::TaskNotFound`] when the task does not
    /// exist, [`StorageError::LockConflict`] when the index lease is
    /// contended, or storage/codec errors.
    pub async fn create_task_run(
        &self,
        ctx: &RequestContext,
        name: impl Into<String>,
        task_id: TaskId,
        trigger: Box<dyn Trigger>,
    ) -> TaskManagerResult<TaskRunMetadata> {
        let name = name.into();
        debug!(request_id = %ctx.request_id(), task_id = %task_id, run = %name, "creating task run");

        ctx.ensure_active()?;
        let index_key = keys::task_runs_key(task_id);
        // One holder per call: a shared request context must not let two
        // concurrent creators both pass the same-holder refresh path.
        let holder = format!("taskledger/{}/{}", ctx.request_id(), uuid::Uuid::new_v4());
        let lease = self.storage.lock(&index_key, &holder, self.lock_ttl).await?;

        let result = self
            .create_task_run_locked(ctx, name, task_id, trigger, &index_key)
            .await;

        if let Err(err) = self.storage.unlock(&index_key, &lease).await {
            warn!(
                request_id = %ctx.request_id(),
                task_id = %task_id,
                error = %err,
                "failed to release runs index lease, it will expire on its own"
            );
        }
        result
    }

    async fn create_task_run_locked(
        &self,
        ctx: &RequestContext,
        name: String,
        task_id: TaskId,
        trigger: Box<dyn Trigger>,
        index_key: &str,
    ) -> TaskManagerResult<TaskRunMetadata> {
        ctx.ensure_active()?;
        let mut index = match self.storage.get(index_key, false).await?.first() {
            Some(raw) => codec::decode_runs_index(raw)?,
            None => self.heal_missing_index(ctx, task_id).await?,
        };

        let run_id = index.next_run_id();
        let start_time = self.clock.utc();
        let metadata = TaskRunMetadata::new(run_id, task_id, name, trigger, start_time);
        index.append(TaskRunRecord::new(run_id, start_time));

        let encoded_index = codec::encode_runs_index(&index)?;
        ctx.ensure_active()?;
        self.storage.set(index_key, &encoded_index).await?;

        let encoded_run = codec::encode_run(&metadata)?;
        ctx.ensure_active()?;
        self.storage
            .set(
                &keys::run_metadata_key(task_id, run_id, start_time),
                &encoded_run,
            )
            .await?;

        Ok(metadata)
    }

    /// A missing runs index is only valid for a task that exists; it then
    /// stands for the empty list (partial `create_task`).
    async fn heal_missing_index(
        &self,
        ctx: &RequestContext,
        task_id: TaskId,
    ) -> TaskManagerResult<TaskRuns> {
        ctx.ensure_active()?;
        let detail = self
            .storage
            .get(&keys::task_metadata_key(task_id), false)
            .await?;
        if detail.is_empty() {
            return Err(TaskManagerError::TaskNotFound(task_id));
        }
        warn!(
            request_id = %ctx.request_id(),
            task_id = %task_id,
            "runs index missing for existing task, treating as empty"
        );
        Ok(TaskRuns::new(task_id))
    }

    /// Fetches a run by identifier.
    ///
    /// The runs index recovers the run's creation date, which composes the
    /// dated detail key.
    ///
    /// # Errors
    ///
    /// Returns [`TaskManagerError::RunNotFound`] when the index has no
    /// entry, [`TaskManagerError::RunDetailMissing`] when the index entry
    /// exists but the detail record is absent, or storage/codec errors.
    pub async fn get_run_by_id(
        &self,
        ctx: &RequestContext,
        task_id: TaskId,
        run_id: RunId,
    ) -> TaskManagerResult<TaskRunMetadata> {
        debug!(request_id = %ctx.request_id(), task_id = %task_id, run_id = %run_id, "fetching run");

        let record = self.find_run_record(ctx, task_id, run_id).await?;
        let detail_key = keys::run_metadata_key(task_id, run_id, record.date_created());
        self.read_run_detail(ctx, task_id, run_id, &detail_key)
            .await
    }

    /// Fetches the runs created on the day of `start`, keeping those whose
    /// start time falls within `[start, end]`.
    ///
    /// A day with no runs yields an empty list.
    ///
    /// # Errors
    ///
    /// Any decode failure aborts the whole call.
    pub async fn get_runs_by_date(
        &self,
        ctx: &RequestContext,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> TaskManagerResult<TaskRunList> {
        debug!(request_id = %ctx.request_id(), %start, %end, "fetching runs by date");

        ctx.ensure_active()?;
        let values = self
            .storage
            .get(&keys::run_day_prefix(start), true)
            .await?;
        let mut runs = TaskRunList::new();
        for raw in &values {
            let run = codec::decode_run(raw, &self.registry)?;
            if run.start_time() >= start && run.start_time() <= end {
                runs.push(run);
            }
        }
        Ok(runs)
    }

    /// Fetches every run of every task.
    ///
    /// # Errors
    ///
    /// Any decode failure aborts the whole call.
    pub async fn get_all_task_runs(&self, ctx: &RequestContext) -> TaskManagerResult<TaskRunList> {
        debug!(request_id = %ctx.request_id(), "fetching all task runs");

        ctx.ensure_active()?;
        let values = self.storage.get(keys::RUN_METADATA_PREFIX, true).await?;
        let mut runs = TaskRunList::new();
        for raw in &values {
            runs.push(codec::decode_run(raw, &self.registry)?);
        }
        Ok(runs)
    }

    /// Acquires the lease lock on a run for `holder`.
    ///
    /// The lock is advisory: reads never take it, and only the returned
    /// [`RunLock`] unlocks mutating operations. An expired lease is
    /// reclaimable by any contender.
    ///
    /// # Errors
    ///
    /// Returns [`TaskManagerError::RunNotFound`] when the run is not
    /// indexed, or [`StorageError::LockConflict`] when another holder owns
    /// an unexpired lease.
    pub async fn lock_task_run(
        &self,
        ctx: &RequestContext,
        task_id: TaskId,
        run_id: RunId,
        holder: &str,
    ) -> TaskManagerResult<RunLock> {
        debug!(request_id = %ctx.request_id(), task_id = %task_id, run_id = %run_id, holder, "locking run");

        let record = self.find_run_record(ctx, task_id, run_id).await?;
        let detail_key = keys::run_metadata_key(task_id, run_id, record.date_created());
        ctx.ensure_active()?;
        let lease = self
            .storage
            .lock(&keys::run_lock_key(&detail_key), holder, self.lock_ttl)
            .await?;
        Ok(RunLock {
            task_id,
            run_id,
            detail_key,
            lease,
        })
    }

    /// Releases a run lock.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::StaleLease`] when the lease no longer
    /// matches the stored one (expired and reclaimed, or refreshed).
    pub async fn unlock_task_run(
        &self,
        ctx: &RequestContext,
        lock: RunLock,
    ) -> TaskManagerResult<()> {
        debug!(request_id = %ctx.request_id(), task_id = %lock.task_id, run_id = %lock.run_id, "unlocking run");

        ctx.ensure_active()?;
        self.storage
            .unlock(&keys::run_lock_key(&lock.detail_key), &lock.lease)
            .await?;
        Ok(())
    }

    /// Re-arms the TTL of a held run lock.
    ///
    /// The lock is updated in place with the fresh lease; the previous
    /// lease handle becomes stale.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockConflict`] when the lease lapsed and
    /// another holder reclaimed it.
    pub async fn refresh_task_run_lock(
        &self,
        ctx: &RequestContext,
        lock: &mut RunLock,
    ) -> TaskManagerResult<()> {
        debug!(request_id = %ctx.request_id(), task_id = %lock.task_id, run_id = %lock.run_id, "refreshing run lock");

        ctx.ensure_active()?;
        lock.lease = self
            .storage
            .lock(
                &keys::run_lock_key(&lock.detail_key),
                lock.lease.holder(),
                self.lock_ttl,
            )
            .await?;
        Ok(())
    }

    /// Writes a run's lifecycle status.
    ///
    /// `error` is recorded only when the new status is `Failed`.
    ///
    /// # Errors
    ///
    /// Returns [`RunDomainError::InvalidStatusTransition`] when the write
    /// would regress from a terminal status; the persisted record is left
    /// unchanged.
    pub async fn set_run_status(
        &self,
        ctx: &RequestContext,
        lock: &RunLock,
        status: RunStatus,
        error: Option<String>,
    ) -> TaskManagerResult<TaskRunMetadata> {
        debug!(
            request_id = %ctx.request_id(),
            task_id = %lock.task_id,
            run_id = %lock.run_id,
            status = %status,
            "setting run status"
        );

        let mut run = self
            .read_run_detail(ctx, lock.task_id, lock.run_id, &lock.detail_key)
            .await?;
        run.transition_status(status)?;
        if status == RunStatus::Failed {
            if let Some(message) = error {
                run.set_error(message);
            }
        }
        self.write_run_detail(ctx, lock, &run).await?;
        Ok(run)
    }

    /// Overwrites a run's start time.
    ///
    /// # Errors
    ///
    /// Returns [`RunDomainError::EndBeforeStart`] when a recorded end time
    /// precedes the new start.
    pub async fn set_run_start_time(
        &self,
        ctx: &RequestContext,
        lock: &RunLock,
        start: DateTime<Utc>,
    ) -> TaskManagerResult<TaskRunMetadata> {
        debug!(request_id = %ctx.request_id(), task_id = %lock.task_id, run_id = %lock.run_id, "setting run start time");

        let mut run = self
            .read_run_detail(ctx, lock.task_id, lock.run_id, &lock.detail_key)
            .await?;
        run.set_start_time(start)?;
        self.write_run_detail(ctx, lock, &run).await?;
        Ok(run)
    }

    /// Records a run's end time.
    ///
    /// # Errors
    ///
    /// Returns [`RunDomainError::EndBeforeStart`] when the end precedes
    /// the recorded start.
    pub async fn set_run_end_time(
        &self,
        ctx: &RequestContext,
        lock: &RunLock,
        end: DateTime<Utc>,
    ) -> TaskManagerResult<TaskRunMetadata> {
        debug!(request_id = %ctx.request_id(), task_id = %lock.task_id, run_id = %lock.run_id, "setting run end time");

        let mut run = self
            .read_run_detail(ctx, lock.task_id, lock.run_id, &lock.detail_key)
            .await?;
        run.set_end_time(end)?;
        self.write_run_detail(ctx, lock, &run).await?;
        Ok(run)
    }

    /// Appends a line to a run's log.
    ///
    /// Ordering across holders follows lock acquisition order.
    ///
    /// # Errors
    ///
    /// Returns storage/codec errors from the read-modify-write.
    pub async fn append_run_log(
        &self,
        ctx: &RequestContext,
        lock: &RunLock,
        line: impl Into<String>,
    ) -> TaskManagerResult<TaskRunMetadata> {
        debug!(request_id = %ctx.request_id(), task_id = %lock.task_id, run_id = %lock.run_id, "appending run log");

        let mut run = self
            .read_run_detail(ctx, lock.task_id, lock.run_id, &lock.detail_key)
            .await?;
        run.append_log(line);
        self.write_run_detail(ctx, lock, &run).await?;
        Ok(run)
    }

    async fn find_run_record(
        &self,
        ctx: &RequestContext,
        task_id: TaskId,
        run_id: RunId,
    ) -> TaskManagerResult<TaskRunRecord> {
        ctx.ensure_active()?;
        let values = self
            .storage
            .get(&keys::task_runs_key(task_id), false)
            .await?;
        let raw = values.first().ok_or(TaskManagerError::RunNotFound)?;
        let index = codec::decode_runs_index(raw)?;
        index
            .find(run_id)
            .copied()
            .ok_or(TaskManagerError::RunNotFound)
    }

    async fn read_run_detail(
        &self,
        ctx: &RequestContext,
        task_id: TaskId,
        run_id: RunId,
        detail_key: &str,
    ) -> TaskManagerResult<TaskRunMetadata> {
        ctx.ensure_active()?;
        let values = self.storage.get(detail_key, false).await?;
        let Some(raw) = values.first() else {
            warn!(
                request_id = %ctx.request_id(),
                task_id = %task_id,
                run_id = %run_id,
                "runs index references a run with no detail record"
            );
            return Err(TaskManagerError::RunDetailMissing { task_id, run_id });
        };
        Ok(codec::decode_run(raw, &self.registry)?)
    }

    async fn write_run_detail(
        &self,
        ctx: &RequestContext,
        lock: &RunLock,
        run: &TaskRunMetadata,
    ) -> TaskManagerResult<()> {
        let encoded = codec::encode_run(run)?;
        ctx.ensure_active()?;
        self.storage.set(&lock.detail_key, &encoded).await?;
        Ok(())
    }
}

/// Finds the highest `task_id=<n>` suffix among `existing` and returns the
/// next identifier, starting at 1 for an empty namespace.
fn next_task_id(existing: &[String]) -> TaskManagerResult<TaskId> {
    let mut highest = 0;
    for key in existing {
        let id = keys::parse_task_id_suffix(key)
            .ok_or_else(|| TaskManagerError::MalformedKey(key.clone()))?;
        highest = highest.max(id);
    }
    Ok(TaskId::new(highest + 1))
}
