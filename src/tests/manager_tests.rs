//! Task manager surface tests over the in-memory adapter.

use mockable::Clock;
use rstest::rstest;

use super::support::{datetime, harness, harness_at, Harness, TestManager};
use crate::domain::{
    DummyTrigger, NameVariantTarget, OneOffTrigger, ProviderTarget, RunId, RunStatus, TaskId,
    TaskMetadata, TaskType,
};
use crate::keys;
use crate::ports::StorageError;
use crate::services::{RequestContext, TaskManagerError};

async fn create_etl_task(h: &Harness) -> TaskMetadata {
    h.manager
        .create_task(
            &h.ctx,
            "etl",
            TaskType::ResourceCreation,
            Box::new(NameVariantTarget::new("transactions", "v3")),
        )
        .await
        .expect("task creation should succeed")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn first_task_in_empty_store_gets_id_one() {
    let h = harness();

    let task = create_etl_task(&h).await;

    assert_eq!(task.id(), TaskId::new(1));
    assert_eq!(task.date_created(), h.clock.utc());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn task_creation_is_not_deduplicated() {
    let h = harness();

    let first = create_etl_task(&h).await;
    let second = create_etl_task(&h).await;

    assert_eq!(first.id(), TaskId::new(1));
    assert_eq!(second.id(), TaskId::new(2));
    assert_eq!(first.name(), second.name());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn created_task_is_retrievable_deep_equal() {
    let h = harness();

    let created = create_etl_task(&h).await;
    let fetched = h
        .manager
        .get_task_by_id(&h.ctx, created.id())
        .await
        .expect("lookup should succeed");

    assert_eq!(fetched, created);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn get_task_by_id_reports_missing_task() {
    let h = harness();

    let err = h
        .manager
        .get_task_by_id(&h.ctx, TaskId::new(42))
        .await
        .expect_err("lookup should fail");

    assert_eq!(err.to_string(), "task not found for id: 42");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn get_all_tasks_returns_every_created_task() {
    let h = harness();

    create_etl_task(&h).await;
    h.manager
        .create_task(
            &h.ctx,
            "warehouse sync",
            TaskType::ResourceCreation,
            Box::new(ProviderTarget::new("snowflake")),
        )
        .await
        .expect("task creation should succeed");

    let tasks = h
        .manager
        .get_all_tasks(&h.ctx)
        .await
        .expect("listing should succeed");

    assert_eq!(tasks.len(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn get_task_by_target_is_reserved() {
    let h = harness();
    let target = NameVariantTarget::new("transactions", "v3");

    let result = h.manager.get_task_by_target(&h.ctx, &target).await;

    assert!(matches!(result, Err(TaskManagerError::Unsupported(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn first_run_of_new_task_gets_id_one_and_pending_status() {
    let h = harness();
    let task = create_etl_task(&h).await;

    let run = h
        .manager
        .create_task_run(
            &h.ctx,
            "first",
            task.id(),
            Box::new(OneOffTrigger::new("t1")),
        )
        .await
        .expect("run creation should succeed");

    assert_eq!(run.id(), RunId::new(1));
    assert_eq!(run.status(), RunStatus::Pending);
    assert_eq!(run.start_time(), h.clock.utc());
    assert_eq!(run.end_time(), None);
    assert!(run.logs().is_empty());

    let fetched = h
        .manager
        .get_run_by_id(&h.ctx, task.id(), run.id())
        .await
        .expect("lookup should succeed");
    assert_eq!(fetched, run);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn run_ids_are_sequential_per_task() {
    let h = harness();
    let first_task = create_etl_task(&h).await;
    let second_task = create_etl_task(&h).await;

    for expected in 1..=3u64 {
        let run = h
            .manager
            .create_task_run(
                &h.ctx,
                "run",
                first_task.id(),
                Box::new(OneOffTrigger::new("t")),
            )
            .await
            .expect("run creation should succeed");
        assert_eq!(run.id(), RunId::new(expected));
    }

    let other = h
        .manager
        .create_task_run(
            &h.ctx,
            "run",
            second_task.id(),
            Box::new(OneOffTrigger::new("t")),
        )
        .await
        .expect("run creation should succeed");
    assert_eq!(other.id(), RunId::new(1));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn create_task_run_rejects_unknown_task() {
    let h = harness();

    let result = h
        .manager
        .create_task_run(
            &h.ctx,
            "orphan",
            TaskId::new(9),
            Box::new(OneOffTrigger::new("t")),
        )
        .await;

    assert!(matches!(result, Err(TaskManagerError::TaskNotFound(id)) if id == TaskId::new(9)));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_runs_index_is_healed_to_empty_list() {
    let h = harness();
    let task = create_etl_task(&h).await;
    h.storage
        .remove(&keys::task_runs_key(task.id()))
        .expect("removal should succeed");

    let run = h
        .manager
        .create_task_run(
            &h.ctx,
            "first-after-heal",
            task.id(),
            Box::new(OneOffTrigger::new("t1")),
        )
        .await
        .expect("run creation should succeed");

    assert_eq!(run.id(), RunId::new(1));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unindexed_run_reports_run_not_found() {
    let h = harness();
    let task = create_etl_task(&h).await;

    let err = h
        .manager
        .get_run_by_id(&h.ctx, task.id(), RunId::new(5))
        .await
        .expect_err("lookup should fail");

    assert_eq!(err.to_string(), "run not found");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn indexed_run_with_missing_detail_reports_detail_missing() {
    let h = harness();
    let task = create_etl_task(&h).await;
    let run = h
        .manager
        .create_task_run(&h.ctx, "run", task.id(), Box::new(OneOffTrigger::new("t")))
        .await
        .expect("run creation should succeed");

    h.storage
        .remove(&keys::run_metadata_key(task.id(), run.id(), run.start_time()))
        .expect("removal should succeed");

    let err = h
        .manager
        .get_run_by_id(&h.ctx, task.id(), run.id())
        .await
        .expect_err("lookup should fail");

    assert!(matches!(
        err,
        TaskManagerError::RunDetailMissing { task_id, run_id }
            if task_id == task.id() && run_id == run.id()
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn get_runs_by_date_keeps_runs_inside_the_window() {
    let h = harness_at(datetime(2024, 3, 15, 9, 0, 0));
    let task = create_etl_task(&h).await;

    for hour in [9, 10, 11] {
        h.clock.set(datetime(2024, 3, 15, hour, 0, 0));
        h.manager
            .create_task_run(&h.ctx, "run", task.id(), Box::new(OneOffTrigger::new("t")))
            .await
            .expect("run creation should succeed");
    }

    let runs = h
        .manager
        .get_runs_by_date(
            &h.ctx,
            datetime(2024, 3, 15, 9, 30, 0),
            datetime(2024, 3, 15, 10, 30, 0),
        )
        .await
        .expect("query should succeed");

    assert_eq!(runs.len(), 1);
    let only = runs.iter().next().expect("one run");
    assert_eq!(only.start_time(), datetime(2024, 3, 15, 10, 0, 0));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn get_runs_by_date_on_empty_day_returns_empty_list() {
    let h = harness();
    create_etl_task(&h).await;

    let runs = h
        .manager
        .get_runs_by_date(
            &h.ctx,
            datetime(2024, 7, 1, 0, 0, 0),
            datetime(2024, 7, 1, 23, 59, 59),
        )
        .await
        .expect("query should succeed");

    assert!(runs.is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn get_all_task_runs_spans_days_and_tasks() {
    let h = harness_at(datetime(2024, 3, 15, 9, 0, 0));
    let first_task = create_etl_task(&h).await;
    let second_task = create_etl_task(&h).await;

    h.manager
        .create_task_run(
            &h.ctx,
            "run",
            first_task.id(),
            Box::new(OneOffTrigger::new("t")),
        )
        .await
        .expect("run creation should succeed");
    h.clock.set(datetime(2024, 4, 2, 9, 0, 0));
    h.manager
        .create_task_run(
            &h.ctx,
            "run",
            second_task.id(),
            Box::new(DummyTrigger::new("t", true)),
        )
        .await
        .expect("run creation should succeed");

    let runs = h
        .manager
        .get_all_task_runs(&h.ctx)
        .await
        .expect("query should succeed");

    assert_eq!(runs.len(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn filter_by_status_keeps_matching_runs_in_order() {
    let h = harness();
    let task = create_etl_task(&h).await;
    for _ in 0..3 {
        h.manager
            .create_task_run(&h.ctx, "run", task.id(), Box::new(OneOffTrigger::new("t")))
            .await
            .expect("run creation should succeed");
    }

    let mut runs = h
        .manager
        .get_all_task_runs(&h.ctx)
        .await
        .expect("query should succeed");

    runs.filter_by_status(RunStatus::Pending);
    assert_eq!(runs.len(), 3);

    runs.filter_by_status(RunStatus::Succeeded);
    assert!(runs.is_empty());

    // Filtering an already-empty list stays empty.
    runs.filter_by_status(RunStatus::Pending);
    assert!(runs.is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancelled_context_aborts_before_storage_calls() {
    let h = harness();
    h.ctx.cancel();

    let result = h
        .manager
        .create_task(
            &h.ctx,
            "etl",
            TaskType::ResourceCreation,
            Box::new(ProviderTarget::new("snowflake")),
        )
        .await;

    assert!(matches!(result, Err(TaskManagerError::Cancelled)));
    let fresh = RequestContext::new();
    let tasks = h
        .manager
        .get_all_tasks(&fresh)
        .await
        .expect("listing should succeed");
    assert!(tasks.is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_run_creation_serializes_on_the_index_lease() {
    let h = harness();
    let task = create_etl_task(&h).await;

    let (first, second) = tokio::join!(
        create_run_with_retry(&h.manager, task.id(), "racer-a"),
        create_run_with_retry(&h.manager, task.id(), "racer-b"),
    );

    assert_ne!(first.id(), second.id());
    for run in [first, second] {
        let fetched = h
            .manager
            .get_run_by_id(&h.ctx, task.id(), run.id())
            .await
            .expect("racer run should be fetchable");
        assert_eq!(fetched, run);
    }
}

async fn create_run_with_retry(
    manager: &TestManager,
    task_id: TaskId,
    name: &str,
) -> crate::domain::TaskRunMetadata {
    loop {
        let ctx = RequestContext::new();
        match manager
            .create_task_run(&ctx, name, task_id, Box::new(OneOffTrigger::new(name)))
            .await
        {
            Ok(run) => return run,
            Err(TaskManagerError::Storage(StorageError::LockConflict { .. })) => {
                tokio::task::yield_now().await;
            }
            Err(err) => panic!("unexpected error: {err:?}"),
        }
    }
}

#[rstest]
fn nil_request_id_is_replaced_with_a_fresh_one() {
    let ctx = RequestContext::with_request_id(uuid::Uuid::nil());

    assert!(!ctx.request_id().is_nil());
}
