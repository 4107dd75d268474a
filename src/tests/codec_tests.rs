//! Wire codec tests: round trips, corrupt inputs, and canonical output.

use rstest::{fixture, rstest};

use super::support::datetime;
use crate::codec::{self, CodecError, CodecRegistry};
use crate::domain::{
    DummyTrigger, NameVariantTarget, OneOffTrigger, ProviderTarget, RunId, RunStatus, TaskId,
    TaskMetadata, TaskRunMetadata, TaskRunRecord, TaskRuns, TaskType, Trigger,
};

#[fixture]
fn registry() -> CodecRegistry {
    CodecRegistry::new()
}

fn one_off_run() -> TaskRunMetadata {
    TaskRunMetadata::new(
        RunId::new(1),
        TaskId::new(12),
        "oneoff_taskrun",
        Box::new(OneOffTrigger::new("name1")),
        datetime(2024, 3, 15, 10, 0, 0),
    )
}

fn dummy_run() -> TaskRunMetadata {
    let mut run = TaskRunMetadata::from_persisted(
        RunId::new(1),
        TaskId::new(12),
        String::from("dummy_taskrun"),
        Box::new(DummyTrigger::new("name2", true)),
        RunStatus::Failed,
        datetime(2024, 3, 15, 10, 0, 0),
        Some(datetime(2024, 3, 15, 10, 5, 0)),
        vec![String::from("step one"), String::from("step two")],
        String::from("exploded"),
    );
    run.append_log("step three");
    run
}

#[rstest]
#[case(one_off_run(), OneOffTrigger::TYPE_TAG)]
#[case(dummy_run(), DummyTrigger::TYPE_TAG)]
fn run_round_trip_preserves_fields_and_tag(
    registry: CodecRegistry,
    #[case] run: TaskRunMetadata,
    #[case] expected_tag: &str,
) {
    let encoded = codec::encode_run(&run).expect("encode should succeed");
    let decoded = codec::decode_run(&encoded, &registry).expect("decode should succeed");

    assert_eq!(decoded, run);
    assert_eq!(decoded.trigger().trigger_type(), expected_tag);
}

#[rstest]
fn run_encoding_is_canonical(registry: CodecRegistry) {
    let run = dummy_run();

    let first = codec::encode_run(&run).expect("encode should succeed");
    let decoded = codec::decode_run(&first, &registry).expect("decode should succeed");
    let second = codec::encode_run(&decoded).expect("re-encode should succeed");

    assert_eq!(first, second);
}

#[rstest]
#[case(
    TaskMetadata::new(
        TaskId::new(1),
        "etl",
        TaskType::ResourceCreation,
        Box::new(NameVariantTarget::new("transactions", "v3")),
        datetime(2024, 3, 15, 9, 30, 0),
    ),
    NameVariantTarget::TYPE_TAG
)]
#[case(
    TaskMetadata::new(
        TaskId::new(2),
        "warehouse sync",
        TaskType::ResourceCreation,
        Box::new(ProviderTarget::new("snowflake")),
        datetime(2024, 3, 15, 9, 45, 0),
    ),
    ProviderTarget::TYPE_TAG
)]
fn task_round_trip_preserves_fields_and_tag(
    registry: CodecRegistry,
    #[case] task: TaskMetadata,
    #[case] expected_tag: &str,
) {
    let encoded = codec::encode_task(&task).expect("encode should succeed");
    let decoded = codec::decode_task(&encoded, &registry).expect("decode should succeed");

    assert_eq!(decoded, task);
    assert_eq!(decoded.target().target_type(), expected_tag);
}

#[rstest]
fn runs_index_round_trip() {
    let mut index = TaskRuns::new(TaskId::new(3));
    index.append(TaskRunRecord::new(
        RunId::new(1),
        datetime(2024, 3, 15, 10, 0, 0),
    ));
    index.append(TaskRunRecord::new(
        RunId::new(2),
        datetime(2024, 3, 16, 11, 0, 0),
    ));

    let encoded = codec::encode_runs_index(&index).expect("encode should succeed");
    let decoded = codec::decode_runs_index(&encoded).expect("decode should succeed");

    assert_eq!(decoded, index);
    assert_eq!(decoded.next_run_id(), RunId::new(3));
}

#[rstest]
fn decode_run_rejects_invalid_json(registry: CodecRegistry) {
    let raw = r#"{"id"1, "TaskId": 12, "name": "invalid_json_file"}"#;

    let result = codec::decode_run(raw, &registry);

    assert!(matches!(result, Err(CodecError::Malformed(_))));
}

#[rstest]
fn decode_run_rejects_missing_name(registry: CodecRegistry) {
    let raw = r#"{"id": 1, "TaskId": 12,
        "trigger": {"triggerName": "name5", "triggerType": "OneOffTrigger"},
        "status": "FAILED", "startTime": "2021-08-26T15:04:05Z",
        "endTime": "2021-08-26T15:04:05Z", "logs": null, "error": ""}"#;

    let err = codec::decode_run(raw, &registry).expect_err("decode should fail");

    assert_eq!(err, CodecError::MissingField("name"));
    assert_eq!(err.to_string(), "Missing field 'name'");
}

#[rstest]
fn decode_run_rejects_missing_trigger(registry: CodecRegistry) {
    let raw = r#"{"id": 1, "TaskId": 12, "name": "no_trigger",
        "status": "FAILED", "startTime": "2021-08-26T15:04:05Z",
        "endTime": "2021-08-26T15:04:05Z", "logs": null, "error": ""}"#;

    let err = codec::decode_run(raw, &registry).expect_err("decode should fail");

    assert_eq!(err, CodecError::MissingField("trigger"));
    assert_eq!(err.to_string(), "Missing field 'trigger'");
}

#[rstest]
fn decode_run_rejects_unknown_status(registry: CodecRegistry) {
    let raw = r#"{"id": 1, "TaskId": 12, "name": "bad_status",
        "trigger": {"triggerName": "name6", "triggerType": "OneOffTrigger"},
        "status": "NOSTATUS", "startTime": "2021-08-26T15:04:05Z",
        "endTime": "2021-08-26T15:04:05Z", "logs": null, "error": ""}"#;

    let err = codec::decode_run(raw, &registry).expect_err("decode should fail");

    assert_eq!(err.to_string(), "No such status: 'NOSTATUS'");
}

#[rstest]
fn decode_run_rejects_unknown_trigger_tag(registry: CodecRegistry) {
    let raw = r#"{"id": 1, "TaskId": 12, "name": "bad_trigger",
        "trigger": {"triggerName": "name7", "triggerType": "wrongTrigger"},
        "status": "PENDING", "startTime": "2021-08-26T15:04:05Z",
        "endTime": "2021-08-26T15:04:05Z", "logs": null, "error": ""}"#;

    let err = codec::decode_run(raw, &registry).expect_err("decode should fail");

    assert_eq!(err.to_string(), "No such target type: 'wrongTrigger'");
}

#[rstest]
fn decode_run_rejects_trigger_array(registry: CodecRegistry) {
    let raw = r#"{"id": 1, "TaskId": 12, "name": "array_trigger",
        "trigger": ["triggerName", "name8"],
        "status": "PENDING", "startTime": "2021-08-26T15:04:05Z",
        "endTime": "2021-08-26T15:04:05Z", "logs": null, "error": ""}"#;

    let err = codec::decode_run(raw, &registry).expect_err("decode should fail");

    assert_eq!(err, CodecError::WrongTriggerFormat);
    assert_eq!(err.to_string(), "Wrong format of Trigger");
}

#[rstest]
fn decode_run_accepts_null_end_time_and_logs(registry: CodecRegistry) {
    let raw = r#"{"id": 4, "TaskId": 12, "name": "fresh_run",
        "trigger": {"triggerName": "name9", "triggerType": "OneOffTrigger"},
        "status": "PENDING", "startTime": "2021-08-26T15:04:05Z",
        "endTime": null, "logs": null, "error": ""}"#;

    let run = codec::decode_run(raw, &registry).expect("decode should succeed");

    assert_eq!(run.end_time(), None);
    assert!(run.logs().is_empty());
    assert_eq!(run.error(), "");
}

#[rstest]
fn decode_task_rejects_unknown_target_tag(registry: CodecRegistry) {
    let raw = r#"{"ID": 1, "Name": "etl", "TaskType": "ResourceCreation",
        "Target": {"name": "n", "targetType": "wrongTarget"},
        "TargetType": "wrongTarget", "DateCreated": "2021-08-26T15:04:05Z"}"#;

    let err = codec::decode_task(raw, &registry).expect_err("decode should fail");

    assert_eq!(err.to_string(), "No such target type: 'wrongTarget'");
}

#[rstest]
fn decode_task_rejects_unknown_task_type(registry: CodecRegistry) {
    let raw = r#"{"ID": 1, "Name": "etl", "TaskType": "Mystery",
        "Target": {"name": "n", "variant": "v", "targetType": "NameVariant"},
        "TargetType": "NameVariant", "DateCreated": "2021-08-26T15:04:05Z"}"#;

    let err = codec::decode_task(raw, &registry).expect_err("decode should fail");

    assert_eq!(err.to_string(), "No such task type: 'Mystery'");
}

#[rstest]
fn trigger_payload_embeds_tag() {
    let trigger = DummyTrigger::new("fixture", false);

    let payload = trigger.to_payload();

    assert_eq!(
        payload.get("triggerType").and_then(|v| v.as_str()),
        Some(DummyTrigger::TYPE_TAG)
    );
    assert_eq!(payload.get("dummyField").and_then(|v| v.as_bool()), Some(false));
}

#[rstest]
fn registered_variants_are_discoverable(registry: CodecRegistry) {
    assert!(registry.triggers().has_variant(OneOffTrigger::TYPE_TAG));
    assert!(registry.triggers().has_variant(DummyTrigger::TYPE_TAG));
    assert!(registry.targets().has_variant(NameVariantTarget::TYPE_TAG));
    assert!(registry.targets().has_variant(ProviderTarget::TYPE_TAG));
    assert!(!registry.triggers().has_variant("wrongTrigger"));
}
