//! Wire encoding for persisted records.
//!
//! Records are self-describing JSON: polymorphic fields embed a
//! discriminator tag, and decoding dispatches through the variant
//! registries in [`registry`] so new trigger or target variants need no
//! change here. The encoding is canonical — serde_json orders object keys,
//! so serialize/deserialize/serialize is byte-identical for the same
//! logical value.

mod registry;

pub use registry::{
    CodecRegistry, TargetDecoderFn, TargetRegistry, TriggerDecoderFn, TriggerRegistry,
};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::domain::{
    ParseStatusError, ParseTaskTypeError, RunId, RunStatus, TaskId, TaskMetadata,
    TaskMetadataList, TaskRunList, TaskRunMetadata, TaskRunRecord, TaskRuns, TaskType,
};

/// Errors raised while encoding or decoding persisted records.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The raw input is not well-formed JSON, or a field has an
    /// unexpected shape.
    #[error("{0}")]
    Malformed(String),

    /// A required field is absent.
    #[error("Missing field '{0}'")]
    MissingField(&'static str),

    /// The `trigger` field is present but is not an object.
    #[error("Wrong format of Trigger")]
    WrongTriggerFormat,

    /// The `Target` field is present but is not an object.
    #[error("Wrong format of Target")]
    WrongTargetFormat,

    /// A trigger or target carries a tag no decoder is registered for.
    ///
    /// The message names "target type" for trigger tags as well; the two
    /// unions share one decode path on the wire.
    #[error("No such target type: '{0}'")]
    UnknownVariantTag(String),

    /// The status value is outside the closed set.
    #[error(transparent)]
    UnknownStatus(#[from] ParseStatusError),

    /// The task type value is outside the closed set.
    #[error(transparent)]
    UnknownTaskType(#[from] ParseTaskTypeError),

    /// A timestamp field failed to parse as RFC 3339.
    #[error("invalid timestamp in field '{field}': {message}")]
    InvalidTimestamp {
        /// Field carrying the bad timestamp.
        field: &'static str,
        /// Parser message.
        message: String,
    },
}

/// Encodes task metadata to its wire record.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] when JSON rendering fails.
pub fn encode_task(task: &TaskMetadata) -> Result<String, CodecError> {
    to_json_string(&task_to_value(task))
}

/// Decodes task metadata from its wire record.
///
/// # Errors
///
/// Returns a [`CodecError`] naming the malformed or missing field, or the
/// unknown target tag.
pub fn decode_task(raw: &str, registry: &CodecRegistry) -> Result<TaskMetadata, CodecError> {
    let value = parse_object(raw)?;
    let id = TaskId::new(require_u64(&value, "ID")?);
    let name = require_str(&value, "Name")?.to_owned();
    let task_type = TaskType::try_from(require_str(&value, "TaskType")?)?;
    let target = registry.targets().decode(require(&value, "Target")?)?;
    let date_created = decode_time(require(&value, "DateCreated")?, "DateCreated")?;
    Ok(TaskMetadata::new(id, name, task_type, target, date_created))
}

/// Encodes a per-task runs index to its wire record.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] when JSON rendering fails.
pub fn encode_runs_index(runs: &TaskRuns) -> Result<String, CodecError> {
    let entries: Vec<Value> = runs
        .runs()
        .iter()
        .map(|record| {
            json!({
                "RunID": record.run_id().value(),
                "DateCreated": encode_time(record.date_created()),
            })
        })
        .collect();
    to_json_string(&json!({
        "TaskID": runs.task_id().value(),
        "Runs": entries,
    }))
}

/// Decodes a per-task runs index from its wire record.
///
/// # Errors
///
/// Returns a [`CodecError`] naming the malformed or missing field.
pub fn decode_runs_index(raw: &str) -> Result<TaskRuns, CodecError> {
    let value = parse_object(raw)?;
    let task_id = TaskId::new(require_u64(&value, "TaskID")?);
    let entries = require(&value, "Runs")?
        .as_array()
        .ok_or(CodecError::Malformed(String::from(
            "field 'Runs' is not an array",
        )))?;

    let mut runs = Vec::with_capacity(entries.len());
    for entry in entries {
        let record = entry.as_object().ok_or(CodecError::Malformed(String::from(
            "entry in 'Runs' is not an object",
        )))?;
        let run_id = RunId::new(require_u64(record, "RunID")?);
        let date_created = decode_time(require(record, "DateCreated")?, "DateCreated")?;
        runs.push(TaskRunRecord::new(run_id, date_created));
    }
    Ok(TaskRuns::from_persisted(task_id, runs))
}

/// Encodes a run detail record to its wire form.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] when JSON rendering fails.
pub fn encode_run(run: &TaskRunMetadata) -> Result<String, CodecError> {
    to_json_string(&run_to_value(run))
}

/// Decodes a run detail record from its wire form.
///
/// # Errors
///
/// Returns a [`CodecError`]: `Missing field 'name'` / `Missing field
/// 'trigger'` for absent required fields, `Wrong format of Trigger` when
/// the trigger is not an object, `No such status: '<value>'` for statuses
/// outside the closed set, and `No such target type: '<tag>'` for
/// unregistered trigger tags.
pub fn decode_run(raw: &str, registry: &CodecRegistry) -> Result<TaskRunMetadata, CodecError> {
    let value = parse_object(raw)?;
    let name = require_str(&value, "name")?.to_owned();
    let trigger = registry.triggers().decode(require(&value, "trigger")?)?;
    let status = RunStatus::try_from(require_str(&value, "status")?)?;
    let id = RunId::new(require_u64(&value, "id")?);
    let task_id = TaskId::new(require_u64(&value, "TaskId")?);
    let start_time = decode_time(require(&value, "startTime")?, "startTime")?;
    let end_time = match value.get("endTime") {
        None | Some(Value::Null) => None,
        Some(raw_end) => Some(decode_time(raw_end, "endTime")?),
    };
    let logs = decode_logs(&value)?;
    let error = match value.get("error") {
        None | Some(Value::Null) => String::new(),
        Some(raw_error) => raw_error
            .as_str()
            .ok_or(CodecError::Malformed(String::from(
                "field 'error' is not a string",
            )))?
            .to_owned(),
    };

    Ok(TaskRunMetadata::from_persisted(
        id, task_id, name, trigger, status, start_time, end_time, logs, error,
    ))
}

impl TaskMetadataList {
    /// Renders the list as a JSON array of wire records.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Malformed`] when JSON rendering fails.
    pub fn to_json(&self) -> Result<String, CodecError> {
        to_json_string(&Value::Array(self.iter().map(task_to_value).collect()))
    }
}

impl TaskRunList {
    /// Renders the list as a JSON array of wire records.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Malformed`] when JSON rendering fails.
    pub fn to_json(&self) -> Result<String, CodecError> {
        to_json_string(&Value::Array(self.iter().map(run_to_value).collect()))
    }
}

fn task_to_value(task: &TaskMetadata) -> Value {
    json!({
        "ID": task.id().value(),
        "Name": task.name(),
        "TaskType": task.task_type().as_str(),
        "Target": task.target().to_payload(),
        "TargetType": task.target().target_type(),
        "DateCreated": encode_time(task.date_created()),
    })
}

fn run_to_value(run: &TaskRunMetadata) -> Value {
    json!({
        "id": run.id().value(),
        "TaskId": run.task_id().value(),
        "name": run.name(),
        "trigger": run.trigger().to_payload(),
        "triggerType": run.trigger().trigger_type(),
        "status": run.status().as_str(),
        "startTime": encode_time(run.start_time()),
        "endTime": run.end_time().map_or(Value::Null, encode_time),
        "logs": run.logs(),
        "error": run.error(),
    })
}

fn decode_logs(value: &Map<String, Value>) -> Result<Vec<String>, CodecError> {
    let raw_logs = match value.get("logs") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(raw) => raw.as_array().ok_or(CodecError::Malformed(String::from(
            "field 'logs' is not an array",
        )))?,
    };

    raw_logs
        .iter()
        .map(|line| {
            line.as_str().map(str::to_owned).ok_or(CodecError::Malformed(
                String::from("entry in 'logs' is not a string"),
            ))
        })
        .collect()
}

fn to_json_string(value: &Value) -> Result<String, CodecError> {
    serde_json::to_string(value).map_err(|err| CodecError::Malformed(err.to_string()))
}

fn parse_object(raw: &str) -> Result<Map<String, Value>, CodecError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| CodecError::Malformed(err.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(CodecError::Malformed(String::from(
            "expected a JSON object",
        ))),
    }
}

fn require<'a>(value: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, CodecError> {
    value.get(field).ok_or(CodecError::MissingField(field))
}

fn require_str<'a>(
    value: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, CodecError> {
    require(value, field)?
        .as_str()
        .ok_or(CodecError::Malformed(format!(
            "field '{field}' is not a string"
        )))
}

fn require_u64(value: &Map<String, Value>, field: &'static str) -> Result<u64, CodecError> {
    require(value, field)?
        .as_u64()
        .ok_or(CodecError::Malformed(format!(
            "field '{field}' is not a positive integer"
        )))
}

fn encode_time(time: DateTime<Utc>) -> Value {
    Value::String(time.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn decode_time(value: &Value, field: &'static str) -> Result<DateTime<Utc>, CodecError> {
    let raw = value.as_str().ok_or(CodecError::InvalidTimestamp {
        field,
        message: String::from("not a string"),
    })?;
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| CodecError::InvalidTimestamp {
            field,
            message: err.to_string(),
        })
}
