use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use time::OffsetDateTime;

use crate::error::TaskError;
use crate::id::TaskUid;
use crate::status::{Priority, Status};
use crate::Task;

/// File extension of task records.
pub const RECORD_EXTENSION: &str = "yml";

/// On-disk shape of a task. The uid is the record key and is not repeated inside.
#[derive(Serialize)]
struct RecordRef<'a> {
    summary: &'a str,
    status: Status,
    priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<&'a str>,
    tags: &'a BTreeSet<String>,
    notes: &'a str,
    #[serde(with = "time::serde::rfc3339")]
    created: OffsetDateTime,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    resolved: Option<OffsetDateTime>,
}

#[derive(Deserialize)]
struct Record {
    summary: String,
    status: Status,
    #[serde(default)]
    priority: Priority,
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    tags: BTreeSet<String>,
    #[serde(default)]
    notes: String,
    #[serde(with = "time::serde::rfc3339")]
    created: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    resolved: Option<OffsetDateTime>,
}

/// Serialize a task into its record text.
///
/// # Errors
/// Returns [`TaskError::Encode`] if YAML serialization fails.
pub fn encode(task: &Task) -> Result<String, TaskError> {
    let record = RecordRef {
        summary: &task.summary,
        status: task.status,
        priority: task.priority,
        project: task.project.as_deref(),
        tags: &task.tags,
        notes: &task.notes,
        created: task.created_at,
        resolved: task.resolved_at,
    };
    serde_yaml::to_string(&record).map_err(|source| TaskError::Encode { uid: task.uid, source })
}

/// Parse record text into a task keyed by `uid`.
///
/// The result carries no ephemeral id and is not write-pending.
///
/// # Errors
/// Returns the YAML error when the text is not a valid record.
pub fn decode(uid: TaskUid, text: &str) -> Result<Task, serde_yaml::Error> {
    let record: Record = serde_yaml::from_str(text)?;
    if record.summary.trim().is_empty() {
        return Err(serde::de::Error::custom("summary must not be empty"));
    }
    Ok(Task {
        uid,
        ephemeral_id: None,
        status: record.status,
        summary: record.summary,
        tags: record
            .tags
            .into_iter()
            .map(|tag| tag.trim().to_owned())
            .filter(|tag| !tag.is_empty())
            .collect(),
        project: record.project.filter(|project| !project.trim().is_empty()),
        priority: record.priority,
        notes: record.notes,
        created_at: record.created,
        resolved_at: record.resolved,
        write_pending: false,
    })
}

/// Decode a persisted record read from the log.
///
/// # Errors
/// Returns [`TaskError::CorruptRecord`] when the key or text is invalid.
pub fn decode_record(key: &str, text: &str) -> Result<Task, TaskError> {
    let corrupt = |source| TaskError::CorruptRecord {
        uid: key.to_owned(),
        source,
    };
    let uid: TaskUid = key
        .parse()
        .map_err(|err| corrupt(serde::de::Error::custom(format!("invalid uid: {err}"))))?;
    decode(uid, text).map_err(corrupt)
}

/// Decode a buffer returned from an editor, keeping identity and transient state of `original`.
///
/// # Errors
/// Returns [`TaskError::EditParse`] holding the raw buffer when parsing fails.
pub fn decode_edited(original: &Task, text: &str) -> Result<Task, TaskError> {
    let mut task = decode(original.uid, text).map_err(|source| TaskError::EditParse {
        raw: text.to_owned(),
        source,
    })?;
    task.ephemeral_id = original.ephemeral_id;
    task.write_pending = original.write_pending;
    Ok(task)
}
