//! Error types for task domain operations.

use thiserror::Error;

use crate::id::TaskUid;
use crate::status::Status;

/// Errors raised by the codec, addressing, lifecycle and token parsing.
#[derive(Error, Debug)]
pub enum TaskError {
    /// Ephemeral id is absent from the loaded snapshot.
    #[error("task {0} not found in the current task set")]
    NotFound(u32),

    /// Status change is not in the lifecycle table.
    #[error("cannot change status from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: Status,
        /// Requested status.
        to: Status,
    },

    /// A persisted record could not be decoded.
    #[error("corrupt task record {uid}: {source}")]
    CorruptRecord {
        /// Record key.
        uid: String,
        /// Decoder failure.
        #[source]
        source: serde_yaml::Error,
    },

    /// An edited buffer could not be decoded. The raw buffer is kept for retry.
    #[error("edited task could not be parsed: {source}")]
    EditParse {
        /// Buffer as returned by the editor.
        raw: String,
        /// Decoder failure.
        #[source]
        source: serde_yaml::Error,
    },

    /// An edited buffer parsed, but its status change was refused. The raw buffer is kept.
    #[error("edited task was rejected: {source}")]
    EditRejected {
        /// Buffer as returned by the editor.
        raw: String,
        /// Lifecycle failure.
        #[source]
        source: Box<TaskError>,
    },

    /// A task could not be encoded.
    #[error("failed to encode task {uid}: {source}")]
    Encode {
        /// Task identity.
        uid: TaskUid,
        /// Encoder failure.
        #[source]
        source: serde_yaml::Error,
    },

    /// The address space of ephemeral ids is exhausted.
    #[error("too many open tasks: {count} exceeds the limit of {limit}")]
    TooManyOpenTasks {
        /// Number of addressable tasks found.
        count: usize,
        /// Maximum number of addressable tasks.
        limit: usize,
    },

    /// Unknown priority token.
    #[error("unknown priority: {0}")]
    UnknownPriority(String),
}

impl TaskError {
    /// Whether the error only concerns one target of a batch operation.
    #[must_use]
    pub const fn is_per_target(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::InvalidTransition { .. }
                | Self::EditParse { .. }
                | Self::EditRejected { .. }
        )
    }

    /// Text the user wrote in the editor, when the error discarded it.
    #[must_use]
    pub fn edited_buffer(&self) -> Option<&str> {
        match self {
            Self::EditParse { raw, .. } | Self::EditRejected { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_error() -> serde_yaml::Error {
        match serde_yaml::from_str::<u32>("[") {
            Err(err) => err,
            Ok(value) => panic!("unexpected parse of {value}"),
        }
    }

    #[test]
    fn edit_failures_keep_the_buffer_and_stay_per_target() {
        let parse = TaskError::EditParse {
            raw: "summary: [".to_owned(),
            source: parse_error(),
        };
        let rejected = TaskError::EditRejected {
            raw: "status: paused\n".to_owned(),
            source: Box::new(TaskError::InvalidTransition {
                from: Status::Pending,
                to: Status::Paused,
            }),
        };
        assert_eq!(parse.edited_buffer(), Some("summary: ["));
        assert_eq!(rejected.edited_buffer(), Some("status: paused\n"));
        assert!(parse.is_per_target());
        assert!(rejected.is_per_target());
        assert!(rejected.to_string().contains("cannot change status from pending to paused"));
    }

    #[test]
    fn storage_level_errors_abort_batches() {
        let corrupt = TaskError::CorruptRecord {
            uid: "x".to_owned(),
            source: parse_error(),
        };
        assert!(!corrupt.is_per_target());
        assert!(corrupt.edited_buffer().is_none());
        assert!(TaskError::NotFound(4).edited_buffer().is_none());
    }
}
