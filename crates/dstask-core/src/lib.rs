//! Domain types for dstask: tasks, lifecycle, record codec, filters and addressing.

/// YAML record encoding.
pub mod codec;
/// Error types.
pub mod error;
/// Filter specifications and matching.
pub mod filter;
/// Identifier types.
pub mod id;
/// Status transition rules.
pub mod lifecycle;
/// Ephemeral id assignment over loaded task sets.
pub mod snapshot;
/// Status and priority enums.
pub mod status;

pub use crate::error::TaskError;
pub use crate::filter::Filter;
pub use crate::id::TaskUid;
pub use crate::snapshot::{MAX_TASKS_OPEN, Snapshot, assign_ids};
pub use crate::status::{Priority, Status};

use std::collections::BTreeSet;
use std::fmt;
use time::OffsetDateTime;

/// A single unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Durable identity and record key.
    pub uid: TaskUid,
    /// Snapshot-local address; never persisted.
    pub ephemeral_id: Option<u32>,
    /// Lifecycle state.
    pub status: Status,
    /// One-line description.
    pub summary: String,
    /// Tags without the leading `+`.
    pub tags: BTreeSet<String>,
    /// Optional project name.
    pub project: Option<String>,
    /// Priority, `P2` by default.
    pub priority: Priority,
    /// Free-form Markdown notes.
    pub notes: String,
    /// Creation time (UTC).
    pub created_at: OffsetDateTime,
    /// Time the task entered `resolved`.
    pub resolved_at: Option<OffsetDateTime>,
    /// Set until the task has been written to the log once.
    pub write_pending: bool,
}

impl Task {
    /// Construct a new, not yet persisted task.
    #[must_use]
    pub fn new(summary: impl Into<String>, status: Status) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            uid: TaskUid::new(),
            ephemeral_id: None,
            status,
            summary: summary.into(),
            tags: BTreeSet::new(),
            project: None,
            priority: Priority::default(),
            notes: String::new(),
            created_at: now,
            resolved_at: status.is_resolved().then_some(now),
            write_pending: true,
        }
    }

    /// Append a paragraph to the notes, separated by a newline.
    pub fn append_note(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if self.notes.is_empty() {
            self.notes = text.to_owned();
        } else {
            self.notes.push('\n');
            self.notes.push_str(text);
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ephemeral_id {
            Some(id) => write!(f, "{id}: {}", self.summary),
            None => write!(f, "{}: {}", self.uid.short(), self.summary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_is_write_pending_with_defaults() {
        let task = Task::new("Fix bug", Status::Pending);
        assert!(task.write_pending);
        assert_eq!(task.priority, Priority::P2);
        assert!(task.ephemeral_id.is_none());
        assert!(task.resolved_at.is_none());
    }

    #[test]
    fn new_resolved_task_is_stamped() {
        let task = Task::new("Already done", Status::Resolved);
        assert_eq!(task.resolved_at, Some(task.created_at));
    }

    #[test]
    fn append_note_separates_paragraphs() {
        let mut task = Task::new("Notes", Status::Pending);
        task.append_note("first");
        task.append_note("  ");
        task.append_note("second");
        assert_eq!(task.notes, "first\nsecond");
    }

    #[test]
    fn display_prefers_ephemeral_id() {
        let mut task = Task::new("Write docs", Status::Pending);
        assert_eq!(task.to_string(), format!("{}: Write docs", task.uid.short()));
        task.ephemeral_id = Some(4);
        assert_eq!(task.to_string(), "4: Write docs");
    }
}
