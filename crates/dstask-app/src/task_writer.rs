//! Shared task mutation pipeline used by the CLI.
//!
//! Every public operation loads a fresh snapshot, changes tasks in memory and
//! persists them with exactly one commit.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Error;
use dstask_core::{Filter, Status, Task, TaskError};
use tracing::{debug, info, warn};

use crate::context::ContextFile;
use crate::edit_session::{DEFAULT_EDIT_ATTEMPTS, EditSession, EditedTask, Editor};
use crate::task_patch::TaskPatch;
use crate::task_store::{TaskStore, VersionedLog};

/// Input for operations that create a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    /// One-line description.
    pub summary: String,
    /// Tags, project and priority given on the command line.
    pub attributes: Filter,
    /// Initial notes.
    pub note: String,
}

/// Result for one targeted id.
#[derive(Debug)]
pub struct TargetOutcome {
    /// Ephemeral id as given by the user.
    pub id: u32,
    /// Updated task, or the reason it was skipped.
    pub result: Result<Task, TaskError>,
}

/// Per-target report of a batch operation.
#[derive(Debug)]
pub struct BatchReport {
    /// Outcomes ordered by id.
    pub outcomes: Vec<TargetOutcome>,
    /// Whether a commit was created.
    pub committed: bool,
}

impl BatchReport {
    /// Tasks that were updated.
    pub fn updated(&self) -> impl Iterator<Item = &Task> {
        self.outcomes.iter().filter_map(|outcome| outcome.result.as_ref().ok())
    }

    /// Targets that were skipped, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (u32, &TaskError)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().err().map(|err| (outcome.id, err)))
    }

    /// True when every target succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// High-level service that validates inputs and commits task changes.
pub struct TaskWriter<L> {
    store: TaskStore<L>,
    edit_attempts: usize,
}

impl<L> TaskWriter<L> {
    /// Construct a new writer.
    pub const fn new(store: TaskStore<L>) -> Self {
        Self {
            store,
            edit_attempts: DEFAULT_EDIT_ATTEMPTS,
        }
    }

    /// Override how often a failed whole-record edit is reopened.
    #[must_use]
    pub const fn with_edit_attempts(mut self, attempts: usize) -> Self {
        self.edit_attempts = attempts;
        self
    }

    /// Expose the underlying store (read-only operations).
    pub const fn store(&self) -> &TaskStore<L> {
        &self.store
    }
}

impl<L> TaskWriter<L>
where
    L: VersionedLog,
{
    fn log_error(err: L::Error) -> TaskWriteError {
        TaskWriteError::Store(err.into())
    }

    /// Create a pending task. Context tags, project and priority are inherited.
    ///
    /// # Errors
    /// Returns [`TaskWriteError`] when the summary is empty or storage fails.
    pub fn add(&self, context: &Filter, request: NewTask) -> Result<Task, TaskWriteError> {
        self.create(context, request, Status::Pending, "Added")
    }

    /// Record a task that is already done.
    ///
    /// # Errors
    /// Returns [`TaskWriteError`] when the summary is empty or storage fails.
    pub fn log(&self, context: &Filter, request: NewTask) -> Result<Task, TaskWriteError> {
        self.create(context, request, Status::Resolved, "Logged")
    }

    /// Create a task and start it straight away.
    ///
    /// # Errors
    /// Returns [`TaskWriteError`] when the summary is empty or storage fails.
    pub fn start_new(&self, context: &Filter, request: NewTask) -> Result<Task, TaskWriteError> {
        self.create(context, request, Status::Active, "Started")
    }

    fn create(
        &self,
        context: &Filter,
        request: NewTask,
        status: Status,
        action: &str,
    ) -> Result<Task, TaskWriteError> {
        let NewTask {
            summary,
            attributes,
            note,
        } = request;
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(TaskWriteError::EmptySummary);
        }

        let mut task = Task::new(summary, status);
        Filter::merge(context, &attributes).prefill(&mut task);
        task.append_note(&note);

        let mut snapshot = self.store.load(&Status::NON_RESOLVED)?;
        let task = snapshot.insert(task)?;
        let mut affected = [task];
        self.store.persist(&mut affected, action)?;
        let [task] = affected;
        Ok(task)
    }

    /// Move targets to `active`, appending `note`.
    ///
    /// # Errors
    /// Returns [`TaskWriteError`] on storage failures; per-target problems are in the report.
    pub fn start(&self, ids: &BTreeSet<u32>, note: &str) -> Result<BatchReport, TaskWriteError> {
        self.transition_targets(ids, Status::Active, note, "Started")
    }

    /// Pause active targets, appending `note`.
    ///
    /// # Errors
    /// Returns [`TaskWriteError`] on storage failures; per-target problems are in the report.
    pub fn stop(&self, ids: &BTreeSet<u32>, note: &str) -> Result<BatchReport, TaskWriteError> {
        self.transition_targets(ids, Status::Paused, note, "Stopped")
    }

    /// Resolve targets, appending `note`.
    ///
    /// # Errors
    /// Returns [`TaskWriteError`] on storage failures; per-target problems are in the report.
    pub fn resolve(&self, ids: &BTreeSet<u32>, note: &str) -> Result<BatchReport, TaskWriteError> {
        self.transition_targets(ids, Status::Resolved, note, "Resolved")
    }

    fn transition_targets(
        &self,
        ids: &BTreeSet<u32>,
        to: Status,
        note: &str,
        action: &str,
    ) -> Result<BatchReport, TaskWriteError> {
        self.apply_to_targets(ids, action, |task| {
            task.transition(to)?;
            task.append_note(note);
            Ok(())
        })
    }

    /// Change tags, project and priority of the targets.
    ///
    /// # Errors
    /// Returns [`TaskWriteError::EmptyPatch`] when the patch changes nothing, or storage failures.
    pub fn modify(&self, ids: &BTreeSet<u32>, patch: &TaskPatch) -> Result<BatchReport, TaskWriteError> {
        if patch.is_empty() {
            return Err(TaskWriteError::EmptyPatch);
        }
        self.apply_to_targets(ids, "Modified", |task| {
            if !patch.apply(task) {
                debug!(task = %task, "Modification left task unchanged");
            }
            Ok(())
        })
    }

    /// Append `text` to the notes of the targets, or edit the notes when `text` is blank.
    ///
    /// # Errors
    /// Returns [`TaskWriteError`] when the editor fails or storage fails.
    pub fn note<E>(&self, ids: &BTreeSet<u32>, text: &str, editor: &E) -> Result<BatchReport, TaskWriteError>
    where
        E: Editor + ?Sized,
    {
        let session = EditSession::new(editor, 1);
        self.apply_to_targets(ids, "Noted", |task| {
            if text.trim().is_empty() {
                task.notes = session.edit_notes(&task.notes)?;
            } else {
                task.append_note(text);
            }
            Ok(())
        })
    }

    /// Edit whole records. Status changes go through the lifecycle unless `force` is set.
    ///
    /// Each target is edited on its own. A buffer that never parses, or whose
    /// status change is refused, becomes that target's failure and carries the
    /// user's text; the other targets are still committed.
    ///
    /// # Errors
    /// Returns [`TaskWriteError`] when the editor cannot run or storage fails.
    pub fn edit<E>(&self, ids: &BTreeSet<u32>, editor: &E, force: bool) -> Result<BatchReport, TaskWriteError>
    where
        E: Editor + ?Sized,
    {
        let session = EditSession::new(editor, self.edit_attempts);
        self.apply_to_targets(ids, "Edited", |task| {
            let EditedTask { task: edited, raw } = session.edit_task(task)?;
            *task = reconcile_edit(task, edited, force).map_err(|source| TaskError::EditRejected {
                raw,
                source: Box::new(source),
            })?;
            Ok(())
        })
    }

    fn apply_to_targets<F>(
        &self,
        ids: &BTreeSet<u32>,
        action: &str,
        mut change: F,
    ) -> Result<BatchReport, TaskWriteError>
    where
        F: FnMut(&mut Task) -> Result<(), TaskWriteError>,
    {
        if ids.is_empty() {
            return Err(TaskWriteError::NoTargets);
        }
        let snapshot = self.store.load(&Status::NON_RESOLVED)?;

        let mut skipped: BTreeMap<u32, TaskError> = BTreeMap::new();
        let mut changed = Vec::new();
        for &id in ids {
            let mut task = match snapshot.lookup_by_id(id) {
                Ok(task) => task.clone(),
                Err(err) => {
                    warn!(id, error = %err, "Skipping target");
                    skipped.insert(id, err);
                    continue;
                }
            };
            match change(&mut task) {
                Ok(()) => changed.push(task),
                Err(TaskWriteError::Task(err)) if err.is_per_target() => {
                    warn!(id, error = %err, "Skipping target");
                    skipped.insert(id, err);
                }
                Err(err) => return Err(err),
            }
        }

        let committed = self.store.persist(&mut changed, action)?;

        let mut outcomes: BTreeMap<u32, Result<Task, TaskError>> = skipped
            .into_iter()
            .map(|(id, err)| (id, Err(err)))
            .collect();
        for task in changed {
            if let Some(id) = task.ephemeral_id {
                outcomes.insert(id, Ok(task));
            }
        }
        Ok(BatchReport {
            outcomes: outcomes
                .into_iter()
                .map(|(id, result)| TargetOutcome { id, result })
                .collect(),
            committed,
        })
    }

    /// Revert the most recent change that has not been undone yet.
    ///
    /// # Errors
    /// Returns the log's error when there is nothing to undo or the revert fails.
    pub fn undo(&self) -> Result<String, TaskWriteError> {
        let reverted = self.store.log().revert_last().map_err(Self::log_error)?;
        info!(%reverted, "Undid change");
        Ok(reverted)
    }

    /// Pull-merge remote changes, then push local ones. Returns the tools' output.
    ///
    /// # Errors
    /// Returns the log's error, with its diagnostic, when either step fails.
    pub fn sync(&self) -> Result<String, TaskWriteError> {
        let pulled = self.store.log().pull().map_err(Self::log_error)?;
        let pushed = self.store.log().push().map_err(Self::log_error)?;
        info!("Synchronised task repository");
        Ok([pulled.trim(), pushed.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

impl<L> TaskWriter<L> {
    /// Persist `filter` as the context; an empty filter clears it.
    ///
    /// # Errors
    /// Returns [`TaskWriteError::InvalidContext`] for filters with ids or text,
    /// or a context error when the file cannot be written.
    pub fn set_context(&self, file: &ContextFile, filter: &Filter) -> Result<(), TaskWriteError> {
        if !filter.ids.is_empty() {
            return Err(TaskWriteError::InvalidContext("task ids"));
        }
        if filter.text.as_deref().is_some_and(|text| !text.trim().is_empty()) {
            return Err(TaskWriteError::InvalidContext("free text"));
        }
        file.save(filter).map_err(TaskWriteError::Context)?;
        info!(context = %filter, "Context set");
        Ok(())
    }
}

fn reconcile_edit(original: &Task, edited: Task, force: bool) -> Result<Task, TaskError> {
    if edited.status == original.status {
        return Ok(edited);
    }

    let target = edited.status;
    let mut task = Task {
        status: original.status,
        resolved_at: original.resolved_at,
        ..edited
    };
    if force {
        task.force_transition(target);
    } else {
        task.transition(target)?;
        debug!(task = %task, from = %original.status, to = %target, "Status changed by edit");
    }
    Ok(task)
}

/// Errors surfaced by [`TaskWriter`] operations.
#[derive(thiserror::Error, Debug)]
pub enum TaskWriteError {
    /// Domain error: addressing, lifecycle or codec.
    #[error(transparent)]
    Task(#[from] TaskError),
    /// Backing store returned an error.
    #[error("store error: {0:#}")]
    Store(#[from] Error),
    /// The editor could not be run.
    #[error("editor error: {0:#}")]
    Editor(#[source] Error),
    /// The context file could not be written.
    #[error("context error: {0:#}")]
    Context(#[source] Error),
    /// A context may only hold attribute criteria.
    #[error("a context cannot contain {0}")]
    InvalidContext(&'static str),
    /// A task needs a summary.
    #[error("task summary is empty")]
    EmptySummary,
    /// The command needs at least one task id.
    #[error("no task ids given")]
    NoTargets,
    /// `modify` was called without any change.
    #[error("no modifications given")]
    EmptyPatch,
}
