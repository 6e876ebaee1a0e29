//! Snapshot loading and atomic persistence over a versioned log.

use std::path::{Path, PathBuf};

use anyhow::{Context, Error};
use dstask_core::codec::{self, RECORD_EXTENSION};
use dstask_core::{Snapshot, Status, Task, assign_ids};
use dstask_store_git::{GitLog, GitLogError};
use tracing::{debug, info, warn};

use crate::config::{RepoConfig, SyncConfig};
use crate::task_writer::TaskWriteError;

/// Directory (relative to the log root) holding one record per task.
pub const TASKS_DIR: &str = "tasks";

/// Minimal versioned storage required by [`TaskStore`].
///
/// Records are addressed by key (the task uid); the adapter decides where they live.
pub trait VersionedLog {
    /// Error type bubbled up from the backing log.
    type Error: Into<Error>;

    /// Read every record as `(key, text)`.
    ///
    /// # Errors
    /// Returns a log-specific error when the records cannot be read.
    fn read_records(&self) -> Result<Vec<(String, String)>, Self::Error>;

    /// Write records into the working state without committing.
    ///
    /// # Errors
    /// Returns a log-specific error when a record cannot be written.
    fn write_records(&self, records: &[(String, String)]) -> Result<(), Self::Error>;

    /// Commit everything written since the last commit. Returns `false` when nothing changed.
    ///
    /// # Errors
    /// Returns a log-specific error when the commit fails.
    fn commit(&self, message: &str) -> Result<bool, Self::Error>;

    /// Drop uncommitted changes to `keys`, restoring their last committed state.
    ///
    /// # Errors
    /// Returns a log-specific error when a record cannot be restored.
    fn discard(&self, keys: &[String]) -> Result<(), Self::Error>;

    /// Merge remote changes into the local log.
    ///
    /// # Errors
    /// Returns a log-specific error carrying the tool's diagnostic.
    fn pull(&self) -> Result<String, Self::Error>;

    /// Publish local changes.
    ///
    /// # Errors
    /// Returns a log-specific error carrying the tool's diagnostic.
    fn push(&self) -> Result<String, Self::Error>;

    /// Revert the most recent change that has not been undone yet, as a new change.
    ///
    /// Returns an identifier of the reverted change.
    ///
    /// # Errors
    /// Returns a log-specific error when there is nothing to undo or the revert fails.
    fn revert_last(&self) -> Result<String, Self::Error>;
}

/// [`GitLog`] bound to the sync settings of its repository.
pub struct GitTaskLog {
    git: GitLog,
    sync: SyncConfig,
}

impl GitTaskLog {
    /// Wrap an opened git log.
    #[must_use]
    pub const fn new(git: GitLog, sync: SyncConfig) -> Self {
        Self { git, sync }
    }

    /// Open (or initialise) the repository at `repo_dir` and read its `.dstask.toml`.
    ///
    /// # Errors
    /// Returns an error if the repository cannot be opened or its config cannot be parsed.
    pub fn open(repo_dir: &Path) -> anyhow::Result<Self> {
        let git = GitLog::open_or_init(repo_dir)
            .with_context(|| format!("failed to open task repository {}", repo_dir.display()))?;
        let repo_config = RepoConfig::from_workdir(repo_dir)?;
        Ok(Self::new(git, repo_config.sync))
    }

    /// Underlying git work tree.
    #[must_use]
    pub const fn git(&self) -> &GitLog {
        &self.git
    }

    fn branch(&self) -> String {
        self.sync
            .branch
            .clone()
            .unwrap_or_else(|| self.git.current_branch())
    }
}

impl VersionedLog for GitTaskLog {
    type Error = GitLogError;

    fn read_records(&self) -> Result<Vec<(String, String)>, Self::Error> {
        self.git.read_files(TASKS_DIR, RECORD_EXTENSION)
    }

    fn write_records(&self, records: &[(String, String)]) -> Result<(), Self::Error> {
        let files: Vec<(PathBuf, String)> = records
            .iter()
            .map(|(key, text)| (record_path(key), text.clone()))
            .collect();
        self.git.write_files(&files)
    }

    fn commit(&self, message: &str) -> Result<bool, Self::Error> {
        self.git.commit(message)
    }

    fn discard(&self, keys: &[String]) -> Result<(), Self::Error> {
        let files: Vec<PathBuf> = keys.iter().map(|key| record_path(key)).collect();
        self.git.restore_files(&files)
    }

    fn pull(&self) -> Result<String, Self::Error> {
        self.git.pull(&self.sync.remote, &self.branch())
    }

    fn push(&self) -> Result<String, Self::Error> {
        self.git.push(&self.sync.remote, &self.branch())
    }

    fn revert_last(&self) -> Result<String, Self::Error> {
        self.git.revert_last().map(|oid| oid.to_string())
    }
}

fn record_path(key: &str) -> PathBuf {
    Path::new(TASKS_DIR).join(format!("{key}.{RECORD_EXTENSION}"))
}

/// Loads snapshots from, and persists tasks into, a [`VersionedLog`].
pub struct TaskStore<L> {
    log: L,
}

impl<L> TaskStore<L> {
    /// Construct a store over `log`.
    pub const fn new(log: L) -> Self {
        Self { log }
    }

    /// Borrow the underlying log.
    pub const fn log(&self) -> &L {
        &self.log
    }
}

impl<L> TaskStore<L>
where
    L: VersionedLog,
{
    fn log_error(err: L::Error) -> TaskWriteError {
        TaskWriteError::Store(err.into())
    }

    /// Read every record, keep tasks whose status is in `statuses` and number them.
    ///
    /// # Errors
    /// Fails on the first record that cannot be decoded, when the log cannot be
    /// read, or when too many tasks would be numbered.
    pub fn load(&self, statuses: &[Status]) -> Result<Snapshot, TaskWriteError> {
        let records = self.log.read_records().map_err(Self::log_error)?;
        let total = records.len();
        let mut tasks = Vec::with_capacity(total);
        for (key, text) in records {
            let task = codec::decode_record(&key, &text)?;
            if statuses.contains(&task.status) {
                tasks.push(task);
            }
        }
        debug!(total, kept = tasks.len(), "Loaded task records");
        Ok(assign_ids(tasks)?)
    }

    /// Write every affected task and commit them together.
    ///
    /// The commit message is `"<action> <id>: <summary>, ..."`. All records are
    /// encoded before anything is written, so an encoding failure leaves the
    /// log untouched. When writing or committing fails, the touched records are
    /// restored so nothing uncommitted is left behind. Returns `false` when
    /// nothing was committed.
    ///
    /// # Errors
    /// Returns an error when encoding, writing or committing fails.
    pub fn persist(&self, affected: &mut [Task], action: &str) -> Result<bool, TaskWriteError> {
        if affected.is_empty() {
            return Ok(false);
        }

        let records = affected
            .iter()
            .map(|task| Ok((task.uid.to_string(), codec::encode(task)?)))
            .collect::<Result<Vec<_>, TaskWriteError>>()?;
        let message = commit_message(action, affected);

        let committed = match self.write_and_commit(&records, &message) {
            Ok(committed) => committed,
            Err(err) => {
                let keys: Vec<String> = records.into_iter().map(|(key, _)| key).collect();
                if let Err(cleanup) = self.log.discard(&keys) {
                    let cleanup: Error = cleanup.into();
                    warn!(error = %format!("{cleanup:#}"), "Failed to discard uncommitted records");
                }
                return Err(Self::log_error(err));
            }
        };
        for task in affected.iter_mut() {
            task.write_pending = false;
        }
        if committed {
            info!(%message, tasks = affected.len(), "Persisted tasks");
        } else {
            debug!(%message, "Records unchanged; no commit");
        }
        Ok(committed)
    }

    fn write_and_commit(&self, records: &[(String, String)], message: &str) -> Result<bool, L::Error> {
        self.log.write_records(records)?;
        self.log.commit(message)
    }
}

fn commit_message(action: &str, tasks: &[Task]) -> String {
    let targets = tasks.iter().map(Task::to_string).collect::<Vec<_>>().join(", ");
    format!("{action} {targets}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_paths_are_flat_and_keyed_by_uid() {
        assert_eq!(record_path("abc"), PathBuf::from("tasks/abc.yml"));
    }

    #[test]
    fn commit_message_names_every_task() {
        let mut first = Task::new("Fix bug", Status::Pending);
        first.ephemeral_id = Some(3);
        let mut second = Task::new("Write docs", Status::Pending);
        second.ephemeral_id = Some(7);
        assert_eq!(
            commit_message("Resolved", &[first, second]),
            "Resolved 3: Fix bug, 7: Write docs"
        );
    }
}
