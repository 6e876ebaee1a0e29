//! Error types for git working-copy operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during `GitLog` operations.
#[derive(Error, Debug)]
pub enum GitLogError {
    /// The git executable exited unsuccessfully. `output` is git's own diagnostic.
    #[error("git {command} failed ({status}):\n{output}")]
    CommandFailed {
        /// Sub-command and arguments.
        command: String,
        /// Exit status description.
        status: String,
        /// Combined stderr and stdout of the command.
        output: String,
    },

    /// The git executable could not be started.
    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    /// Git repository error.
    #[error("Git repository error: {0}")]
    Git(#[from] git2::Error),

    /// I/O operation on a record failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Every commit in reach has already been undone.
    #[error("nothing to undo")]
    NothingToUndo,

    /// The commit to undo is a merge produced by sync.
    #[error("cannot undo merge commit {0}; inspect the history with `dstask git log`")]
    MergeCommit(String),
}
