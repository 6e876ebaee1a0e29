//! Git working-copy adapter for dstask.
//!
//! Records are plain files in a git work tree. Mutations, sync and undo go
//! through the `git` executable so that its merge machinery and diagnostics are
//! used as-is; repository discovery and history inspection use libgit2.

/// Error types.
pub mod error;

pub use crate::error::GitLogError;

use git2::{Oid, Repository, Sort};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::{debug, info};

/// Result alias for git adapter operations.
pub type Result<T, E = GitLogError> = std::result::Result<T, E>;

const REVERT_MARKER: &str = "This reverts commit ";
const DEFAULT_BRANCH: &str = "master";

/// A git work tree holding task records.
pub struct GitLog {
    workdir: PathBuf,
    repo: Repository,
}

impl GitLog {
    /// Open the repository at `workdir`, initialising it (and the directory) when missing.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or the repository cannot be opened.
    pub fn open_or_init(workdir: impl AsRef<Path>) -> Result<Self> {
        let workdir = workdir.as_ref().to_path_buf();
        let repo = if workdir.join(".git").exists() {
            Repository::open(&workdir)?
        } else {
            fs::create_dir_all(&workdir).map_err(|source| GitLogError::Io {
                path: workdir.clone(),
                source,
            })?;
            info!(path = %workdir.display(), "Initialising task repository");
            Repository::init(&workdir)?
        };
        Ok(Self { workdir, repo })
    }

    /// Root of the work tree.
    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Read every file with `extension` directly inside `dir` as `(file stem, contents)`.
    ///
    /// A missing directory yields no records.
    ///
    /// # Errors
    /// Returns an error if the directory or a file cannot be read.
    pub fn read_files(&self, dir: &str, extension: &str) -> Result<Vec<(String, String)>> {
        let root = self.workdir.join(dir);
        let entries = match fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(GitLogError::Io { path: root, source }),
        };

        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| GitLogError::Io {
                path: root.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let contents = fs::read_to_string(&path).map_err(|source| GitLogError::Io {
                path: path.clone(),
                source,
            })?;
            out.push((stem.to_owned(), contents));
        }
        debug!(dir, count = out.len(), "Read records");
        Ok(out)
    }

    /// Write files relative to the work tree and stage them.
    ///
    /// # Errors
    /// Returns an error if a file cannot be written or `git add` fails.
    pub fn write_files(&self, files: &[(PathBuf, String)]) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }
        for (relative, contents) in files {
            let path = self.workdir.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|source| GitLogError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            fs::write(&path, contents).map_err(|source| GitLogError::Io { path, source })?;
        }

        let mut args = vec!["add".to_owned(), "--".to_owned()];
        args.extend(files.iter().map(|(relative, _)| relative.display().to_string()));
        self.run(args.as_slice())?;
        Ok(())
    }

    /// Drop uncommitted changes to `files`, in the index and the work tree.
    ///
    /// Files known to HEAD get their committed contents back; files HEAD does not
    /// have are unstaged and deleted.
    ///
    /// # Errors
    /// Returns an error if git cannot restore a file or a new file cannot be removed.
    pub fn restore_files(&self, files: &[PathBuf]) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }
        let head_tree = self.repo.head().ok().and_then(|head| head.peel_to_tree().ok());
        let (committed, added): (Vec<&PathBuf>, Vec<&PathBuf>) = files
            .iter()
            .partition(|path| head_tree.as_ref().is_some_and(|tree| tree.get_path(path).is_ok()));

        if !committed.is_empty() {
            let mut args = vec![
                "restore".to_owned(),
                "--source=HEAD".to_owned(),
                "--staged".to_owned(),
                "--worktree".to_owned(),
                "--".to_owned(),
            ];
            args.extend(committed.iter().map(|path| path.display().to_string()));
            self.run(args.as_slice())?;
        }

        if !added.is_empty() {
            let mut args = vec![
                "rm".to_owned(),
                "--cached".to_owned(),
                "--quiet".to_owned(),
                "--ignore-unmatch".to_owned(),
                "--".to_owned(),
            ];
            args.extend(added.iter().map(|path| path.display().to_string()));
            self.run(args.as_slice())?;
            for relative in added {
                let path = self.workdir.join(relative);
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(source) => return Err(GitLogError::Io { path, source }),
                }
            }
        }
        info!(count = files.len(), "Restored uncommitted files");
        Ok(())
    }

    /// Commit everything staged. Returns `false` when there was nothing to commit.
    ///
    /// # Errors
    /// Returns an error if git refuses the commit.
    pub fn commit(&self, message: &str) -> Result<bool> {
        let output = self.output(&["diff", "--cached", "--quiet"])?;
        if output.status.success() {
            debug!(message, "Nothing staged; skipping commit");
            return Ok(false);
        }
        self.run(&["commit", "--no-verify", "--quiet", "-m", message])?;
        info!(message, "Committed");
        Ok(true)
    }

    /// Merge the remote branch into the work tree.
    ///
    /// # Errors
    /// Returns an error carrying git's output if the pull fails.
    pub fn pull(&self, remote: &str, branch: &str) -> Result<String> {
        info!(remote, branch, "Pulling");
        self.run(&["pull", "--no-edit", "--no-rebase", "--commit", remote, branch])
    }

    /// Push the local branch to the remote.
    ///
    /// # Errors
    /// Returns an error carrying git's output if the push fails.
    pub fn push(&self, remote: &str, branch: &str) -> Result<String> {
        info!(remote, branch, "Pushing");
        self.run(&["push", remote, branch])
    }

    /// Revert the most recent commit that has not been undone yet, as a new commit.
    ///
    /// Undo commits are skipped together with the commits they revert, so
    /// repeated calls walk backwards through history one change at a time.
    ///
    /// # Errors
    /// Returns [`GitLogError::NothingToUndo`] when no candidate exists,
    /// [`GitLogError::MergeCommit`] when the candidate is a merge, or git's diagnostic on failure.
    pub fn revert_last(&self) -> Result<Oid> {
        let target = self.undo_target()?;
        let sha = target.to_string();
        self.run(&["revert", "--no-edit", &sha])?;
        info!(reverted = %sha, "Reverted commit");
        Ok(target)
    }

    fn undo_target(&self) -> Result<Oid> {
        if self.repo.head().is_err() {
            return Err(GitLogError::NothingToUndo);
        }
        let mut walk = self.repo.revwalk()?;
        walk.set_sorting(Sort::TOPOLOGICAL)?;
        walk.simplify_first_parent()?;
        walk.push_head()?;

        let mut undone: HashSet<Oid> = HashSet::new();
        for oid in walk {
            let oid = oid?;
            let commit = self.repo.find_commit(oid)?;
            if let Some(reverted) = reverted_commit(commit.message().unwrap_or_default()) {
                undone.insert(reverted);
                continue;
            }
            if undone.contains(&oid) {
                continue;
            }
            if commit.parent_count() > 1 {
                return Err(GitLogError::MergeCommit(oid.to_string()));
            }
            return Ok(oid);
        }
        Err(GitLogError::NothingToUndo)
    }

    /// Branch checked out in the work tree, `master` when HEAD is unborn or detached.
    #[must_use]
    pub fn current_branch(&self) -> String {
        self.repo
            .head()
            .ok()
            .filter(git2::Reference::is_branch)
            .and_then(|head| head.shorthand().map(str::to_owned))
            .unwrap_or_else(|| DEFAULT_BRANCH.to_owned())
    }

    /// Run an arbitrary git command in the work tree with inherited stdio.
    ///
    /// # Errors
    /// Returns an error if git cannot be started or exits unsuccessfully.
    pub fn passthrough(&self, args: &[String]) -> Result<()> {
        let status = Command::new("git")
            .arg("-C")
            .arg(&self.workdir)
            .args(args)
            .status()
            .map_err(GitLogError::Spawn)?;
        if status.success() {
            Ok(())
        } else {
            Err(GitLogError::CommandFailed {
                command: args.join(" "),
                status: status.to_string(),
                output: String::new(),
            })
        }
    }

    fn output<S: AsRef<str>>(&self, args: &[S]) -> Result<Output> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        debug!(args = ?args, "Running git");
        Command::new("git")
            .arg("-C")
            .arg(&self.workdir)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(GitLogError::Spawn)
    }

    fn run<S: AsRef<str>>(&self, args: &[S]) -> Result<String> {
        let output = self.output(args)?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = [stderr.trim(), stdout.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        Err(GitLogError::CommandFailed {
            command: args.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" "),
            status: output.status.to_string(),
            output: combined,
        })
    }
}

fn reverted_commit(message: &str) -> Option<Oid> {
    let start = message.find(REVERT_MARKER)? + REVERT_MARKER.len();
    let sha: String = message[start..]
        .chars()
        .take_while(char::is_ascii_hexdigit)
        .collect();
    Oid::from_str(&sha).ok()
}
