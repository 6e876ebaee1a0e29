//! In-memory [`VersionedLog`] for exercising the pipeline without git.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Error, bail};

use crate::task_store::VersionedLog;

type Files = BTreeMap<String, String>;

#[derive(Debug, Clone)]
struct MemoryCommit {
    message: String,
    before: Files,
    after: Files,
    reverts: Option<usize>,
}

#[derive(Debug, Default)]
struct MemoryState {
    head: Files,
    work: Files,
    commits: Vec<MemoryCommit>,
    syncs: usize,
    fail_next_commit: bool,
}

/// Linear history of whole-tree states with git-like commit and revert semantics.
#[derive(Debug, Default)]
pub struct MemoryLog {
    state: RefCell<MemoryState>,
}

impl MemoryLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a raw record in the working state, bypassing the codec.
    pub fn put_raw(&self, key: &str, text: &str) {
        self.state
            .borrow_mut()
            .work
            .insert(key.to_owned(), text.to_owned());
    }

    /// Current text of a record.
    #[must_use]
    pub fn record(&self, key: &str) -> Option<String> {
        self.state.borrow().work.get(key).cloned()
    }

    /// Number of commits, reverts included.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.state.borrow().commits.len()
    }

    /// Commit messages, oldest first.
    #[must_use]
    pub fn commit_messages(&self) -> Vec<String> {
        self.state
            .borrow()
            .commits
            .iter()
            .map(|commit| commit.message.clone())
            .collect()
    }

    /// Keys changed by the most recent commit.
    #[must_use]
    pub fn last_commit_keys(&self) -> BTreeSet<String> {
        let state = self.state.borrow();
        state
            .commits
            .last()
            .map(|commit| changed_keys(&commit.before, &commit.after))
            .unwrap_or_default()
    }

    /// Make the next commit fail, leaving written records uncommitted.
    pub fn fail_next_commit(&self) {
        self.state.borrow_mut().fail_next_commit = true;
    }

    /// Whether the working state differs from the last commit.
    #[must_use]
    pub fn has_uncommitted_changes(&self) -> bool {
        let state = self.state.borrow();
        state.work != state.head
    }

    /// Number of completed pull/push round trips.
    #[must_use]
    pub fn sync_count(&self) -> usize {
        self.state.borrow().syncs
    }
}

fn changed_keys(before: &Files, after: &Files) -> BTreeSet<String> {
    before
        .keys()
        .chain(after.keys())
        .filter(|key| before.get(*key) != after.get(*key))
        .cloned()
        .collect()
}

fn undo_target(commits: &[MemoryCommit]) -> Option<usize> {
    let mut undone = BTreeSet::new();
    for (index, commit) in commits.iter().enumerate().rev() {
        if let Some(reverted) = commit.reverts {
            undone.insert(reverted);
            continue;
        }
        if !undone.contains(&index) {
            return Some(index);
        }
    }
    None
}

impl VersionedLog for MemoryLog {
    type Error = Error;

    fn read_records(&self) -> Result<Vec<(String, String)>, Self::Error> {
        Ok(self
            .state
            .borrow()
            .work
            .iter()
            .map(|(key, text)| (key.clone(), text.clone()))
            .collect())
    }

    fn write_records(&self, records: &[(String, String)]) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        for (key, text) in records {
            state.work.insert(key.clone(), text.clone());
        }
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<bool, Self::Error> {
        let mut state = self.state.borrow_mut();
        if std::mem::take(&mut state.fail_next_commit) {
            bail!("commit rejected");
        }
        if state.work == state.head {
            return Ok(false);
        }
        let commit = MemoryCommit {
            message: message.to_owned(),
            before: state.head.clone(),
            after: state.work.clone(),
            reverts: None,
        };
        state.head = state.work.clone();
        state.commits.push(commit);
        Ok(true)
    }

    fn discard(&self, keys: &[String]) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        for key in keys {
            match state.head.get(key).cloned() {
                Some(text) => state.work.insert(key.clone(), text),
                None => state.work.remove(key),
            };
        }
        Ok(())
    }

    fn pull(&self) -> Result<String, Self::Error> {
        Ok(String::new())
    }

    fn push(&self) -> Result<String, Self::Error> {
        self.state.borrow_mut().syncs += 1;
        Ok(String::new())
    }

    fn revert_last(&self) -> Result<String, Self::Error> {
        let mut state = self.state.borrow_mut();
        if state.work != state.head {
            bail!("working state has uncommitted changes");
        }
        let Some(index) = undo_target(&state.commits) else {
            bail!("nothing to undo");
        };
        let target = state.commits[index].clone();

        let mut restored = state.head.clone();
        for key in changed_keys(&target.before, &target.after) {
            match target.before.get(&key) {
                Some(text) => restored.insert(key, text.clone()),
                None => restored.remove(&key),
            };
        }

        let commit = MemoryCommit {
            message: format!("Revert \"{}\"", target.message),
            before: state.head.clone(),
            after: restored.clone(),
            reverts: Some(index),
        };
        state.head = restored.clone();
        state.work = restored;
        state.commits.push(commit);
        Ok(index.to_string())
    }
}
