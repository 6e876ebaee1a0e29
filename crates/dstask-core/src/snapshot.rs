use std::collections::{BTreeMap, BTreeSet};

use crate::error::TaskError;
use crate::filter::Filter;
use crate::status::Status;
use crate::Task;

/// Upper bound on addressable (non-resolved) tasks in one snapshot.
pub const MAX_TASKS_OPEN: usize = 10_000;

/// Tasks produced by one load, addressed by ephemeral id.
///
/// Resolved tasks never receive an id; when a load includes them they are kept
/// in a separate, unaddressable list for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    addressed: BTreeMap<u32, Task>,
    unaddressed: Vec<Task>,
}

/// Number tasks from 1 in `(created_at, uid)` order.
///
/// The numbering depends only on the set of tasks, never on the order they were
/// read in.
///
/// # Errors
/// Returns [`TaskError::TooManyOpenTasks`] when more than [`MAX_TASKS_OPEN`] tasks would be numbered.
pub fn assign_ids(mut tasks: Vec<Task>) -> Result<Snapshot, TaskError> {
    let open = tasks.iter().filter(|task| !task.status.is_resolved()).count();
    if open > MAX_TASKS_OPEN {
        return Err(TaskError::TooManyOpenTasks {
            count: open,
            limit: MAX_TASKS_OPEN,
        });
    }

    tasks.sort_by(|a, b| (a.created_at, a.uid).cmp(&(b.created_at, b.uid)));

    let mut snapshot = Snapshot::default();
    let mut next: u32 = 1;
    for mut task in tasks {
        if task.status.is_resolved() {
            task.ephemeral_id = None;
            snapshot.unaddressed.push(task);
        } else {
            task.ephemeral_id = Some(next);
            snapshot.addressed.insert(next, task);
            next += 1;
        }
    }
    Ok(snapshot)
}

impl Snapshot {
    /// Find an addressable task by ephemeral id.
    ///
    /// # Errors
    /// Returns [`TaskError::NotFound`] when the id is not part of this snapshot.
    pub fn lookup_by_id(&self, id: u32) -> Result<&Task, TaskError> {
        self.addressed.get(&id).ok_or(TaskError::NotFound(id))
    }

    /// Replace the addressable task carrying the same ephemeral id.
    ///
    /// # Errors
    /// Returns [`TaskError::NotFound`] when the task has no id in this snapshot.
    pub fn update(&mut self, task: Task) -> Result<(), TaskError> {
        let id = task.ephemeral_id.ok_or(TaskError::NotFound(0))?;
        let slot = self.addressed.get_mut(&id).ok_or(TaskError::NotFound(id))?;
        *slot = task;
        Ok(())
    }

    /// Add a newly constructed task and return it with its ephemeral id (if any).
    ///
    /// Non-resolved tasks take the next free id, which matches the position they
    /// will get on the next load since they are the most recently created.
    ///
    /// # Errors
    /// Returns [`TaskError::TooManyOpenTasks`] when the address space is exhausted.
    pub fn insert(&mut self, mut task: Task) -> Result<Task, TaskError> {
        if task.status.is_resolved() {
            task.ephemeral_id = None;
            self.unaddressed.push(task.clone());
            return Ok(task);
        }
        if self.addressed.len() >= MAX_TASKS_OPEN {
            return Err(TaskError::TooManyOpenTasks {
                count: self.addressed.len() + 1,
                limit: MAX_TASKS_OPEN,
            });
        }
        let id = self.addressed.keys().next_back().map_or(1, |last| last + 1);
        task.ephemeral_id = Some(id);
        self.addressed.insert(id, task.clone());
        Ok(task)
    }

    /// Sub-snapshot of tasks matching `filter`, ids preserved.
    #[must_use]
    pub fn apply(&self, filter: &Filter) -> Self {
        self.retain(|task| filter.matches(task))
    }

    /// Sub-snapshot of tasks whose status is one of `statuses`, ids preserved.
    ///
    /// Views narrower than the loaded status set go through here so that the ids
    /// they show are the ones commands resolve.
    #[must_use]
    pub fn with_statuses(&self, statuses: &[Status]) -> Self {
        self.retain(|task| statuses.contains(&task.status))
    }

    fn retain(&self, keep: impl Fn(&Task) -> bool) -> Self {
        Self {
            addressed: self
                .addressed
                .iter()
                .filter(|(_, task)| keep(task))
                .map(|(id, task)| (*id, task.clone()))
                .collect(),
            unaddressed: self.unaddressed.iter().filter(|task| keep(task)).cloned().collect(),
        }
    }

    /// Addressable tasks in id order.
    pub fn addressed(&self) -> impl Iterator<Item = &Task> {
        self.addressed.values()
    }

    /// Every task: addressable ones in id order, then unaddressed ones.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.addressed.values().chain(self.unaddressed.iter())
    }

    /// Number of tasks in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.addressed.len() + self.unaddressed.len()
    }

    /// Returns true when the snapshot holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distinct tags across all tasks.
    #[must_use]
    pub fn tags(&self) -> BTreeSet<String> {
        self.iter().flat_map(|task| task.tags.iter().cloned()).collect()
    }

    /// Per-project counts of (open, resolved) tasks.
    #[must_use]
    pub fn projects(&self) -> BTreeMap<String, (usize, usize)> {
        let mut projects: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for task in self.iter() {
            let Some(project) = &task.project else {
                continue;
            };
            let entry = projects.entry(project.clone()).or_default();
            if task.status.is_resolved() {
                entry.1 += 1;
            } else {
                entry.0 += 1;
            }
        }
        projects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Duration, OffsetDateTime};

    fn at(offset_secs: i64, summary: &str, status: Status) -> Task {
        let mut task = Task::new(summary, status);
        task.created_at = OffsetDateTime::UNIX_EPOCH + Duration::seconds(offset_secs);
        task.write_pending = false;
        task
    }

    fn ok<T>(result: Result<T, TaskError>) -> T {
        result.unwrap_or_else(|err| panic!("unexpected error: {err}"))
    }

    #[test]
    fn numbering_follows_creation_time() {
        let tasks = vec![
            at(30, "third", Status::Pending),
            at(10, "first", Status::Active),
            at(20, "second", Status::Paused),
        ];
        let snapshot = ok(assign_ids(tasks));
        assert_eq!(ok(snapshot.lookup_by_id(1)).summary, "first");
        assert_eq!(ok(snapshot.lookup_by_id(2)).summary, "second");
        assert_eq!(ok(snapshot.lookup_by_id(3)).summary, "third");
    }

    #[test]
    fn ties_are_broken_by_uid() {
        let a = at(5, "a", Status::Pending);
        let b = at(5, "b", Status::Pending);
        let (low, high) = if a.uid < b.uid { (a, b) } else { (b, a) };
        let snapshot = ok(assign_ids(vec![high.clone(), low.clone()]));
        assert_eq!(ok(snapshot.lookup_by_id(1)).uid, low.uid);
        assert_eq!(ok(snapshot.lookup_by_id(2)).uid, high.uid);
    }

    #[test]
    fn resolved_tasks_are_not_numbered() {
        let tasks = vec![
            at(1, "done", Status::Resolved),
            at(2, "open", Status::Pending),
        ];
        let snapshot = ok(assign_ids(tasks));
        assert_eq!(snapshot.len(), 2);
        assert_eq!(ok(snapshot.lookup_by_id(1)).summary, "open");
        assert!(matches!(snapshot.lookup_by_id(2), Err(TaskError::NotFound(2))));
        let resolved: Vec<_> = snapshot.iter().filter(|task| task.status.is_resolved()).collect();
        assert_eq!(resolved.len(), 1);
        assert!(resolved[0].ephemeral_id.is_none());
    }

    #[test]
    fn exceeding_the_bound_is_fatal() {
        let tasks: Vec<Task> = (0..=MAX_TASKS_OPEN)
            .map(|i| at(i64::try_from(i).unwrap_or_default(), "t", Status::Pending))
            .collect();
        assert!(matches!(
            assign_ids(tasks),
            Err(TaskError::TooManyOpenTasks { count, limit }) if count == MAX_TASKS_OPEN + 1 && limit == MAX_TASKS_OPEN
        ));
    }

    #[test]
    fn insert_takes_next_id_and_update_replaces() {
        let mut snapshot = ok(assign_ids(vec![at(1, "existing", Status::Pending)]));
        let added = ok(snapshot.insert(Task::new("new", Status::Pending)));
        assert_eq!(added.ephemeral_id, Some(2));

        let logged = ok(snapshot.insert(Task::new("logged", Status::Resolved)));
        assert!(logged.ephemeral_id.is_none());

        let mut changed = ok(snapshot.lookup_by_id(1)).clone();
        changed.summary = "renamed".into();
        ok(snapshot.update(changed));
        assert_eq!(ok(snapshot.lookup_by_id(1)).summary, "renamed");

        let mut stray = Task::new("stray", Status::Pending);
        stray.ephemeral_id = Some(42);
        assert!(matches!(snapshot.update(stray), Err(TaskError::NotFound(42))));
    }

    #[test]
    fn apply_preserves_ids() {
        let mut bug = at(2, "bug", Status::Pending);
        bug.tags.insert("bug".into());
        let snapshot = ok(assign_ids(vec![at(1, "plain", Status::Pending), bug]));
        let filter = Filter {
            tags: ["bug".to_owned()].into_iter().collect(),
            ..Filter::default()
        };
        let filtered = snapshot.apply(&filter);
        assert_eq!(filtered.len(), 1);
        assert_eq!(ok(filtered.lookup_by_id(2)).summary, "bug");
        assert!(filtered.lookup_by_id(1).is_err());
    }

    #[test]
    fn narrowing_by_status_keeps_load_numbering() {
        let mut started = at(2, "started", Status::Pending);
        started.status = Status::Active;
        let snapshot = ok(assign_ids(vec![at(1, "waiting", Status::Pending), started]));

        let active = snapshot.with_statuses(&[Status::Active]);
        assert_eq!(active.len(), 1);
        assert_eq!(ok(active.lookup_by_id(2)).summary, "started");
        assert!(active.lookup_by_id(1).is_err());

        let both = snapshot.with_statuses(&[Status::Pending, Status::Active]);
        assert_eq!(both, snapshot);
    }

    #[test]
    fn project_summary_counts_open_and_resolved() {
        let mut open = at(1, "open", Status::Pending);
        open.project = Some("site".into());
        let mut done = at(2, "done", Status::Resolved);
        done.project = Some("site".into());
        let snapshot = ok(assign_ids(vec![open, done, at(3, "none", Status::Pending)]));
        let projects = snapshot.projects();
        assert_eq!(projects.get("site"), Some(&(1, 1)));
        assert_eq!(projects.len(), 1);
    }
}
