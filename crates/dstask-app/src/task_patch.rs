//! Attribute changes applied by `modify`.

use std::collections::BTreeSet;

use dstask_core::{Filter, Priority, Task};

/// Entries to add to and remove from a set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SetDiff<T> {
    /// Entries to insert.
    pub added: Vec<T>,
    /// Entries to remove.
    pub removed: Vec<T>,
}

impl<T> SetDiff<T> {
    /// Returns true when both added/removed are empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Tag, project and priority changes expressed with filter tokens.
///
/// `+tag` adds, `-tag` removes, `project:x` moves the task, `-project:x` clears
/// the project only when it is currently `x`, and `P0`..`P3` sets the priority.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    /// Tags to add and remove.
    pub tags: SetDiff<String>,
    /// New project.
    pub project: Option<String>,
    /// Projects to clear when the task currently belongs to one of them.
    pub clear_projects: BTreeSet<String>,
    /// New priority.
    pub priority: Option<Priority>,
}

impl TaskPatch {
    /// Build a patch from the attribute tokens of a parsed command line.
    #[must_use]
    pub fn from_filter(filter: &Filter) -> Self {
        Self {
            tags: SetDiff {
                added: filter.tags.iter().cloned().collect(),
                removed: filter.antitags.iter().cloned().collect(),
            },
            project: filter.project.clone(),
            clear_projects: filter.antiprojects.clone(),
            priority: filter.priority,
        }
    }

    /// Returns true when the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
            && self.project.is_none()
            && self.clear_projects.is_empty()
            && self.priority.is_none()
    }

    /// Apply the patch. Returns true when the task changed.
    pub fn apply(&self, task: &mut Task) -> bool {
        let before = task.clone();

        for tag in &self.tags.added {
            task.tags.insert(tag.clone());
        }
        for tag in &self.tags.removed {
            task.tags.remove(tag);
        }
        if let Some(project) = &self.project {
            task.project = Some(project.clone());
        } else if task
            .project
            .as_ref()
            .is_some_and(|current| self.clear_projects.contains(current))
        {
            task.project = None;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }

        *task != before
    }
}
