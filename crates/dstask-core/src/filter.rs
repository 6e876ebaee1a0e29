use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::status::Priority;
use crate::Task;

/// Criteria bundle used for listing, command targeting and the persisted context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Explicit ephemeral ids. When non-empty, every other criterion is ignored.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub ids: BTreeSet<u32>,
    /// Tags that must all be present.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    /// Tags that must all be absent.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub antitags: BTreeSet<String>,
    /// Required project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Excluded projects.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub antiprojects: BTreeSet<String>,
    /// Required priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Case-insensitive substring of summary or notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Filter {
    /// Returns true when the filter matches every task.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
            && self.tags.is_empty()
            && self.antitags.is_empty()
            && self.project.is_none()
            && self.antiprojects.is_empty()
            && self.priority.is_none()
            && self.text.as_deref().is_none_or(|text| text.trim().is_empty())
    }

    /// Evaluate the filter against a task.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        if !self.ids.is_empty() {
            return task.ephemeral_id.is_some_and(|id| self.ids.contains(&id));
        }

        if !self.tags.is_subset(&task.tags) {
            return false;
        }
        if !self.antitags.is_disjoint(&task.tags) {
            return false;
        }
        if let Some(project) = &self.project
            && task.project.as_ref() != Some(project)
        {
            return false;
        }
        if let Some(project) = &task.project
            && self.antiprojects.contains(project)
        {
            return false;
        }
        if let Some(priority) = self.priority
            && task.priority != priority
        {
            return false;
        }
        if let Some(matcher) = self.text.as_deref().and_then(TextMatcher::new)
            && !matcher.matches(task)
        {
            return false;
        }
        true
    }

    /// Combine a context filter with a per-invocation filter.
    ///
    /// Set-valued criteria are unioned; single-valued criteria take the invocation
    /// value when present and fall back to the context otherwise.
    #[must_use]
    pub fn merge(context: &Self, invocation: &Self) -> Self {
        Self {
            ids: union(&context.ids, &invocation.ids),
            tags: union(&context.tags, &invocation.tags),
            antitags: union(&context.antitags, &invocation.antitags),
            project: invocation.project.clone().or_else(|| context.project.clone()),
            antiprojects: union(&context.antiprojects, &invocation.antiprojects),
            priority: invocation.priority.or(context.priority),
            text: invocation.text.clone().or_else(|| context.text.clone()),
        }
    }

    /// Copy tags, project and priority onto a task that is being created.
    pub fn prefill(&self, task: &mut Task) {
        task.tags.extend(self.tags.iter().cloned());
        if let Some(project) = &self.project {
            task.project = Some(project.clone());
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
    }
}

fn union<T: Ord + Clone>(left: &BTreeSet<T>, right: &BTreeSet<T>) -> BTreeSet<T> {
    left.union(right).cloned().collect()
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.ids.iter().map(u32::to_string).collect();
        parts.extend(self.tags.iter().map(|tag| format!("+{tag}")));
        parts.extend(self.antitags.iter().map(|tag| format!("-{tag}")));
        if let Some(project) = &self.project {
            parts.push(format!("project:{project}"));
        }
        parts.extend(self.antiprojects.iter().map(|project| format!("-project:{project}")));
        if let Some(priority) = self.priority {
            parts.push(priority.to_string());
        }
        if let Some(text) = &self.text {
            parts.push(format!("\"{text}\""));
        }
        f.write_str(&parts.join(" "))
    }
}

/// Case-insensitive substring matcher for summary and notes.
struct TextMatcher {
    needle: String,
}

impl TextMatcher {
    fn new(query: &str) -> Option<Self> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            needle: trimmed.to_lowercase(),
        })
    }

    fn matches(&self, task: &Task) -> bool {
        self.matches_field(&task.summary) || self.matches_field(&task.notes)
    }

    fn matches_field(&self, value: &str) -> bool {
        value.to_lowercase().contains(&self.needle)
    }
}
