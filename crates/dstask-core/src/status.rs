use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::TaskError;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Not started yet.
    Pending,
    /// Currently being worked on.
    Active,
    /// Started, then stopped.
    Paused,
    /// Handed to someone else.
    Delegated,
    /// Postponed.
    Deferred,
    /// Repeats on a schedule.
    Recurring,
    /// Finished. Terminal.
    Resolved,
}

impl Status {
    /// Every status, used for reporting loads.
    pub const ALL: [Self; 7] = [
        Self::Active,
        Self::Pending,
        Self::Delegated,
        Self::Deferred,
        Self::Paused,
        Self::Recurring,
        Self::Resolved,
    ];

    /// Statuses loaded by most commands; resolved tasks are expensive and rarely needed.
    pub const NON_RESOLVED: [Self; 6] = [
        Self::Active,
        Self::Pending,
        Self::Delegated,
        Self::Deferred,
        Self::Paused,
        Self::Recurring,
    ];

    /// String representation used in records and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Delegated => "delegated",
            Self::Deferred => "deferred",
            Self::Recurring => "recurring",
            Self::Resolved => "resolved",
        }
    }

    /// Whether the status is terminal.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority, `P0` being the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    /// Critical.
    P0,
    /// High.
    P1,
    /// Normal.
    #[default]
    P2,
    /// Low.
    P3,
}

impl Priority {
    /// All priorities, most urgent first.
    pub const ALL: [Self; 4] = [Self::P0, Self::P1, Self::P2, Self::P3];

    /// String representation (`P0`..`P3`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|priority| priority.as_str() == s)
            .ok_or_else(|| TaskError::UnknownPriority(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_resolved_excludes_only_resolved() {
        assert_eq!(Status::NON_RESOLVED.len(), Status::ALL.len() - 1);
        assert!(!Status::NON_RESOLVED.contains(&Status::Resolved));
    }

    #[test]
    fn priority_is_exact_and_ordered() {
        assert_eq!("P1".parse::<Priority>().ok(), Some(Priority::P1));
        assert!("p1".parse::<Priority>().is_err());
        assert!("P4".parse::<Priority>().is_err());
        assert!(Priority::P0 < Priority::P3);
        assert_eq!(Priority::default(), Priority::P2);
    }
}
