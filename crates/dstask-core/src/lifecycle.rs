use time::OffsetDateTime;

use crate::Task;
use crate::error::TaskError;
use crate::status::Status;

/// Status changes a task may go through without `--force`.
pub const VALID_TRANSITIONS: [(Status, Status); 6] = [
    (Status::Pending, Status::Active),
    (Status::Active, Status::Paused),
    (Status::Paused, Status::Active),
    (Status::Pending, Status::Resolved),
    (Status::Paused, Status::Resolved),
    (Status::Active, Status::Resolved),
];

/// Whether `from -> to` appears in [`VALID_TRANSITIONS`].
#[must_use]
pub fn is_valid_transition(from: Status, to: Status) -> bool {
    VALID_TRANSITIONS.contains(&(from, to))
}

impl Task {
    /// Move the task to `to`, enforcing the transition table.
    ///
    /// # Errors
    /// Returns [`TaskError::InvalidTransition`] when the pair is not allowed; the task is left untouched.
    pub fn transition(&mut self, to: Status) -> Result<(), TaskError> {
        if !is_valid_transition(self.status, to) {
            return Err(TaskError::InvalidTransition { from: self.status, to });
        }
        self.apply_status(to);
        Ok(())
    }

    /// Move the task to `to` without consulting the transition table.
    ///
    /// Used for manual correction of records. Leaving `resolved` clears `resolved_at`.
    pub fn force_transition(&mut self, to: Status) {
        if self.status == to {
            return;
        }
        if self.status.is_resolved() {
            self.resolved_at = None;
        }
        self.apply_status(to);
    }

    fn apply_status(&mut self, to: Status) {
        self.status = to;
        if to.is_resolved() {
            self.resolved_at = Some(OffsetDateTime::now_utc());
        }
    }
}
