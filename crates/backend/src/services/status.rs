//! Task status state machine.
//!
//! Entering `COMPLETED` remembers where the task came from in
//! `previous_status` and stamps `completed_at`. Leaving `COMPLETED` clears
//! both. Outside `COMPLETED`, `previous_status` is always `None`.

use chrono::{DateTime, Utc};
use smart_todo_types::{Task, TaskStatus};

/// Move `task` to `next`, maintaining `previous_status` and `completed_at`.
///
/// Returns `false` when the task was already in `next` (nothing changes).
pub fn apply_status(task: &mut Task, next: TaskStatus, now: DateTime<Utc>) -> bool {
    let current = task.status;
    if current == next {
        return false;
    }

    match (current, next) {
        (_, TaskStatus::Completed) => {
            task.previous_status = Some(current);
            task.completed_at = Some(now);
        }
        (TaskStatus::Completed, _) => {
            task.previous_status = None;
            task.completed_at = None;
        }
        _ => {}
    }

    task.status = next;
    true
}

/// Flip completion: completed tasks go back to the status they had before,
/// everything else becomes completed.
pub fn toggle_completion(task: &mut Task, now: DateTime<Utc>) {
    let next = match task.status {
        TaskStatus::Completed => task.previous_status.unwrap_or(TaskStatus::Pending),
        _ => TaskStatus::Completed,
    };
    apply_status(task, next, now);
}

/// Status fields for a freshly created task.
pub fn initial_status(task: &mut Task, requested: Option<TaskStatus>, now: DateTime<Utc>) {
    task.status = TaskStatus::Pending;
    task.previous_status = None;
    task.completed_at = None;

    if let Some(status) = requested {
        apply_status(task, status, now);
    }
}
