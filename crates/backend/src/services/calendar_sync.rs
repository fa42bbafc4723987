//! Decides which calendar call a task write needs.

use chrono::Duration;
use smart_todo_types::Task;

use crate::integrations::calendar::CalendarEvent;

/// Length of the event blocked out for a due date
pub const EVENT_DURATION_MINUTES: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarAction {
    Create,
    Update(String),
    Delete(String),
    Nothing,
}

/// Plan the calendar call that follows a create or update.
pub fn plan_after_write(task: &Task, sync_enabled: bool) -> CalendarAction {
    match (&task.calendar_event_id, task.due_date.is_some() && sync_enabled) {
        (None, true) => CalendarAction::Create,
        (Some(id), true) => CalendarAction::Update(id.clone()),
        (Some(id), false) => CalendarAction::Delete(id.clone()),
        (None, false) => CalendarAction::Nothing,
    }
}

/// A deleted task takes its event with it, whatever the sync setting.
pub fn plan_after_delete(task: &Task) -> CalendarAction {
    match &task.calendar_event_id {
        Some(id) => CalendarAction::Delete(id.clone()),
        None => CalendarAction::Nothing,
    }
}

/// Build the event for a task. `None` when the task has no due date.
pub fn event_for(task: &Task) -> Option<CalendarEvent> {
    let start = task.due_date?;

    let mut description = task.description.clone().unwrap_or_default();
    if !description.is_empty() {
        description.push_str("\n\n");
    }
    description.push_str(&format!(
        "Status: {} | Priority: {}",
        task.status.label(),
        task.priority.label()
    ));

    Some(CalendarEvent {
        summary: task.title.clone(),
        description: Some(description),
        start,
        end: start + Duration::minutes(EVENT_DURATION_MINUTES),
    })
}
