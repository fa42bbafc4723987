//! Email bodies for sign-in and task notifications.

use html_escape::encode_text;
use smart_todo_types::Task;

use super::mailer::EmailMessage;

/// What happened to a task, for notification wording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    Created,
    Updated,
    Deleted,
}

impl TaskEvent {
    fn verb(&self) -> &'static str {
        match self {
            TaskEvent::Created => "created",
            TaskEvent::Updated => "updated",
            TaskEvent::Deleted => "deleted",
        }
    }
}

pub fn magic_link(to: &str, link: &str, ttl_minutes: i64) -> EmailMessage {
    let validity = if ttl_minutes % 60 == 0 {
        format!("{} hour(s)", ttl_minutes / 60)
    } else {
        format!("{} minutes", ttl_minutes)
    };
    let href = html_escape::encode_double_quoted_attribute(link);

    EmailMessage {
        to: to.to_string(),
        subject: "Sign in to Smart To-Do".to_string(),
        html: format!(
            "<p>Click the link below to sign in to Smart To-Do.</p>\
             <p><a href=\"{href}\">Sign in</a></p>\
             <p>This link expires in {validity} and can only be used once. \
             If you did not request it, you can ignore this email.</p>"
        ),
        text: format!(
            "Sign in to Smart To-Do:\n\n{link}\n\n\
             This link expires in {validity} and can only be used once."
        ),
    }
}

pub fn task_notification(to: &str, task: &Task, event: TaskEvent) -> EmailMessage {
    let due = task
        .due_date
        .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "none".to_string());

    let mut html = format!(
        "<p>Your task <strong>{}</strong> was {}.</p><ul>\
         <li>Status: {}</li><li>Priority: {}</li><li>Due: {}</li></ul>",
        encode_text(&task.title),
        event.verb(),
        task.status.label(),
        task.priority.label(),
        due,
    );
    let mut text = format!(
        "Your task \"{}\" was {}.\n\nStatus: {}\nPriority: {}\nDue: {}\n",
        task.title,
        event.verb(),
        task.status.label(),
        task.priority.label(),
        due,
    );

    if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
        html.push_str(&format!("<p>{}</p>", encode_text(description)));
        text.push_str(&format!("\n{}\n", description));
    }

    EmailMessage {
        to: to.to_string(),
        subject: format!("Task {}: {}", event.verb(), task.title),
        html,
        text,
    }
}
