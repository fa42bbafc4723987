// Database models for Diesel
use anyhow::Context;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use smart_todo_types::{Task, UserSettings};
use uuid::Uuid;

/// Database representation of tasks.
/// Enum columns are stored as VARCHAR and parsed on the way out.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub previous_status: Option<String>,
    pub priority: String,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub calendar_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = anyhow::Error;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Task {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            status: row
                .status
                .parse()
                .with_context(|| format!("task {} has a corrupt status", row.id))?,
            previous_status: row
                .previous_status
                .as_deref()
                .map(str::parse)
                .transpose()
                .with_context(|| format!("task {} has a corrupt previous_status", row.id))?,
            priority: row
                .priority
                .parse()
                .with_context(|| format!("task {} has a corrupt priority", row.id))?,
            due_date: row.due_date,
            completed_at: row.completed_at,
            calendar_event_id: row.calendar_event_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Insertable struct for new tasks
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::tasks)]
pub struct NewTaskRow<'a> {
    pub user_id: Uuid,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub status: &'a str,
    pub previous_status: Option<&'a str>,
    pub priority: &'a str,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl<'a> From<&'a Task> for NewTaskRow<'a> {
    fn from(task: &'a Task) -> Self {
        NewTaskRow {
            user_id: task.user_id,
            title: &task.title,
            description: task.description.as_deref(),
            status: task.status.as_str(),
            previous_status: task.previous_status.map(|s| s.as_str()),
            priority: task.priority.as_str(),
            due_date: task.due_date,
            completed_at: task.completed_at,
        }
    }
}

/// Full overwrite of the user-editable task columns.
/// `calendar_event_id` is only written by calendar sync.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::tasks)]
#[diesel(treat_none_as_null = true)]
pub struct TaskChanges<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub status: &'a str,
    pub previous_status: Option<&'a str>,
    pub priority: &'a str,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> From<&'a Task> for TaskChanges<'a> {
    fn from(task: &'a Task) -> Self {
        TaskChanges {
            title: &task.title,
            description: task.description.as_deref(),
            status: task.status.as_str(),
            previous_status: task.previous_status.map(|s| s.as_str()),
            priority: task.priority.as_str(),
            due_date: task.due_date,
            completed_at: task.completed_at,
            updated_at: task.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub email_verified: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::verification_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct VerificationToken {
    pub id: Uuid,
    pub email: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::user_settings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserSettingsRow {
    pub user_id: Uuid,
    pub email_notifications: bool,
    pub calendar_sync: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<UserSettingsRow> for UserSettings {
    fn from(row: UserSettingsRow) -> Self {
        UserSettings {
            email_notifications: row.email_notifications,
            calendar_sync: row.calendar_sync,
        }
    }
}

/// A Google account linked for calendar sync
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = crate::schema::google_accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GoogleAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub calendar_id: String,
    pub refresh_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
