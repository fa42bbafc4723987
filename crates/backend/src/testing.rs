//! In-memory fakes for unit tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use smart_todo_types::{Task, TaskListQuery, TaskPriority, TaskStatus, UserSettings};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::auth::magic_link;
use crate::integrations::calendar::{CalendarEvent, CalendarProvider, EventUpdate};
use crate::integrations::mailer::{EmailMessage, Mailer};
use crate::models::{GoogleAccount, User, VerificationToken};
use crate::repository::{AccountStore, OwnerContext, TaskStore};

pub fn task_fixture() -> Task {
    let now = Utc::now();
    Task {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        title: "Prepare slides".to_string(),
        description: None,
        status: TaskStatus::Pending,
        previous_status: None,
        priority: TaskPriority::Medium,
        due_date: None,
        completed_at: None,
        calendar_event_id: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn google_account(owner: Uuid) -> GoogleAccount {
    let now = Utc::now();
    GoogleAccount {
        id: Uuid::new_v4(),
        user_id: owner,
        email: "owner@gmail.com".to_string(),
        calendar_id: "primary".to_string(),
        refresh_token: "refresh".to_string(),
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    tasks: Mutex<HashMap<Uuid, Task>>,
    owners: Mutex<HashMap<Uuid, OwnerContext>>,
}

impl InMemoryStore {
    pub fn add_owner(
        &self,
        owner: Uuid,
        email: &str,
        settings: UserSettings,
        google_account: Option<GoogleAccount>,
    ) {
        self.owners.lock().unwrap().insert(
            owner,
            OwnerContext {
                email: email.to_string(),
                settings,
                google_account,
            },
        );
    }

    pub fn set_settings(&self, owner: Uuid, settings: UserSettings) {
        if let Some(ctx) = self.owners.lock().unwrap().get_mut(&owner) {
            ctx.settings = settings;
        }
    }

    pub fn seed(&self, task: Task) {
        self.tasks.lock().unwrap().insert(task.id, task);
    }

    pub fn task(&self, id: Uuid) -> Option<Task> {
        self.tasks.lock().unwrap().get(&id).cloned()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn list(&self, owner: Uuid, query: &TaskListQuery) -> Result<Vec<Task>> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.user_id == owner)
            .filter(|t| query.status.map_or(true, |s| t.status == s))
            .filter(|t| query.priority.map_or(true, |p| t.priority == p))
            .cloned()
            .collect())
    }

    async fn get(&self, owner: Uuid, task_id: Uuid) -> Result<Option<Task>> {
        Ok(self.task(task_id).filter(|t| t.user_id == owner))
    }

    async fn insert(&self, task: &Task) -> Result<Task> {
        self.tasks.lock().unwrap().insert(task.id, task.clone());
        Ok(task.clone())
    }

    async fn update(&self, task: &Task) -> Result<Option<Task>> {
        let mut tasks = self.tasks.lock().unwrap();
        match tasks.get_mut(&task.id) {
            Some(existing) if existing.user_id == task.user_id => {
                // calendar_event_id is owned by calendar sync
                let event_id = existing.calendar_event_id.clone();
                *existing = Task {
                    calendar_event_id: event_id,
                    ..task.clone()
                };
                Ok(Some(existing.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, owner: Uuid, task_id: Uuid) -> Result<Option<Task>> {
        let mut tasks = self.tasks.lock().unwrap();
        if tasks.get(&task_id).is_some_and(|t| t.user_id == owner) {
            Ok(tasks.remove(&task_id))
        } else {
            Ok(None)
        }
    }

    async fn set_calendar_event_id(&self, task_id: Uuid, event_id: Option<&str>) -> Result<bool> {
        match self.tasks.lock().unwrap().get_mut(&task_id) {
            Some(task) => {
                task.calendar_event_id = event_id.map(str::to_string);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn owner_context(&self, owner: Uuid) -> Result<OwnerContext> {
        self.owners
            .lock()
            .unwrap()
            .get(&owner)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown owner {}", owner))
    }
}

/// Sign-in tokens, users, settings and Google links held in memory
#[derive(Default)]
pub struct InMemoryAccounts {
    tokens: Mutex<Vec<VerificationToken>>,
    users: Mutex<HashMap<String, User>>,
    settings: Mutex<HashMap<Uuid, UserSettings>>,
    google: Mutex<HashMap<Uuid, GoogleAccount>>,
}

impl InMemoryAccounts {
    /// Store a token for `email` and return the raw value a link would carry
    pub fn issue_token(&self, email: &str, expires_at: DateTime<Utc>) -> String {
        let raw = magic_link::generate_token();
        self.tokens.lock().unwrap().push(VerificationToken {
            id: Uuid::new_v4(),
            email: email.to_string(),
            token_hash: magic_link::hash_token(&raw),
            expires_at,
            created_at: Utc::now(),
        });
        raw
    }

    pub fn token_count(&self, email: &str) -> usize {
        self.tokens
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.email == email)
            .count()
    }

    pub fn user(&self, email: &str) -> Option<User> {
        self.users.lock().unwrap().get(email).cloned()
    }

    pub fn link(&self, owner: Uuid) {
        self.google.lock().unwrap().insert(owner, google_account(owner));
    }

    pub fn put_settings(&self, owner: Uuid, settings: UserSettings) {
        self.settings.lock().unwrap().insert(owner, settings);
    }

    pub fn stored_settings(&self, owner: Uuid) -> UserSettings {
        self.settings
            .lock()
            .unwrap()
            .get(&owner)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccounts {
    async fn purge_expired_tokens(&self) -> Result<usize> {
        let mut tokens = self.tokens.lock().unwrap();
        let before = tokens.len();
        let now = Utc::now();
        tokens.retain(|t| t.expires_at > now);
        Ok(before - tokens.len())
    }

    async fn replace_token(
        &self,
        email: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tokens = self.tokens.lock().unwrap();
        tokens.retain(|t| t.email != email);
        tokens.push(VerificationToken {
            id: Uuid::new_v4(),
            email: email.to_string(),
            token_hash: token_hash.to_string(),
            expires_at,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn consume_token(
        &self,
        email: &str,
        token_hash: &str,
    ) -> Result<Option<VerificationToken>> {
        let mut tokens = self.tokens.lock().unwrap();
        let position = tokens
            .iter()
            .position(|t| t.email == email && t.token_hash == token_hash);
        Ok(position.map(|i| tokens.remove(i)))
    }

    async fn sign_in(&self, email: &str) -> Result<User> {
        let now = Utc::now();
        let user = {
            let mut users = self.users.lock().unwrap();
            let user = users.entry(email.to_string()).or_insert_with(|| User {
                id: Uuid::new_v4(),
                email: email.to_string(),
                name: None,
                email_verified: None,
                created_at: now,
                updated_at: now,
            });
            user.email_verified = Some(now);
            user.updated_at = now;
            user.clone()
        };
        self.settings.lock().unwrap().entry(user.id).or_default();
        Ok(user)
    }

    async fn settings(&self, owner: Uuid) -> Result<UserSettings> {
        Ok(self.stored_settings(owner))
    }

    async fn save_settings(&self, owner: Uuid, settings: UserSettings) -> Result<UserSettings> {
        self.put_settings(owner, settings);
        Ok(settings)
    }

    async fn google_account(&self, owner: Uuid) -> Result<Option<GoogleAccount>> {
        Ok(self.google.lock().unwrap().get(&owner).cloned())
    }

    async fn link_google_account(
        &self,
        owner: Uuid,
        email: &str,
        refresh_token: Option<&str>,
    ) -> Result<GoogleAccount> {
        let mut google = self.google.lock().unwrap();
        let account = match (google.get(&owner).cloned(), refresh_token) {
            (Some(existing), refresh) => GoogleAccount {
                email: email.to_string(),
                refresh_token: refresh.map_or(existing.refresh_token.clone(), str::to_string),
                updated_at: Utc::now(),
                ..existing
            },
            (None, Some(refresh)) => GoogleAccount {
                email: email.to_string(),
                refresh_token: refresh.to_string(),
                ..google_account(owner)
            },
            (None, None) => anyhow::bail!("no refresh token and no linked account"),
        };
        google.insert(owner, account.clone());
        Ok(account)
    }

    async fn unlink_google_account(&self, owner: Uuid) -> Result<bool> {
        Ok(self.google.lock().unwrap().remove(&owner).is_some())
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    failing: Mutex<bool>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail(&self) {
        *self.failing.lock().unwrap() = true;
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        if *self.failing.lock().unwrap() {
            anyhow::bail!("mail server unavailable");
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarCall {
    Create(String),
    Update(String, String),
    Delete(String),
}

/// Calendar fake handing out ids `evt-1`, `evt-2`, ...
#[derive(Default)]
pub struct FakeCalendar {
    calls: Mutex<Vec<CalendarCall>>,
    events: Mutex<HashSet<String>>,
    next_id: Mutex<u32>,
    failing: Mutex<bool>,
    create_delay: Mutex<Option<Duration>>,
}

impl FakeCalendar {
    pub fn calls(&self) -> Vec<CalendarCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail(&self) {
        *self.failing.lock().unwrap() = true;
    }

    /// Make every event creation take `delay`
    pub fn slow(&self, delay: Duration) {
        *self.create_delay.lock().unwrap() = Some(delay);
    }

    /// Simulate the user deleting the event directly in their calendar
    pub fn forget(&self, event_id: &str) {
        self.events.lock().unwrap().remove(event_id);
    }

    fn check(&self) -> Result<()> {
        if *self.failing.lock().unwrap() {
            anyhow::bail!("calendar unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl CalendarProvider for FakeCalendar {
    async fn create_event(&self, _: &GoogleAccount, event: &CalendarEvent) -> Result<String> {
        self.check()?;
        let delay = *self.create_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.calls
            .lock()
            .unwrap()
            .push(CalendarCall::Create(event.summary.clone()));

        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let id = format!("evt-{}", *next_id);
        self.events.lock().unwrap().insert(id.clone());
        Ok(id)
    }

    async fn update_event(
        &self,
        _: &GoogleAccount,
        event_id: &str,
        event: &CalendarEvent,
    ) -> Result<EventUpdate> {
        self.check()?;
        self.calls.lock().unwrap().push(CalendarCall::Update(
            event_id.to_string(),
            event.summary.clone(),
        ));

        if self.events.lock().unwrap().contains(event_id) {
            Ok(EventUpdate::Updated)
        } else {
            Ok(EventUpdate::Missing)
        }
    }

    async fn delete_event(&self, _: &GoogleAccount, event_id: &str) -> Result<()> {
        self.check()?;
        self.calls
            .lock()
            .unwrap()
            .push(CalendarCall::Delete(event_id.to_string()));
        self.events.lock().unwrap().remove(event_id);
        Ok(())
    }
}
