//! Storage seams.
//!
//! The task service talks to storage through [`TaskStore`], and the auth,
//! settings and calendar-link handlers through [`AccountStore`], so both can
//! be exercised without a database. [`PgTaskStore`] and [`PgAccountStore`]
//! are the production implementations on top of [`crate::db`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use smart_todo_types::{Task, TaskListQuery, UserSettings};
use uuid::Uuid;

use crate::db::{self, DbPool};
use crate::models::{GoogleAccount, User, VerificationToken};

/// What the fan-out needs to know about a task owner.
#[derive(Debug, Clone)]
pub struct OwnerContext {
    pub email: String,
    pub settings: UserSettings,
    pub google_account: Option<GoogleAccount>,
}

/// Task persistence scoped to an owning user.
///
/// Every read and write is filtered by owner; a task belonging to someone
/// else is indistinguishable from a missing one.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// List a user's tasks, filtered by the query's status and priority.
    async fn list(&self, owner: Uuid, query: &TaskListQuery) -> Result<Vec<Task>>;

    async fn get(&self, owner: Uuid, task_id: Uuid) -> Result<Option<Task>>;

    /// Persist a new task. Store-generated fields (id, timestamps) come back filled in.
    async fn insert(&self, task: &Task) -> Result<Task>;

    async fn update(&self, task: &Task) -> Result<Option<Task>>;

    async fn delete(&self, owner: Uuid, task_id: Uuid) -> Result<Option<Task>>;

    /// Narrow write used by calendar sync. Returns false when the task is gone.
    async fn set_calendar_event_id(&self, task_id: Uuid, event_id: Option<&str>) -> Result<bool>;

    async fn owner_context(&self, owner: Uuid) -> Result<OwnerContext>;
}

/// Postgres-backed task store
#[derive(Clone)]
pub struct PgTaskStore {
    pool: DbPool,
}

impl PgTaskStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn list(&self, owner: Uuid, query: &TaskListQuery) -> Result<Vec<Task>> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::tasks::list_for_user(
            &mut conn,
            owner,
            query.status.map(|s| s.as_str()),
            query.priority.map(|p| p.as_str()),
        )
        .await
    }

    async fn get(&self, owner: Uuid, task_id: Uuid) -> Result<Option<Task>> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::tasks::get_for_user(&mut conn, owner, task_id).await
    }

    async fn insert(&self, task: &Task) -> Result<Task> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::tasks::insert(&mut conn, task)
            .await
            .context("Failed to insert task")
    }

    async fn update(&self, task: &Task) -> Result<Option<Task>> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::tasks::update(&mut conn, task)
            .await
            .context("Failed to update task")
    }

    async fn delete(&self, owner: Uuid, task_id: Uuid) -> Result<Option<Task>> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::tasks::delete_for_user(&mut conn, owner, task_id)
            .await
            .context("Failed to delete task")
    }

    async fn set_calendar_event_id(&self, task_id: Uuid, event_id: Option<&str>) -> Result<bool> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::tasks::set_calendar_event_id(&mut conn, task_id, event_id).await
    }

    async fn owner_context(&self, owner: Uuid) -> Result<OwnerContext> {
        let mut conn = db::get_conn(&self.pool).await?;
        let user = db::users::get_by_id(&mut conn, owner)
            .await
            .context("Task owner not found")?;
        let settings = db::settings::get(&mut conn, owner).await?;
        let google_account = db::google_accounts::get_for_user(&mut conn, owner).await?;

        Ok(OwnerContext {
            email: user.email,
            settings,
            google_account,
        })
    }
}

/// Sign-in tokens, users, settings and linked Google accounts
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Remove expired sign-in tokens, returning how many went.
    async fn purge_expired_tokens(&self) -> Result<usize>;

    /// Store a token hash for an email, replacing the email's older tokens.
    async fn replace_token(
        &self,
        email: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Remove and return a matching token. A second call yields `None`.
    async fn consume_token(&self, email: &str, token_hash: &str)
        -> Result<Option<VerificationToken>>;

    /// The verified user for an email, created with default settings on first sign-in.
    async fn sign_in(&self, email: &str) -> Result<User>;

    async fn settings(&self, owner: Uuid) -> Result<UserSettings>;

    async fn save_settings(&self, owner: Uuid, settings: UserSettings) -> Result<UserSettings>;

    async fn google_account(&self, owner: Uuid) -> Result<Option<GoogleAccount>>;

    /// Create or refresh the link. An absent refresh token keeps the stored one.
    async fn link_google_account(
        &self,
        owner: Uuid,
        email: &str,
        refresh_token: Option<&str>,
    ) -> Result<GoogleAccount>;

    /// Returns false when nothing was linked.
    async fn unlink_google_account(&self, owner: Uuid) -> Result<bool>;
}

/// Postgres-backed account store
#[derive(Clone)]
pub struct PgAccountStore {
    pool: DbPool,
}

impl PgAccountStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn purge_expired_tokens(&self) -> Result<usize> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::verification_tokens::purge_expired(&mut conn).await
    }

    async fn replace_token(
        &self,
        email: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::verification_tokens::replace_for_email(&mut conn, email, token_hash, expires_at)
            .await
            .context("Failed to store sign-in token")
    }

    async fn consume_token(
        &self,
        email: &str,
        token_hash: &str,
    ) -> Result<Option<VerificationToken>> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::verification_tokens::consume(&mut conn, email, token_hash).await
    }

    async fn sign_in(&self, email: &str) -> Result<User> {
        let mut conn = db::get_conn(&self.pool).await?;
        let user = db::users::upsert_verified(&mut conn, email).await?;
        db::settings::ensure_defaults(&mut conn, user.id).await?;
        Ok(user)
    }

    async fn settings(&self, owner: Uuid) -> Result<UserSettings> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::settings::get(&mut conn, owner).await
    }

    async fn save_settings(&self, owner: Uuid, settings: UserSettings) -> Result<UserSettings> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::settings::save(&mut conn, owner, settings)
            .await
            .context("Failed to save settings")
    }

    async fn google_account(&self, owner: Uuid) -> Result<Option<GoogleAccount>> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::google_accounts::get_for_user(&mut conn, owner).await
    }

    async fn link_google_account(
        &self,
        owner: Uuid,
        email: &str,
        refresh_token: Option<&str>,
    ) -> Result<GoogleAccount> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::google_accounts::upsert(&mut conn, owner, email, refresh_token).await
    }

    async fn unlink_google_account(&self, owner: Uuid) -> Result<bool> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::google_accounts::delete_for_user(&mut conn, owner).await
    }
}
