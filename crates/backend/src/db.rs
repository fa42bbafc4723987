use anyhow::Context;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{
    pooled_connection::{
        deadpool::{Object, Pool},
        AsyncDieselConnectionManager, ManagerConfig,
    },
    AsyncPgConnection, RunQueryDsl,
};
use smart_todo_types::Task;
use uuid::Uuid;

use crate::models::{GoogleAccount, NewTaskRow, TaskChanges, TaskRow, User, VerificationToken};

pub type DbPool = Pool<AsyncPgConnection>;
pub type DbConnection = Object<AsyncPgConnection>;

async fn establish_tls_connection(config: String) -> diesel::ConnectionResult<AsyncPgConnection> {
    // Set up rustls TLS configuration
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

    // Parse the connection string and connect with TLS
    let (client, connection) = tokio_postgres::connect(&config, tls)
        .await
        .map_err(|e| diesel::ConnectionError::BadConnection(e.to_string()))?;

    // Spawn the connection task
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });

    // Build the async connection from the tokio-postgres client
    AsyncPgConnection::try_from(client).await
}

/// Build the connection pool. TLS is used unless the URL opts out with `sslmode=disable`.
pub fn establish_connection_pool(database_url: &str) -> anyhow::Result<DbPool> {
    let config = if database_url.contains("sslmode=disable") {
        AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url)
    } else {
        let mut manager_config = ManagerConfig::default();
        manager_config.custom_setup =
            Box::new(|url| Box::pin(establish_tls_connection(url.to_string())));

        AsyncDieselConnectionManager::<AsyncPgConnection>::new_with_config(
            database_url,
            manager_config,
        )
    };

    let pool = Pool::builder(config)
        .max_size(10)
        .build()
        .context("Failed to create database pool")?;

    Ok(pool)
}

pub async fn get_conn(pool: &DbPool) -> anyhow::Result<DbConnection> {
    pool.get().await.context("Failed to get database connection")
}

// User database operations
pub mod users {
    use super::*;

    pub async fn get_by_id(conn: &mut AsyncPgConnection, user_id: Uuid) -> anyhow::Result<User> {
        use crate::schema::users::dsl::*;

        let user = users
            .filter(id.eq(user_id))
            .select(User::as_select())
            .first(conn)
            .await?;

        Ok(user)
    }

    /// Find the user for a verified email, creating the account on first sign-in.
    pub async fn upsert_verified(
        conn: &mut AsyncPgConnection,
        email_val: &str,
    ) -> anyhow::Result<User> {
        use crate::schema::users::dsl::*;

        let now = Utc::now();
        let user = diesel::insert_into(users)
            .values((email.eq(email_val), email_verified.eq(Some(now))))
            .on_conflict(email)
            .do_update()
            .set((email_verified.eq(Some(now)), updated_at.eq(now)))
            .returning(User::as_returning())
            .get_result(conn)
            .await?;

        Ok(user)
    }
}

// Magic-link verification token operations
pub mod verification_tokens {
    use super::*;

    /// Store a new token hash for an email, replacing any outstanding ones.
    pub async fn replace_for_email(
        conn: &mut AsyncPgConnection,
        email_val: &str,
        hash: &str,
        expires: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        use crate::schema::verification_tokens::dsl::*;

        diesel::delete(verification_tokens.filter(email.eq(email_val)))
            .execute(conn)
            .await?;

        diesel::insert_into(verification_tokens)
            .values((
                email.eq(email_val),
                token_hash.eq(hash),
                expires_at.eq(expires),
            ))
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Atomically remove and return a token. Single use: a second call yields `None`.
    pub async fn consume(
        conn: &mut AsyncPgConnection,
        email_val: &str,
        hash: &str,
    ) -> anyhow::Result<Option<VerificationToken>> {
        use crate::schema::verification_tokens::dsl::*;

        let token = diesel::delete(
            verification_tokens.filter(email.eq(email_val).and(token_hash.eq(hash))),
        )
        .returning(VerificationToken::as_returning())
        .get_result(conn)
        .await
        .optional()?;

        Ok(token)
    }

    pub async fn purge_expired(conn: &mut AsyncPgConnection) -> anyhow::Result<usize> {
        use crate::schema::verification_tokens::dsl::*;

        let purged = diesel::delete(verification_tokens.filter(expires_at.lt(Utc::now())))
            .execute(conn)
            .await?;

        Ok(purged)
    }
}

// Task database operations
pub mod tasks {
    use super::*;

    fn into_tasks(rows: Vec<TaskRow>) -> anyhow::Result<Vec<Task>> {
        rows.into_iter().map(Task::try_from).collect()
    }

    pub async fn list_for_user(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        status_filter: Option<&str>,
        priority_filter: Option<&str>,
    ) -> anyhow::Result<Vec<Task>> {
        use crate::schema::tasks::dsl::*;

        let mut query = tasks
            .filter(user_id.eq(owner))
            .select(TaskRow::as_select())
            .order_by(created_at.desc())
            .into_boxed();

        if let Some(s) = status_filter {
            query = query.filter(status.eq(s));
        }
        if let Some(p) = priority_filter {
            query = query.filter(priority.eq(p));
        }

        into_tasks(query.load(conn).await?)
    }

    pub async fn get_for_user(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        task_id: Uuid,
    ) -> anyhow::Result<Option<Task>> {
        use crate::schema::tasks::dsl::*;

        let row = tasks
            .filter(id.eq(task_id).and(user_id.eq(owner)))
            .select(TaskRow::as_select())
            .first(conn)
            .await
            .optional()?;

        row.map(Task::try_from).transpose()
    }

    pub async fn insert(conn: &mut AsyncPgConnection, task: &Task) -> anyhow::Result<Task> {
        use crate::schema::tasks::dsl::*;

        let row = diesel::insert_into(tasks)
            .values(NewTaskRow::from(task))
            .returning(TaskRow::as_returning())
            .get_result(conn)
            .await?;

        Task::try_from(row)
    }

    /// Overwrite the editable columns of an owned task. `None` if it no longer exists.
    pub async fn update(conn: &mut AsyncPgConnection, task: &Task) -> anyhow::Result<Option<Task>> {
        use crate::schema::tasks::dsl::*;

        let row = diesel::update(tasks.filter(id.eq(task.id).and(user_id.eq(task.user_id))))
            .set(TaskChanges::from(task))
            .returning(TaskRow::as_returning())
            .get_result(conn)
            .await
            .optional()?;

        row.map(Task::try_from).transpose()
    }

    /// Returns false when the task no longer exists.
    pub async fn set_calendar_event_id(
        conn: &mut AsyncPgConnection,
        task_id: Uuid,
        event_id: Option<&str>,
    ) -> anyhow::Result<bool> {
        use crate::schema::tasks::dsl::*;

        let updated = diesel::update(tasks.filter(id.eq(task_id)))
            .set(calendar_event_id.eq(event_id))
            .execute(conn)
            .await?;

        Ok(updated > 0)
    }

    /// Delete an owned task, returning the removed record.
    pub async fn delete_for_user(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        task_id: Uuid,
    ) -> anyhow::Result<Option<Task>> {
        use crate::schema::tasks::dsl::*;

        let row = diesel::delete(tasks.filter(id.eq(task_id).and(user_id.eq(owner))))
            .returning(TaskRow::as_returning())
            .get_result(conn)
            .await
            .optional()?;

        row.map(Task::try_from).transpose()
    }
}

// Per-user settings operations
pub mod settings {
    use super::*;
    use crate::models::UserSettingsRow;
    use smart_todo_types::UserSettings;

    /// Insert default settings for a user if none exist yet.
    pub async fn ensure_defaults(conn: &mut AsyncPgConnection, owner: Uuid) -> anyhow::Result<()> {
        use crate::schema::user_settings::dsl::*;

        let defaults = UserSettings::default();
        diesel::insert_into(user_settings)
            .values((
                user_id.eq(owner),
                email_notifications.eq(defaults.email_notifications),
                calendar_sync.eq(defaults.calendar_sync),
            ))
            .on_conflict(user_id)
            .do_nothing()
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn get(conn: &mut AsyncPgConnection, owner: Uuid) -> anyhow::Result<UserSettings> {
        use crate::schema::user_settings::dsl::*;

        let row = user_settings
            .filter(user_id.eq(owner))
            .select(UserSettingsRow::as_select())
            .first(conn)
            .await
            .optional()?;

        Ok(row.map(Into::into).unwrap_or_default())
    }

    pub async fn save(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        new_settings: UserSettings,
    ) -> anyhow::Result<UserSettings> {
        use crate::schema::user_settings::dsl::*;

        let now = Utc::now();
        let row = diesel::insert_into(user_settings)
            .values((
                user_id.eq(owner),
                email_notifications.eq(new_settings.email_notifications),
                calendar_sync.eq(new_settings.calendar_sync),
                updated_at.eq(now),
            ))
            .on_conflict(user_id)
            .do_update()
            .set((
                email_notifications.eq(new_settings.email_notifications),
                calendar_sync.eq(new_settings.calendar_sync),
                updated_at.eq(now),
            ))
            .returning(UserSettingsRow::as_returning())
            .get_result(conn)
            .await?;

        Ok(row.into())
    }
}

// Linked Google account operations
pub mod google_accounts {
    use super::*;

    pub async fn get_for_user(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
    ) -> anyhow::Result<Option<GoogleAccount>> {
        use crate::schema::google_accounts::dsl::*;

        let account = google_accounts
            .filter(user_id.eq(owner))
            .select(GoogleAccount::as_select())
            .first(conn)
            .await
            .optional()?;

        Ok(account)
    }

    /// Create or refresh the linked account. An absent refresh token keeps the stored one.
    pub async fn upsert(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        email_val: &str,
        refresh: Option<&str>,
    ) -> anyhow::Result<GoogleAccount> {
        use crate::schema::google_accounts::dsl::*;

        let now = Utc::now();

        if let Some(refresh) = refresh {
            let account = diesel::insert_into(google_accounts)
                .values((
                    user_id.eq(owner),
                    email.eq(email_val),
                    refresh_token.eq(refresh),
                ))
                .on_conflict(user_id)
                .do_update()
                .set((
                    email.eq(email_val),
                    refresh_token.eq(refresh),
                    updated_at.eq(now),
                ))
                .returning(GoogleAccount::as_returning())
                .get_result(conn)
                .await?;
            return Ok(account);
        }

        let account = diesel::update(google_accounts.filter(user_id.eq(owner)))
            .set((email.eq(email_val), updated_at.eq(now)))
            .returning(GoogleAccount::as_returning())
            .get_result(conn)
            .await
            .optional()?;

        account.context("Google did not return a refresh token and no account is linked")
    }

    pub async fn delete_for_user(conn: &mut AsyncPgConnection, owner: Uuid) -> anyhow::Result<bool> {
        use crate::schema::google_accounts::dsl::*;

        let deleted = diesel::delete(google_accounts.filter(user_id.eq(owner)))
            .execute(conn)
            .await?;

        Ok(deleted > 0)
    }
}
