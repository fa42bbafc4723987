//! Google Calendar client for task due dates.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use google_calendar3::api::{Event, EventDateTime};
use google_calendar3::hyper_rustls::HttpsConnector;
use google_calendar3::CalendarHub;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

use crate::config::GoogleConfig;
use crate::models::GoogleAccount;

/// Event mirrored from a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub summary: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Outcome of updating an event that may have been removed on the calendar side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventUpdate {
    Updated,
    Missing,
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Create an event and return its provider id
    async fn create_event(&self, account: &GoogleAccount, event: &CalendarEvent) -> Result<String>;

    async fn update_event(
        &self,
        account: &GoogleAccount,
        event_id: &str,
        event: &CalendarEvent,
    ) -> Result<EventUpdate>;

    /// Delete an event. Deleting an event that no longer exists succeeds.
    async fn delete_event(&self, account: &GoogleAccount, event_id: &str) -> Result<()>;
}

/// Calendar provider used when no Google OAuth client is configured
pub struct DisabledCalendar;

#[async_trait]
impl CalendarProvider for DisabledCalendar {
    async fn create_event(&self, _: &GoogleAccount, _: &CalendarEvent) -> Result<String> {
        anyhow::bail!("Google Calendar is not configured")
    }

    async fn update_event(
        &self,
        _: &GoogleAccount,
        _: &str,
        _: &CalendarEvent,
    ) -> Result<EventUpdate> {
        anyhow::bail!("Google Calendar is not configured")
    }

    async fn delete_event(&self, _: &GoogleAccount, _: &str) -> Result<()> {
        anyhow::bail!("Google Calendar is not configured")
    }
}

type Hub = CalendarHub<HttpsConnector<HttpConnector>>;

/// Authorized clients keyed by account id. An entry is stale once the
/// account's refresh token changes.
struct HubCache<H> {
    entries: Mutex<HashMap<Uuid, (String, Arc<H>)>>,
}

impl<H> Default for HubCache<H> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<H> HubCache<H> {
    fn get(&self, account: &GoogleAccount) -> Option<Arc<H>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&account.id)
            .filter(|(refresh_token, _)| *refresh_token == account.refresh_token)
            .map(|(_, hub)| hub.clone())
    }

    fn insert(&self, account: &GoogleAccount, hub: H) -> Arc<H> {
        let hub = Arc::new(hub);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account.id, (account.refresh_token.clone(), hub.clone()));
        hub
    }
}

/// Google Calendar v3 client authorized per account by its stored refresh token.
///
/// The authenticator inside each hub caches and refreshes access tokens, so
/// hubs are kept for reuse across calls.
pub struct GoogleCalendar {
    config: GoogleConfig,
    hubs: HubCache<Hub>,
}

impl GoogleCalendar {
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            config,
            hubs: HubCache::default(),
        }
    }

    async fn hub_for(&self, account: &GoogleAccount) -> Result<Arc<Hub>> {
        if let Some(hub) = self.hubs.get(account) {
            return Ok(hub);
        }

        // Use the yup_oauth2 re-exported by google_calendar3 to avoid version mismatch
        let secret = google_calendar3::yup_oauth2::authorized_user::AuthorizedUserSecret {
            client_id: self.config.client_id.clone(),
            client_secret: self.config.client_secret.clone(),
            refresh_token: account.refresh_token.clone(),
            key_type: "authorized_user".to_string(),
        };

        let auth = google_calendar3::yup_oauth2::AuthorizedUserAuthenticator::builder(secret)
            .build()
            .await
            .context("Failed to build authenticator from refresh token")?;

        let connector = google_calendar3::hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .context("Failed to load native TLS roots")?
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(TokioExecutor::new()).build(connector);
        tracing::debug!("Authorized calendar client for {}", account.email);
        Ok(self.hubs.insert(account, CalendarHub::new(client, auth)))
    }
}

fn to_google_event(event: &CalendarEvent) -> Event {
    Event {
        summary: Some(event.summary.clone()),
        description: event.description.clone(),
        start: Some(EventDateTime {
            date_time: Some(event.start),
            ..Default::default()
        }),
        end: Some(EventDateTime {
            date_time: Some(event.end),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// True when Google reports the event as gone (404 Not Found / 410 Gone)
fn is_gone(err: &google_calendar3::Error) -> bool {
    match err {
        google_calendar3::Error::BadRequest(body) => matches!(
            body.pointer("/error/code").and_then(|c| c.as_u64()),
            Some(404) | Some(410)
        ),
        google_calendar3::Error::Failure(response) => {
            matches!(response.status().as_u16(), 404 | 410)
        }
        _ => false,
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendar {
    async fn create_event(&self, account: &GoogleAccount, event: &CalendarEvent) -> Result<String> {
        let hub = self.hub_for(account).await?;

        let (_, created) = hub
            .events()
            .insert(to_google_event(event), &account.calendar_id)
            .doit()
            .await
            .context("Failed to create calendar event")?;

        let id = created.id.context("Calendar API returned an event without an id")?;
        tracing::info!("Created calendar event: {} (id: {})", event.summary, id);
        Ok(id)
    }

    async fn update_event(
        &self,
        account: &GoogleAccount,
        event_id: &str,
        event: &CalendarEvent,
    ) -> Result<EventUpdate> {
        let hub = self.hub_for(account).await?;

        match hub
            .events()
            .patch(to_google_event(event), &account.calendar_id, event_id)
            .doit()
            .await
        {
            Ok(_) => {
                tracing::info!("Updated calendar event {}", event_id);
                Ok(EventUpdate::Updated)
            }
            Err(e) if is_gone(&e) => {
                tracing::warn!("Calendar event {} no longer exists", event_id);
                Ok(EventUpdate::Missing)
            }
            Err(e) => Err(e).context("Failed to update calendar event"),
        }
    }

    async fn delete_event(&self, account: &GoogleAccount, event_id: &str) -> Result<()> {
        let hub = self.hub_for(account).await?;

        match hub
            .events()
            .delete(&account.calendar_id, event_id)
            .doit()
            .await
        {
            Ok(_) => {
                tracing::info!("Deleted calendar event {}", event_id);
                Ok(())
            }
            Err(e) if is_gone(&e) => {
                tracing::debug!("Calendar event {} already deleted", event_id);
                Ok(())
            }
            Err(e) => Err(e).context("Failed to delete calendar event"),
        }
    }
}
