//! Outbound email through the Resend HTTP API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::config::MailConfig;

/// A rendered email ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Build the mailer for a configuration: Resend when an API key is set, otherwise a no-op.
pub fn from_config(config: &MailConfig) -> std::sync::Arc<dyn Mailer> {
    match &config.api_key {
        Some(key) => std::sync::Arc::new(ResendMailer::new(
            &config.api_url,
            key.clone(),
            config.from.clone(),
        )),
        None => {
            tracing::warn!("RESEND_API_KEY not set, outgoing email is disabled");
            std::sync::Arc::new(NoopMailer)
        }
    }
}

#[derive(Serialize)]
struct SendEmailBody<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

pub struct ResendMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(api_url: &str, api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/emails", api_url.trim_end_matches('/')),
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&SendEmailBody {
                from: &self.from,
                to: [&message.to],
                subject: &message.subject,
                html: &message.html,
                text: &message.text,
            })
            .send()
            .await
            .context("Failed to reach email API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Email API rejected message: {} - {}", status, body);
        }

        tracing::debug!("Sent email '{}' to {}", message.subject, message.to);
        Ok(())
    }
}

/// Drops every message
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        tracing::debug!(
            "Email disabled, not sending '{}' to {}",
            message.subject,
            message.to
        );
        Ok(())
    }
}
