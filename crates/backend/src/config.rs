use anyhow::{Context, Result};
use std::env;

use crate::auth::types::AuthConfig;

/// Resend delivery settings. Email is disabled when no API key is configured.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub from: String,
}

/// Google OAuth client used for calendar access.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    /// Public base URL, used to build magic links
    pub app_url: String,
    pub frontend_dir: String,
    /// Empty means permissive CORS
    pub cors_allowed_origins: Vec<String>,
    pub auth: AuthConfig,
    pub mail: MailConfig,
    pub google: Option<GoogleConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let app_url = env::var("APP_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        let google = match (
            env::var("GOOGLE_CLIENT_ID").ok(),
            env::var("GOOGLE_CLIENT_SECRET").ok(),
        ) {
            (Some(client_id), Some(client_secret)) => Some(GoogleConfig {
                client_id,
                client_secret,
                redirect_uri: env::var("GOOGLE_REDIRECT_URI")
                    .unwrap_or_else(|_| format!("{}/api/calendar/callback", app_url)),
            }),
            _ => {
                tracing::warn!("GOOGLE_CLIENT_ID/GOOGLE_CLIENT_SECRET not set, calendar sync disabled");
                None
            }
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            frontend_dir: env::var("FRONTEND_DIR").unwrap_or_else(|_| "frontend/dist".to_string()),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            auth: AuthConfig::from_env()?,
            mail: MailConfig {
                api_key: env::var("RESEND_API_KEY").ok().filter(|k| !k.is_empty()),
                api_url: env::var("RESEND_API_URL")
                    .unwrap_or_else(|_| "https://api.resend.com".to_string()),
                from: env::var("EMAIL_FROM")
                    .unwrap_or_else(|_| "Smart To-Do <noreply@smart-todo.local>".to_string()),
            },
            google,
            app_url,
        })
    }
}
