//! Auth-related types and configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Re-export shared types for convenience
pub use smart_todo_types::{AuthUserResponse, MagicLinkRequest, MagicLinkResponse};

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: Uuid,
    pub email: String,
    pub name: Option<String>,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

/// Validated user from JWT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

/// Auth configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_duration_days: i64,
    pub magic_link_ttl_minutes: i64,
    pub cookie_name: String,
    pub secure_cookies: bool,
}

impl AuthConfig {
    /// Load auth configuration from environment variables.
    ///
    /// Required env vars:
    /// - `JWT_SECRET`: Secret key for signing session tokens
    ///
    /// Optional:
    /// - `SESSION_DAYS` (default 7)
    /// - `MAGIC_LINK_TTL_MINUTES` (default 1440)
    /// - `RUST_ENV=production` marks cookies `Secure`
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.len() < 16 {
            anyhow::bail!("JWT_SECRET must be at least 16 characters");
        }

        let token_duration_days = std::env::var("SESSION_DAYS")
            .ok()
            .map(|s| s.parse())
            .transpose()
            .context("SESSION_DAYS must be a number")?
            .unwrap_or(7);

        let magic_link_ttl_minutes = std::env::var("MAGIC_LINK_TTL_MINUTES")
            .ok()
            .map(|s| s.parse())
            .transpose()
            .context("MAGIC_LINK_TTL_MINUTES must be a number")?
            .unwrap_or(24 * 60);

        Ok(Self {
            jwt_secret,
            token_duration_days,
            magic_link_ttl_minutes,
            cookie_name: "auth_token".to_string(),
            secure_cookies: std::env::var("RUST_ENV").unwrap_or_default() == "production",
        })
    }
}
