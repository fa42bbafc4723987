//! Google OAuth2 authorization-code flow for linking a calendar.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::GoogleConfig;

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

const SCOPES: [&str; 3] = [
    "openid",
    "email",
    "https://www.googleapis.com/auth/calendar.events",
];

#[derive(Debug, Deserialize)]
pub struct GoogleTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    email: String,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    grant_type: &'a str,
}

#[derive(Clone)]
pub struct GoogleOAuth {
    config: GoogleConfig,
    client: reqwest::Client,
    token_endpoint: String,
    userinfo_endpoint: String,
}

impl GoogleOAuth {
    pub fn new(config: GoogleConfig) -> Self {
        Self::with_endpoints(config, TOKEN_ENDPOINT, USERINFO_ENDPOINT)
    }

    pub fn with_endpoints(config: GoogleConfig, token_endpoint: &str, userinfo_endpoint: &str) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            token_endpoint: token_endpoint.to_string(),
            userinfo_endpoint: userinfo_endpoint.to_string(),
        }
    }

    /// Consent URL requesting offline calendar access
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?\
             client_id={}&\
             redirect_uri={}&\
             response_type=code&\
             scope={}&\
             access_type=offline&\
             prompt=consent&\
             state={}",
            AUTH_ENDPOINT,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&SCOPES.join(" ")),
            urlencoding::encode(state)
        )
    }

    pub async fn exchange_code(&self, code: &str) -> Result<GoogleTokens> {
        let response = self
            .client
            .post(&self.token_endpoint)
            .form(&TokenRequest {
                code,
                client_id: &self.config.client_id,
                client_secret: &self.config.client_secret,
                redirect_uri: &self.config.redirect_uri,
                grant_type: "authorization_code",
            })
            .send()
            .await
            .context("Token exchange failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Token exchange failed: {} - {}", status, body);
        }

        response.json().await.context("Invalid token response")
    }

    pub async fn fetch_email(&self, access_token: &str) -> Result<String> {
        let info: GoogleUserInfo = self
            .client
            .get(&self.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .context("Failed to get user info")?
            .error_for_status()
            .context("User info request rejected")?
            .json()
            .await
            .context("Invalid user info response")?;

        Ok(info.email)
    }
}
