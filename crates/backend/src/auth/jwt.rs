//! JWT token creation and validation.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{AuthConfig, AuthUser, Claims};

/// Create a new session token for a user.
pub fn create_token(
    config: &AuthConfig,
    user: &AuthUser,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::days(config.token_duration_days);

    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

/// Validate a session token and return claims.
pub fn validate_token(
    config: &AuthConfig,
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// Check if token should be refreshed (older than 1 day).
pub fn should_refresh(claims: &Claims) -> bool {
    let now = Utc::now().timestamp();
    let age_seconds = now - claims.iat;
    let one_day_seconds = 86400;
    age_seconds > one_day_seconds
}

/// OAuth `state` payload binding a calendar connect flow to a user.
#[derive(Debug, Serialize, Deserialize)]
struct OAuthState {
    sub: Uuid,
    purpose: String,
    exp: i64,
}

const CALENDAR_STATE_PURPOSE: &str = "calendar_connect";

/// Sign a short-lived `state` value for the Google OAuth round trip.
pub fn create_oauth_state(
    config: &AuthConfig,
    user_id: Uuid,
) -> Result<String, jsonwebtoken::errors::Error> {
    let state = OAuthState {
        sub: user_id,
        purpose: CALENDAR_STATE_PURPOSE.to_string(),
        exp: (Utc::now() + Duration::minutes(10)).timestamp(),
    };

    encode(
        &Header::default(),
        &state,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

/// Verify an OAuth `state` value and return the user it was issued for.
pub fn validate_oauth_state(config: &AuthConfig, state: &str) -> Option<Uuid> {
    let data = decode::<OAuthState>(
        state,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;

    (data.claims.purpose == CALENDAR_STATE_PURPOSE).then_some(data.claims.sub)
}
