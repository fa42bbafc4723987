//! Authentication HTTP handlers.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::integrations::templates;
use crate::AppState;

use super::{
    build_auth_cookie, clear_auth_cookie, jwt, magic_link,
    types::{AuthUser, AuthUserResponse, MagicLinkRequest, MagicLinkResponse},
};

const MAGIC_LINK_SENT: &str = "If that address can sign in, a link is on its way.";
const INVALID_LINK: &str = "/?auth_error=invalid_link";

/// Email a single-use sign-in link.
///
/// The response is identical whether or not an account exists for the
/// address, so it cannot be used to discover which users exist.
pub async fn request_magic_link(
    State(state): State<AppState>,
    Json(payload): Json<MagicLinkRequest>,
) -> ApiResult<(StatusCode, Json<MagicLinkResponse>)> {
    let request = MagicLinkRequest {
        email: magic_link::normalize_email(&payload.email),
    };
    request
        .validate()
        .map_err(|_| ApiError::bad_request("A valid email address is required"))?;

    let config = &state.config;

    match state.accounts.purge_expired_tokens().await {
        Ok(0) => {}
        Ok(n) => tracing::debug!("Purged {} expired sign-in tokens", n),
        Err(e) => tracing::warn!("Failed to purge expired sign-in tokens: {:?}", e),
    }

    let token = magic_link::generate_token();
    let expires_at = Utc::now() + Duration::minutes(config.auth.magic_link_ttl_minutes);
    state
        .accounts
        .replace_token(&request.email, &magic_link::hash_token(&token), expires_at)
        .await?;

    let link = magic_link::verification_url(&config.app_url, &token, &request.email);
    if config.mail.api_key.is_none() {
        tracing::info!("Email delivery disabled; sign-in link for {}: {}", request.email, link);
    }

    let message = templates::magic_link(&request.email, &link, config.auth.magic_link_ttl_minutes);
    state.mailer.send(&message).await?;
    tracing::info!("Sent sign-in link to {}", request.email);

    Ok((
        StatusCode::ACCEPTED,
        Json(MagicLinkResponse {
            message: MAGIC_LINK_SENT.to_string(),
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    pub token: Option<String>,
    pub email: Option<String>,
}

/// Redeem a sign-in link and start a session.
pub async fn verify_magic_link(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    let (Some(token), Some(email)) = (params.token, params.email) else {
        tracing::warn!("Sign-in link without token or email");
        return Redirect::to(INVALID_LINK).into_response();
    };

    match verify_inner(&state, &token, &email).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("Magic link verification error: {:?}", e);
            Redirect::to("/?auth_error=verification_failed").into_response()
        }
    }
}

async fn verify_inner(state: &AppState, token: &str, email: &str) -> Result<Response, ApiError> {
    let config = &state.config.auth;
    let email = magic_link::normalize_email(email);

    let stored = state
        .accounts
        .consume_token(&email, &magic_link::hash_token(token))
        .await?;

    match stored {
        Some(token) if token.expires_at > Utc::now() => {}
        Some(_) => {
            tracing::info!("Expired sign-in link used for {}", email);
            return Ok(Redirect::to(INVALID_LINK).into_response());
        }
        None => {
            tracing::warn!("Unknown sign-in link used for {}", email);
            return Ok(Redirect::to(INVALID_LINK).into_response());
        }
    }

    let user = state.accounts.sign_in(&email).await?;

    let auth_user = AuthUser {
        id: user.id,
        email: user.email,
        name: user.name,
    };
    let token = jwt::create_token(config, &auth_user)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to create token: {}", e)))?;
    let cookie = build_auth_cookie(config, &token);

    tracing::info!("Successful sign-in for: {}", auth_user.email);

    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/"),
            (header::SET_COOKIE, cookie.as_str()),
        ],
    )
        .into_response())
}

/// Get current authenticated user info.
pub async fn auth_me(Extension(user): Extension<AuthUser>) -> Json<AuthUserResponse> {
    Json(AuthUserResponse {
        id: user.id,
        email: user.email,
        name: user.name,
    })
}

/// Logout - clear auth cookie.
pub async fn auth_logout(State(state): State<AppState>) -> impl IntoResponse {
    let cookie = clear_auth_cookie(&state.config.auth);
    (StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)])
}
