//! Authentication middleware layer for protecting routes.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::AppState;

use super::jwt;
use super::types::{AuthConfig, AuthUser, Claims};

/// Middleware function that requires authentication.
///
/// Use with `axum::middleware::from_fn_with_state`. On success the
/// [`AuthUser`] is available to handlers as `Extension<AuthUser>`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let config = &state.config.auth;

    let claims = match authenticate(request.headers(), config) {
        Ok(c) => c,
        Err(err) => return err.into_response(),
    };

    request.extensions_mut().insert(AuthUser {
        id: claims.sub,
        email: claims.email.clone(),
        name: claims.name.clone(),
    });

    let response = next.run(request).await;

    // Sliding session: re-issue tokens older than a day
    if jwt::should_refresh(&claims) {
        let user = AuthUser {
            id: claims.sub,
            email: claims.email,
            name: claims.name,
        };
        if let Ok(new_token) = jwt::create_token(config, &user) {
            let cookie = build_auth_cookie(config, &new_token);
            let (mut parts, body) = response.into_parts();
            if let Ok(cookie_value) = cookie.parse() {
                parts.headers.insert(header::SET_COOKIE, cookie_value);
            }
            return Response::from_parts(parts, body);
        }
    }

    response
}

/// Validate the session token carried by a request.
pub fn authenticate(headers: &HeaderMap, config: &AuthConfig) -> Result<Claims, ApiError> {
    // Try to get token from cookie first, then Authorization header
    let token = extract_token_from_cookie(headers, &config.cookie_name)
        .or_else(|| extract_token_from_header(headers))
        .ok_or_else(|| ApiError::unauthorized("Missing authentication"))?;

    jwt::validate_token(config, &token)
        .map_err(|_| ApiError::unauthorized("Invalid or expired token"))
}

fn extract_token_from_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;

    for cookie_str in cookie_header.split(';') {
        if let Ok(cookie) = cookie::Cookie::parse(cookie_str.trim()) {
            if cookie.name() == cookie_name {
                return Some(cookie.value().to_string());
            }
        }
    }

    None
}

fn extract_token_from_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|s| s.to_string())
}

/// Build an auth cookie string.
pub fn build_auth_cookie(config: &AuthConfig, value: &str) -> String {
    let max_age = config.token_duration_days * 24 * 60 * 60;
    let secure = if config.secure_cookies { "; Secure" } else { "" };
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        config.cookie_name, value, max_age, secure
    )
}

/// Cookie that removes the session.
pub fn clear_auth_cookie(config: &AuthConfig) -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        config.cookie_name
    )
}
