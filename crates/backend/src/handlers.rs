use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use serde::Deserialize;
use smart_todo_types::{
    CalendarConnectResponse, CalendarStatusResponse, CreateTaskRequest, Task, TaskListQuery,
    TaskStats, UpdateSettingsRequest, UpdateStatusRequest, UpdateTaskRequest, UserSettings,
};
use uuid::Uuid;

use crate::auth::{jwt, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::integrations::google_oauth::GoogleOAuth;
use crate::AppState;

pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

// Task handlers
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<TaskListQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.tasks.list(user.id, &query).await?))
}

pub async fn task_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<TaskStats>> {
    Ok(Json(state.tasks.stats(user.id).await?))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = state.tasks.create(user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.tasks.get(user.id, id).await?))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.tasks.update(user.id, id, payload).await?))
}

pub async fn update_task_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> ApiResult<Json<Task>> {
    Ok(Json(
        state.tasks.update_status(user.id, id, payload.status).await?,
    ))
}

pub async fn toggle_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.tasks.toggle(user.id, id).await?))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.tasks.delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Settings handlers
pub async fn get_settings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<UserSettings>> {
    Ok(Json(state.accounts.settings(user.id).await?))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UpdateSettingsRequest>,
) -> ApiResult<Json<UserSettings>> {
    let mut current = state.accounts.settings(user.id).await?;

    if let Some(email_notifications) = payload.email_notifications {
        current.email_notifications = email_notifications;
    }
    if let Some(calendar_sync) = payload.calendar_sync {
        if calendar_sync && state.accounts.google_account(user.id).await?.is_none() {
            return Err(ApiError::bad_request(
                "Connect Google Calendar before enabling calendar sync",
            ));
        }
        current.calendar_sync = calendar_sync;
    }

    let saved = state.accounts.save_settings(user.id, current).await?;
    tracing::info!("Updated settings for user {}", user.id);
    Ok(Json(saved))
}

// Google Calendar connection handlers
fn google_oauth(state: &AppState) -> ApiResult<&GoogleOAuth> {
    state
        .google_oauth
        .as_ref()
        .ok_or_else(|| ApiError::Config("Google Calendar credentials are not set".to_string()))
}

pub async fn calendar_connect(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<CalendarConnectResponse>> {
    let oauth = google_oauth(&state)?;
    let oauth_state = jwt::create_oauth_state(&state.config.auth, user.id)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to sign OAuth state: {}", e)))?;

    Ok(Json(CalendarConnectResponse {
        auth_url: oauth.authorization_url(&oauth_state),
    }))
}

#[derive(Debug, Deserialize)]
pub struct CalendarCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Google redirects here after consent. The signed `state` names the user,
/// so this route does not require a session.
pub async fn calendar_callback(
    State(state): State<AppState>,
    Query(params): Query<CalendarCallbackParams>,
) -> Response {
    if let Some(error) = &params.error {
        tracing::warn!("Google consent was not granted: {}", error);
        return Redirect::to("/settings?calendar=denied").into_response();
    }

    match calendar_callback_inner(&state, params).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("Calendar OAuth callback error: {:?}", e);
            Redirect::to("/settings?calendar=error").into_response()
        }
    }
}

async fn calendar_callback_inner(
    state: &AppState,
    params: CalendarCallbackParams,
) -> Result<Response, ApiError> {
    let oauth = google_oauth(state)?;

    let owner = params
        .state
        .as_deref()
        .and_then(|s| jwt::validate_oauth_state(&state.config.auth, s))
        .ok_or_else(|| ApiError::bad_request("Invalid OAuth state"))?;
    let code = params
        .code
        .ok_or_else(|| ApiError::bad_request("Missing authorization code"))?;

    let tokens = oauth.exchange_code(&code).await?;
    let email = oauth.fetch_email(&tokens.access_token).await?;

    if tokens.refresh_token.is_none() {
        tracing::warn!("No refresh token received for {}", email);
    }

    state
        .accounts
        .link_google_account(owner, &email, tokens.refresh_token.as_deref())
        .await?;

    tracing::info!("Linked Google Calendar {} for user {}", email, owner);
    Ok(Redirect::to("/settings?calendar=connected").into_response())
}

pub async fn calendar_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<CalendarStatusResponse>> {
    let account = state.accounts.google_account(user.id).await?;

    Ok(Json(CalendarStatusResponse {
        connected: account.is_some(),
        email: account.map(|a| a.email),
    }))
}

pub async fn calendar_disconnect(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<StatusCode> {
    if !state.accounts.unlink_google_account(user.id).await? {
        return Err(ApiError::not_found("Google Calendar connection"));
    }

    let mut current = state.accounts.settings(user.id).await?;
    if current.calendar_sync {
        current.calendar_sync = false;
        state.accounts.save_settings(user.id, current).await?;
    }

    tracing::info!("Disconnected Google Calendar for user {}", user.id);
    Ok(StatusCode::NO_CONTENT)
}
