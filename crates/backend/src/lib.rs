//! Smart To-Do backend: task API with magic-link sign-in, email
//! notifications and Google Calendar sync.

use axum::{
    http::{header, Method},
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod integrations;
pub mod models;
pub mod repository;
mod schema;
pub mod services;

#[cfg(test)]
mod testing;

use config::AppConfig;
use integrations::{google_oauth::GoogleOAuth, Mailer};
use repository::AccountStore;
use services::TaskService;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tasks: TaskService,
    pub accounts: Arc<dyn AccountStore>,
    pub mailer: Arc<dyn Mailer>,
    /// `None` when Google credentials are not configured
    pub google_oauth: Option<GoogleOAuth>,
}

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/auth/me", get(auth::auth_me))
        // Task routes
        .route(
            "/api/tasks",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        .route("/api/tasks/stats", get(handlers::task_stats))
        .route(
            "/api/tasks/:id",
            get(handlers::get_task)
                .put(handlers::update_task)
                .delete(handlers::delete_task),
        )
        .route("/api/tasks/:id/status", patch(handlers::update_task_status))
        .route("/api/tasks/:id/toggle", post(handlers::toggle_task))
        // Settings routes
        .route(
            "/api/settings",
            get(handlers::get_settings).put(handlers::update_settings),
        )
        // Calendar connection routes
        .route("/api/calendar/connect", get(handlers::calendar_connect))
        .route("/api/calendar/status", get(handlers::calendar_status))
        .route("/api/calendar", delete(handlers::calendar_disconnect))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let public = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/auth/magic-link", post(auth::request_magic_link))
        .route("/api/auth/verify", get(auth::verify_magic_link))
        .route("/api/auth/logout", post(auth::auth_logout))
        .route("/api/calendar/callback", get(handlers::calendar_callback));

    let frontend_dir = state.config.frontend_dir.clone();
    let app = public
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&state.config.cors_allowed_origins))
        .with_state(state);

    // Serve static frontend files if the directory exists
    if std::path::Path::new(&frontend_dir).exists() {
        tracing::info!("Serving frontend from {}", frontend_dir);
        let index_path = format!("{}/index.html", frontend_dir);
        let serve_dir = ServeDir::new(&frontend_dir).not_found_service(ServeFile::new(&index_path));
        app.fallback_service(serve_dir)
    } else {
        tracing::info!(
            "Frontend directory not found at {}, serving API only",
            frontend_dir
        );
        app
    }
}

/// Build CORS layer from the configured origins.
///
/// With no origins configured, defaults to permissive CORS (for development only).
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<_> = allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!(
            "CORS_ALLOWED_ORIGINS not set, using permissive CORS (not recommended for production)"
        );
        return CorsLayer::permissive();
    }

    tracing::info!("CORS configured for origins: {:?}", origins);
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
