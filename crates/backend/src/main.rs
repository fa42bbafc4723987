use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use smart_todo_backend::{
    build_router,
    config::AppConfig,
    db,
    integrations::{
        calendar::{CalendarProvider, DisabledCalendar, GoogleCalendar},
        google_oauth::GoogleOAuth,
        mailer,
    },
    repository::{PgAccountStore, PgTaskStore},
    services::{FanOut, TaskService},
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smart_todo_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    tracing::info!("Starting Smart To-Do server");

    // Establish database connection pool
    let pool = db::establish_connection_pool(&config.database_url)?;
    tracing::info!("Database connection pool initialized");

    let mailer = mailer::from_config(&config.mail);
    let calendar: Arc<dyn CalendarProvider> = match &config.google {
        Some(google) => Arc::new(GoogleCalendar::new(google.clone())),
        None => Arc::new(DisabledCalendar),
    };
    let google_oauth = config.google.clone().map(GoogleOAuth::new);

    let tasks = TaskService::new(
        Arc::new(PgTaskStore::new(pool.clone())),
        mailer.clone(),
        calendar,
        FanOut::Background,
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState {
        config: Arc::new(config),
        tasks,
        accounts: Arc::new(PgAccountStore::new(pool)),
        mailer,
        google_oauth,
    };
    let app = build_router(state);

    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
