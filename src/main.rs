use blog_api::{
    AppState, SessionStore,
    config::{AppConfig, Env},
    create_router,
    repository::{InMemoryUserStore, PostgresUserStore, UserStoreState},
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(300);

/// main
///
/// Loads configuration, installs logging, connects the user store and serves
/// HTTP. Every configuration problem aborts here, before a listener is bound.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let config = AppConfig::load().map_err(|e| format!("FATAL: {e}"))?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "blog_api=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    let users: UserStoreState = match &config.db_url {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .map_err(|e| format!("FATAL: failed to connect to Postgres: {e}"))?;
            Arc::new(PostgresUserStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using seeded in-memory user store");
            Arc::new(InMemoryUserStore::seeded())
        }
    };

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, users)?;

    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            match sessions.purge_expired().await {
                Ok(0) => {}
                Ok(n) => tracing::debug!("purged {} expired sessions", n),
                Err(e) => tracing::error!("session purge failed: {}", e),
            }
        }
    });

    let app = create_router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app).await?;
    Ok(())
}
