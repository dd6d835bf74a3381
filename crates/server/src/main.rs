use anyhow::Error as AnyhowError;
use server::{
    AppState,
    auth::ProviderError,
    config::{ConfigError, GitFablesConfig},
    db, file_logging, routes,
};
use sqlx::{Error as SqlxError, migrate::MigrateError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitFablesError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlx(#[from] SqlxError),
    #[error(transparent)]
    Migrate(#[from] MigrateError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

#[tokio::main]
async fn main() -> Result<(), GitFablesError> {
    // Load .env file if present (for development)
    dotenvy::dotenv().ok();

    let config = GitFablesConfig::from_env()?;
    if let Some(dsn) = config.sentry_dsn.as_deref() {
        utils::sentry::init_once(dsn);
    }

    // The guard must be held for the lifetime of the application to ensure logs are flushed
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let _file_log_guard = file_logging::init_logging(&log_level);

    let pool = db::create_pool(&config.database_url).await?;
    db::migrate(&pool).await?;
    tracing::info!(
        max_connections = db::get_max_connections(),
        "database ready"
    );

    let listen_addr = config.listen_addr.clone();
    let state = AppState::new(pool.clone(), config)?;
    let purge_task = state.rate_limiter().spawn_purge_task();
    let app_router = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, app_router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    purge_task.abort();

    tracing::info!("Closing database connection pool...");
    pool.close().await;
    tracing::info!("Database connection pool closed");

    Ok(())
}

pub async fn shutdown_signal() {
    // Always wait for Ctrl+C
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let terminate = async {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
            } else {
                tracing::error!("Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
