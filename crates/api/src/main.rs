use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use turnstile_core::directory::UserDirectory;
use turnstile_core::memory::{MemorySessionStore, MemoryUserDirectory};
use turnstile_core::session::SessionStore;

use turnstile_api::auth::jwt::TokenIssuer;
use turnstile_api::auth::password::CredentialVerifier;
use turnstile_api::auth::service::AuthService;
use turnstile_api::config::{LogFormat, ServerConfig, StorageBackend};
use turnstile_api::router::build_app_router;
use turnstile_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogFormat::Pretty);
            tracing::error!(error = %e, "Refusing to start with invalid configuration");
            return Err(e.into());
        }
    };

    // --- Tracing ---
    init_tracing(config.log_format);
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Storage ---
    let store_timeout = Duration::from_secs(config.store_timeout_secs);
    let (users, sessions) = build_stores(&config.storage, store_timeout).await?;

    // --- Auth ---
    let issuer = TokenIssuer::new(&config.jwt)?;
    let verifier = CredentialVerifier::new()?;
    let auth = Arc::new(AuthService::new(
        users,
        Arc::clone(&sessions),
        issuer,
        verifier,
        store_timeout,
    ));

    // --- App state ---
    let state = AppState {
        auth,
        sessions,
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config)?;

    // --- Start server ---
    let host: std::net::IpAddr = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let (pretty, json) = match format {
        LogFormat::Pretty => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "turnstile_api=debug,tower_http=debug".into()),
        )
        .with(pretty)
        .with(json)
        .init();
}

/// Connect the configured backend. PostgreSQL is migrated before use.
async fn build_stores(
    storage: &StorageBackend,
    store_timeout: Duration,
) -> anyhow::Result<(Arc<dyn UserDirectory>, Arc<dyn SessionStore>)> {
    match storage {
        StorageBackend::Postgres { database_url } => {
            let pool = turnstile_db::create_pool(database_url, store_timeout)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Database connection pool created");

            turnstile_db::health_check(&pool)
                .await
                .context("Database health check failed")?;

            turnstile_db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database migrations applied");

            let users: Arc<dyn UserDirectory> =
                Arc::new(turnstile_db::PgUserDirectory::new(pool.clone()));
            let sessions: Arc<dyn SessionStore> = Arc::new(turnstile_db::PgSessionStore::new(pool));
            Ok((users, sessions))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; users and sessions are lost on restart");
            let users: Arc<dyn UserDirectory> = Arc::new(MemoryUserDirectory::new());
            let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
            Ok((users, sessions))
        }
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
