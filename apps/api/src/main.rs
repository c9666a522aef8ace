//! # Comandas API server
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Front end ───► HTTP (8000) ───► axum Router ───► SQLite               │
//! │                                       │                                 │
//! │                                       ▼                                 │
//! │                              Mercado Pago / Rede                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use comandas_api::config::DEV_JWT_SECRET;
use comandas_api::{bootstrap_admin, build_router, ApiConfig, AppState};
use comandas_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    info!("Starting Comandas API server...");

    let config = ApiConfig::load().context("loading configuration")?;
    info!(
        address = %config.bind_address(),
        database = %config.database_path,
        utc_offset = config.business.utc_offset_hours,
        "Configuration loaded"
    );
    if config.auth.jwt_secret == DEV_JWT_SECRET {
        warn!("Using the development JWT secret; set COMANDAS_AUTH__JWT_SECRET in production");
    }

    let db = Database::new(DbConfig::new(&config.database_path))
        .await
        .context("opening database")?;
    info!("Database ready, migrations applied");

    let state = AppState::new(db.clone(), config.clone())?;

    if let Some(admin) = bootstrap_admin(&state).await? {
        info!(username = %admin.username, "Created bootstrap superuser");
    }

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("binding {}", config.bind_address()))?;
    info!(address = %config.bind_address(), "Listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
