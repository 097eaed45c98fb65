//! MusicMatch - social graph backend for a music marketplace

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use musicmatch::{
    api::{self, AppState},
    config::Config,
    db::{self, SqlxGraphGateway},
    services::session,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "musicmatch=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting MusicMatch...");

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.yml"));
    let config = Config::load_with_env(&config_path)?;
    tracing::info!("Configuration loaded from {}", config_path.display());

    // Initialize graph store
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Graph store connected: {}", config.database.url);

    // Run migrations
    let pending = db::migrations::pending_count(&pool)
        .await
        .context("Failed to inspect migrations")?;
    tracing::info!("{} pending migration(s)", pending);
    db::migrations::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database migrations completed");

    let gateway = SqlxGraphGateway::boxed(pool.clone(), config.database.timeout());
    let sessions = session::from_config(&config.session)
        .context("Failed to initialize session manager")?;
    tracing::info!("Session strategy: {:?}", config.session.strategy);

    let state = AppState::new(gateway, sessions);

    // Build router
    let app = api::build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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

    tracing::info!("Shutdown signal received");
}
