use std::net::SocketAddr;

use anyhow::Context;
use merchant_ops_hub::{cache, config::Config, create_app, db, AppState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real deployments set the environment directly.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;

    let db = db::connect(&config)
        .await
        .context("failed to open database")?;
    let cache = cache::from_config(&config)
        .await
        .context("failed to initialize cache")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(
        "Starting merchant-ops-hub (env={}, db={}, cache={})",
        config.env,
        config.database_driver(),
        cache.backend_name()
    );

    let app = create_app(AppState::new(db, cache.clone(), config));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server running on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Err(e) = cache.close().await {
        warn!("closing cache: {e}");
    }
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
