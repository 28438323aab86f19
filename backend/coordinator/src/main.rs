//! Food donation coordinator — entry point.
//!
//! Donors post surplus food, exactly one volunteer claims each donation, and
//! the claimant later marks it delivered. Serves the lifecycle operations and
//! impact metrics over a small Axum REST API backed by SQLite.

mod api;
mod config;
mod db;
mod errors;
mod lifecycle;
mod metrics;
mod models;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use api::ApiState;
use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load optional .env file (ignored if missing) so it can set RUST_LOG too.
    let _ = dotenvy::dotenv();

    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // The pool is the only shared handle; every operation receives it explicitly.
    let pool = db::init_pool(&config.database_url, config.max_connections).await?;

    let state = Arc::new(ApiState {
        pool: pool.clone(),
        default_page_size: config.default_page_size,
        max_page_size: config.max_page_size,
    });
    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
}
