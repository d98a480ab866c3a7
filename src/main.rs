//! Fuse Link Relay - Main Application Entry Point
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Build the aggregator client and webhook verifier
//! 3. Build HTTP router with routes and middleware
//! 4. Start server on configured port

use fuse_link_relay::{config, router};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!(base_path = %config.fuse_base_path, "Configuration loaded");

    // Aggregator client, shared read-only by every request
    let state = router::AppState::from_config(&config)?;
    tracing::info!("Aggregator client ready");

    let app = router::build_router(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
