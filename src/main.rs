// main.rs
// Loads configuration, connects to MongoDB, seeds users and serves the router.

use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use saccodesk::{config::AppConfig, router, state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;
    let addr = config.bind_addr;
    let state = Arc::new(
        state::init_state(config)
            .await
            .context("failed to initialize MongoDB state")?,
    );

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
