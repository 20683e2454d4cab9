//! shelter server entry point.
//!
//! Boots the offline cache proxy as an MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use shelter_core::config::AppConfig;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod state;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        origin = %config.origin,
        generation = %config.generation,
        db_path = %config.db_path.display(),
        "Starting shelter on stdio transport"
    );

    let state = Arc::new(state::ProxyState::from_config(&config).await?);

    let (session, _upgrade) = state.start(config.generation_id()).await;
    let handler = handler::ShelterServer::new(state, session);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
