use anyhow::Context;
use rmcp::transport::stdio;
use rmcp::ServiceExt;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trello_mcp_server::{Config, TrelloMcpServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the MCP JSON-RPC stream, logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trello_mcp_server=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();

    if dotenvy::dotenv().is_ok() {
        info!("Loaded environment from .env");
    }

    info!("Starting Trello MCP Server");

    let config = Config::from_env().context("Failed to load configuration")?;
    if config.credentials.ensure().is_err() {
        // Tools still register; each call reports the missing credentials
        warn!("TRELLO_API_KEY or TRELLO_TOKEN is not set");
    }

    let mcp_server = TrelloMcpServer::new(&config).context("Failed to create Trello client")?;
    info!(api_base_url = %config.api_base_url, "MCP server initialized");

    let service = mcp_server
        .serve(stdio())
        .await
        .context("Failed to start stdio transport")?;
    service.waiting().await?;

    Ok(())
}
