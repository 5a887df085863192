//! HTTP/JSON proxy in front of the Trello REST API

use anyhow::Context;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trello_mcp_server::{run_server, Config, TrelloClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // LOG_FORMAT=json for structured logs, anything else for human-readable
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "trello_mcp_server=info,trello_http=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    if dotenvy::dotenv().is_ok() {
        info!("Loaded environment from .env");
    }

    info!(log_format = %log_format, "Starting Trello HTTP proxy");

    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .credentials
        .ensure()
        .context("The HTTP proxy needs Trello credentials at startup")?;

    let trello = TrelloClient::from_config(&config).context("Failed to create Trello client")?;

    run_server(config.port, Arc::new(trello))
        .await
        .with_context(|| format!("HTTP server on port {} failed", config.port))?;

    Ok(())
}
