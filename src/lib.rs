pub mod config;
pub mod http_server;
#[cfg(feature = "stdio-mcp")]
pub mod mcp;
pub mod trello;

pub use config::{Config, ConfigError, Credentials};
pub use http_server::{create_app, run_server};
#[cfg(feature = "stdio-mcp")]
pub use mcp::TrelloMcpServer;
pub use trello::{TrelloClient, TrelloError};
