pub mod format;
pub mod server;

pub use server::TrelloMcpServer;
