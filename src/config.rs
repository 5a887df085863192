use std::time::Duration;
use thiserror::Error;

use crate::trello::TrelloError;

/// Default Trello REST API base URL
pub const DEFAULT_API_BASE_URL: &str = "https://api.trello.com/1";

/// Default HTTP proxy port
pub const DEFAULT_PORT: u16 = 3001;

/// Default outbound request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid PORT value '{value}': {reason}")]
    InvalidPort { value: String, reason: String },

    #[error("Invalid TRELLO_TIMEOUT_SECS value '{value}': {reason}")]
    InvalidTimeout { value: String, reason: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Trello API key/token pair plus the optional default board
#[derive(Clone, Default)]
pub struct Credentials {
    /// Trello API key
    pub api_key: String,

    /// Trello member token
    pub token: String,

    /// Board used when a tool call does not name one
    pub default_board_id: Option<String>,
}

impl Credentials {
    pub fn new(
        api_key: impl Into<String>,
        token: impl Into<String>,
        default_board_id: Option<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            token: token.into(),
            default_board_id: default_board_id.filter(|id| !id.trim().is_empty()),
        }
    }

    /// Fail with `MissingCredentials` unless both key and token are set
    pub fn ensure(&self) -> Result<(), TrelloError> {
        if self.api_key.trim().is_empty() || self.token.trim().is_empty() {
            return Err(TrelloError::MissingCredentials);
        }
        Ok(())
    }
}

// Key and token stay out of logs and panic messages.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &redact(&self.api_key))
            .field("token", &redact(&self.token))
            .field("default_board_id", &self.default_board_id)
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

/// Configuration for the Trello MCP and HTTP servers
#[derive(Debug, Clone)]
pub struct Config {
    /// Trello credentials and default board
    pub credentials: Credentials,

    /// Base URL of the Trello REST API (no trailing slash)
    pub api_base_url: String,

    /// Timeout applied to every outbound Trello call
    pub request_timeout: Duration,

    /// HTTP proxy port
    pub port: u16,
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// Missing credentials are not an error here: the stdio server reports them
    /// per tool call, the HTTP server checks them eagerly at startup.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let credentials = Credentials::new(
            non_empty("TRELLO_API_KEY").unwrap_or_default(),
            non_empty("TRELLO_TOKEN").unwrap_or_default(),
            non_empty("TRELLO_BOARD_ID"),
        );

        let api_base_url = match non_empty("TRELLO_API_BASE_URL") {
            Some(raw) => {
                url::Url::parse(&raw)?;
                raw.trim_end_matches('/').to_string()
            }
            None => DEFAULT_API_BASE_URL.to_string(),
        };

        let port = match non_empty("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidPort {
                    value: raw.clone(),
                    reason: e.to_string(),
                })?,
            None => DEFAULT_PORT,
        };

        let timeout_secs = match non_empty("TRELLO_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| ConfigError::InvalidTimeout {
                        value: raw.clone(),
                        reason: e.to_string(),
                    })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidTimeout {
                        value: raw,
                        reason: "timeout must be at least one second".to_string(),
                    });
                }
                secs
            }
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Config {
            credentials,
            api_base_url,
            request_timeout: Duration::from_secs(timeout_secs),
            port,
        })
    }
}
