use crate::config::{Config, Credentials, DEFAULT_API_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::trello::requests::{CardUpdate, NewCard};
use crate::trello::types::{Method, Query, RequestBody, RequestOptions};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Error types for Trello API operations
#[derive(Debug, thiserror::Error)]
pub enum TrelloError {
    #[error("Missing Trello credentials: set TRELLO_API_KEY and TRELLO_TOKEN")]
    MissingCredentials,

    #[error("Trello API error {status}: {body}")]
    UpstreamError { status: u16, body: String },

    #[error("Failed to decode Trello response: {0}")]
    DecodeError(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),
}

impl TrelloError {
    /// Upstream status code, when Trello answered with an error
    pub fn status(&self) -> Option<u16> {
        match self {
            TrelloError::UpstreamError { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, TrelloError::Validation(_))
    }
}

impl From<reqwest::Error> for TrelloError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs carry key and token, never echo them
        TrelloError::Http(err.without_url())
    }
}

/// Append `key` and `token` unless the URL already carries them
///
/// Calling this twice leaves the URL unchanged the second time, and a value the
/// caller put on the URL is never overwritten.
pub fn append_auth(url: &mut Url, credentials: &Credentials) {
    let has_key = url.query_pairs().any(|(k, _)| k == "key");
    let has_token = url.query_pairs().any(|(k, _)| k == "token");

    if has_key && has_token {
        return;
    }

    let mut pairs = url.query_pairs_mut();
    if !has_key {
        pairs.append_pair("key", &credentials.api_key);
    }
    if !has_token {
        pairs.append_pair("token", &credentials.token);
    }
}

/// URL without its query string, safe for logs
pub(crate) fn loggable(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

/// Check an ID before it is spliced into an endpoint path
pub fn path_id<'a>(field: &str, value: &'a str) -> Result<&'a str, TrelloError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TrelloError::Validation(format!("{} cannot be empty", field)));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(TrelloError::Validation(format!(
            "{} contains invalid characters: {}",
            field, value
        )));
    }
    Ok(value)
}

/// Trello REST API client authenticated with a static key/token pair
#[derive(Clone)]
pub struct TrelloClient {
    http_client: reqwest::Client,
    credentials: Credentials,
    base_url: String,
}

impl TrelloClient {
    /// Create a client against the public Trello API
    pub fn new(credentials: Credentials) -> Result<Self, TrelloError> {
        Self::new_with_base_url(
            credentials,
            DEFAULT_API_BASE_URL,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Create a client from loaded configuration
    pub fn from_config(config: &Config) -> Result<Self, TrelloError> {
        Self::new_with_base_url(
            config.credentials.clone(),
            config.api_base_url.clone(),
            config.request_timeout,
        )
    }

    /// Create a client with a custom base URL (for testing)
    pub fn new_with_base_url(
        credentials: Credentials,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TrelloError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("trello-mcp-server/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| TrelloError::InvalidUrl(e.to_string()))?;

        Ok(Self {
            http_client,
            credentials,
            base_url,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Explicit board ID, or the configured default board
    pub fn resolve_board_id(&self, explicit: Option<&str>) -> Result<String, TrelloError> {
        let explicit = explicit.map(str::trim).filter(|id| !id.is_empty());
        match explicit.or(self.credentials.default_board_id.as_deref()) {
            Some(id) => Ok(path_id("board_id", id)?.to_string()),
            None => Err(TrelloError::Validation(
                "board_id is required (no TRELLO_BOARD_ID default configured)".to_string(),
            )),
        }
    }

    /// Build the authenticated URL for an endpoint
    pub fn build_url(&self, endpoint: &str, query: &Query) -> Result<Url, TrelloError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, endpoint))
            .map_err(|e| TrelloError::InvalidUrl(e.to_string()))?;

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query.present() {
                pairs.append_pair(key, &value);
            }
        }

        append_auth(&mut url, &self.credentials);
        Ok(url)
    }

    /// Perform one authenticated Trello call and decode the JSON answer
    ///
    /// Exactly one round trip; a non-2xx answer becomes `UpstreamError`.
    pub async fn forward(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Value, TrelloError> {
        self.credentials.ensure()?;

        let url = self.build_url(endpoint, &options.query)?;
        debug!(
            method = %options.method,
            url = %loggable(&url),
            "Forwarding Trello request"
        );

        let mut request = self.http_client.request(options.method.into(), url);

        if options.method != Method::Get {
            request = match options.body {
                Some(RequestBody::Form(pairs)) => request.form(&pairs),
                Some(RequestBody::Json(body)) => request.json(&body),
                None => request,
            };
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(upstream_error(response, endpoint).await);
        }

        let text = response.text().await?;
        let json = serde_json::from_str(&text)?;
        debug!(status = status.as_u16(), endpoint = %endpoint, "Trello request succeeded");
        Ok(json)
    }

    /// GET shorthand
    pub async fn get(&self, endpoint: &str) -> Result<Value, TrelloError> {
        self.forward(endpoint, RequestOptions::get()).await
    }

    /// Boards of the token's member
    pub async fn list_boards(&self) -> Result<Value, TrelloError> {
        self.get("/members/me/boards").await
    }

    /// Lists on a board
    pub async fn board_lists(&self, board_id: &str) -> Result<Value, TrelloError> {
        let board_id = path_id("board_id", board_id)?;
        self.get(&format!("/boards/{}/lists", board_id)).await
    }

    /// Recent actions on a board, newest first
    pub async fn board_actions(
        &self,
        board_id: &str,
        limit: Option<u32>,
    ) -> Result<Value, TrelloError> {
        let board_id = path_id("board_id", board_id)?;
        let options = RequestOptions::get().with_query(Query::new().set_opt("limit", limit));
        self.forward(&format!("/boards/{}/actions", board_id), options)
            .await
    }

    /// Cards in a list
    pub async fn list_cards(&self, list_id: &str) -> Result<Value, TrelloError> {
        let list_id = path_id("list_id", list_id)?;
        self.get(&format!("/lists/{}/cards", list_id)).await
    }

    /// A single card
    pub async fn card(&self, card_id: &str) -> Result<Value, TrelloError> {
        let card_id = path_id("card_id", card_id)?;
        self.get(&format!("/cards/{}", card_id)).await
    }

    /// Attachments of a card
    pub async fn card_attachments(&self, card_id: &str) -> Result<Value, TrelloError> {
        let card_id = path_id("card_id", card_id)?;
        self.get(&format!("/cards/{}/attachments", card_id)).await
    }

    /// Metadata of one attachment
    pub async fn card_attachment(
        &self,
        card_id: &str,
        attachment_id: &str,
    ) -> Result<Value, TrelloError> {
        let card_id = path_id("card_id", card_id)?;
        let attachment_id = path_id("attachment_id", attachment_id)?;
        self.get(&format!("/cards/{}/attachments/{}", card_id, attachment_id))
            .await
    }

    /// Create a card
    pub async fn create_card(&self, card: NewCard) -> Result<Value, TrelloError> {
        let options = card.into_options()?;
        self.forward("/cards", options).await
    }

    /// Update, move or archive a card
    pub async fn update_card(
        &self,
        card_id: &str,
        update: CardUpdate,
    ) -> Result<Value, TrelloError> {
        let card_id = path_id("card_id", card_id)?;
        let options = update.into_options()?;
        self.forward(&format!("/cards/{}", card_id), options).await
    }
}

/// Turn a failed response into `UpstreamError`, keeping the body best-effort
pub(crate) async fn upstream_error(response: reqwest::Response, target: &str) -> TrelloError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    warn!(status = status, target = %target, "Trello API returned error");

    TrelloError::UpstreamError { status, body }
}
