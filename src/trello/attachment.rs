//! Attachment download with a single credential fallback, and the base64
//! payload handed to MCP clients.
//!
//! Trello serves some attachments from pre-signed URLs, which must be fetched
//! as-is: extra query parameters can invalidate the signature. Other
//! attachments need `key`/`token`. The download therefore starts
//! unauthenticated and adds credentials only after a 401/403.

use crate::trello::client::{
    append_auth, loggable, path_id, upstream_error, TrelloClient, TrelloError,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

/// Largest attachment turned into a base64 payload by default (10 MiB)
pub const DEFAULT_MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Which kind of request the download is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAttempt {
    /// Plain GET of the URL as given
    Unauthenticated,
    /// Retry with `key`/`token` appended
    Authenticated,
}

impl AuthAttempt {
    /// Next attempt after a failed response, `None` when the failure is final
    pub fn after_failure(self, status: u16) -> Option<AuthAttempt> {
        match (self, status) {
            (AuthAttempt::Unauthenticated, 401 | 403) => Some(AuthAttempt::Authenticated),
            _ => None,
        }
    }
}

/// What to include in an `AttachmentPayload`
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentOptions {
    pub include_data_uri: bool,
    pub include_metadata: bool,
    pub max_bytes: usize,
}

impl Default for AttachmentOptions {
    fn default() -> Self {
        Self {
            include_data_uri: false,
            include_metadata: false,
            max_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }
}

/// Attachment bytes plus what is known about them
#[derive(Debug, Clone)]
pub struct AttachmentContent {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
    pub url: String,
    pub metadata: Value,
}

impl AttachmentContent {
    pub fn into_payload(self, options: &AttachmentOptions) -> AttachmentPayload {
        let payload = AttachmentPayload::from_bytes(
            &self.data,
            self.mime_type,
            self.file_name,
            self.url,
            options.include_data_uri,
        );
        if options.include_metadata {
            payload.with_metadata(self.metadata)
        } else {
            payload
        }
    }
}

/// Base64 rendition of an attachment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentPayload {
    pub mime_type: String,
    /// Length of the decoded content
    pub bytes: usize,
    pub file_name: String,
    pub url: String,
    pub base64: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Value>,
}

impl AttachmentPayload {
    pub fn from_bytes(
        data: &[u8],
        mime_type: impl Into<String>,
        file_name: impl Into<String>,
        url: impl Into<String>,
        include_data_uri: bool,
    ) -> Self {
        let mime_type = mime_type.into();
        let base64 = STANDARD.encode(data);
        let data_uri = include_data_uri.then(|| format!("data:{};base64,{}", mime_type, base64));

        Self {
            mime_type,
            bytes: data.len(),
            file_name: file_name.into(),
            url: url.into(),
            base64,
            data_uri,
            attachment: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.attachment = Some(metadata);
        self
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.base64)
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn file_name_for(metadata: &Value, url: &Url) -> String {
    non_empty_str(metadata, "fileName")
        .or_else(|| non_empty_str(metadata, "name"))
        .map(str::to_string)
        .or_else(|| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "attachment".to_string())
}

fn header_mime_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn too_large(size: usize, max_bytes: usize) -> TrelloError {
    TrelloError::Validation(format!(
        "attachment of at least {} bytes exceeds the {} byte limit",
        size, max_bytes
    ))
}

/// Whether the host is Trello's own (`trello.com` or a subdomain)
fn is_trello_host(url: &Url) -> bool {
    url.host_str()
        .map(|host| host == "trello.com" || host.ends_with(".trello.com"))
        .unwrap_or(false)
}

impl TrelloClient {
    /// Download attachment content, adding credentials only after a 401/403
    ///
    /// At most two round trips. Returns the successful response unread.
    pub async fn download_attachment(&self, url: &str) -> Result<reqwest::Response, TrelloError> {
        self.credentials().ensure()?;

        let original =
            Url::parse(url).map_err(|e| TrelloError::InvalidUrl(format!("{}: {}", e, url)))?;
        let mut attempt = AuthAttempt::Unauthenticated;

        loop {
            let mut target = original.clone();
            if attempt == AuthAttempt::Authenticated {
                append_auth(&mut target, self.credentials());
            }

            debug!(attempt = ?attempt, url = %loggable(&target), "Downloading attachment");
            let response = self.http().get(target).send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            match attempt.after_failure(status.as_u16()) {
                Some(next) => {
                    if !is_trello_host(&original) {
                        warn!(
                            host = original.host_str().unwrap_or(""),
                            "Sending Trello credentials to a non-Trello attachment host"
                        );
                    }
                    info!(
                        status = status.as_u16(),
                        "Attachment download refused, retrying with credentials"
                    );
                    attempt = next;
                }
                None => return Err(upstream_error(response, &loggable(&original)).await),
            }
        }
    }

    /// Fetch attachment metadata, then its content through the fallback
    ///
    /// With `max_bytes` set, larger content fails with a validation error.
    pub async fn fetch_attachment(
        &self,
        card_id: &str,
        attachment_id: &str,
        max_bytes: Option<usize>,
    ) -> Result<AttachmentContent, TrelloError> {
        path_id("card_id", card_id)?;
        path_id("attachment_id", attachment_id)?;

        let metadata = self.card_attachment(card_id, attachment_id).await?;
        let url = non_empty_str(&metadata, "url")
            .ok_or_else(|| {
                TrelloError::Validation(format!(
                    "attachment {} has no downloadable url",
                    attachment_id
                ))
            })?
            .to_string();

        let mut response = self.download_attachment(&url).await?;

        if let (Some(max), Some(len)) = (max_bytes, response.content_length()) {
            if len > max as u64 {
                return Err(too_large(len as usize, max));
            }
        }

        let header_mime = header_mime_type(&response);
        let final_url = response.url().clone();

        // Chunked bodies carry no length up front, so the limit is checked per chunk
        let mut data = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            data.extend_from_slice(&chunk);
            if let Some(max) = max_bytes {
                if data.len() > max {
                    return Err(too_large(data.len(), max));
                }
            }
        }

        let mime_type = non_empty_str(&metadata, "mimeType")
            .map(str::to_string)
            .or(header_mime)
            .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string());
        let file_name = file_name_for(&metadata, &final_url);

        debug!(
            attachment_id = %attachment_id,
            bytes = data.len(),
            mime_type = %mime_type,
            "Attachment downloaded"
        );

        Ok(AttachmentContent {
            data,
            mime_type,
            file_name,
            url,
            metadata,
        })
    }

    /// Attachment content as a base64 payload
    pub async fn attachment_content(
        &self,
        card_id: &str,
        attachment_id: &str,
        options: &AttachmentOptions,
    ) -> Result<AttachmentPayload, TrelloError> {
        let content = self
            .fetch_attachment(card_id, attachment_id, Some(options.max_bytes))
            .await?;
        Ok(content.into_payload(options))
    }
}
