use crate::trello::{CardPosition, NewCard, TrelloClient, TrelloError};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    trello: Arc<TrelloClient>,
}

/// Error body returned by every route: `{"error": "..."}`
///
/// Validation problems answer 400; everything else answers 500 with the
/// upstream status folded into the message.
#[derive(Debug)]
pub struct ApiError(pub TrelloError);

impl From<TrelloError> for ApiError {
    fn from(err: TrelloError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_validation() {
            warn!(error = %self.0, "Rejected invalid request");
            StatusCode::BAD_REQUEST
        } else {
            error!(error = %self.0, "Request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Body of `POST /cards`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCardBody {
    pub list_id: String,
    pub name: String,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub pos: Option<CardPosition>,
}

impl CreateCardBody {
    fn into_new_card(self) -> Result<NewCard, TrelloError> {
        if self.list_id.trim().is_empty() {
            return Err(TrelloError::Validation("listId cannot be empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(TrelloError::Validation("name cannot be empty".to_string()));
        }
        if let Some(pos) = &self.pos {
            pos.validate()?;
        }

        Ok(NewCard {
            list_id: self.list_id,
            name: self.name,
            desc: self.desc,
            pos: self.pos,
            due: None,
        })
    }
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn list_boards(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(state.trello.list_boards().await?))
}

async fn board_lists(
    State(state): State<AppState>,
    Path(board_id): Path<String>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.trello.board_lists(&board_id).await?))
}

async fn list_cards(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.trello.list_cards(&list_id).await?))
}

async fn get_card(
    State(state): State<AppState>,
    Path(card_id): Path<String>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.trello.card(&card_id).await?))
}

async fn card_attachments(
    State(state): State<AppState>,
    Path(card_id): Path<String>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.trello.card_attachments(&card_id).await?))
}

/// Header-safe file name for Content-Disposition
fn disposition_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Response headers for raw attachment bytes
///
/// The MIME type comes from Trello metadata or the upstream response, so a
/// value that is not a legal header falls back to `application/octet-stream`.
fn content_headers(
    mime_type: &str,
    file_name: &str,
    len: usize,
) -> [(HeaderName, HeaderValue); 3] {
    let content_type = HeaderValue::from_str(mime_type).unwrap_or_else(|_| {
        warn!(mime_type = %mime_type.escape_debug(), "Unusable attachment MIME type");
        HeaderValue::from_static("application/octet-stream")
    });
    let disposition = HeaderValue::from_str(&format!(
        "inline; filename=\"{}\"",
        disposition_file_name(file_name)
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("inline"));

    [
        (header::CONTENT_TYPE, content_type),
        (header::CONTENT_LENGTH, HeaderValue::from(len)),
        (header::CONTENT_DISPOSITION, disposition),
    ]
}

async fn attachment_content(
    State(state): State<AppState>,
    Path((card_id, attachment_id)): Path<(String, String)>,
) -> ApiResult<Response> {
    let content = state
        .trello
        .fetch_attachment(&card_id, &attachment_id, None)
        .await?;

    info!(
        card_id = %card_id,
        attachment_id = %attachment_id,
        bytes = content.data.len(),
        "Serving attachment content"
    );

    let headers = content_headers(&content.mime_type, &content.file_name, content.data.len());

    Ok((headers, content.data).into_response())
}

async fn create_card(
    State(state): State<AppState>,
    body: Result<Json<CreateCardBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body.map_err(|rejection| TrelloError::Validation(rejection.body_text()))?;
    let card = body.into_new_card()?;
    Ok(Json(state.trello.create_card(card).await?))
}

/// Create and configure the HTTP server
pub fn create_app(trello: Arc<TrelloClient>) -> Router {
    let state = AppState { trello };

    Router::new()
        .route("/health", get(health_check))
        .route("/boards", get(list_boards))
        .route("/boards/:boardId/lists", get(board_lists))
        .route("/lists/:listId/cards", get(list_cards))
        .route("/cards", post(create_card))
        .route("/cards/:cardId", get(get_card))
        .route("/cards/:cardId/attachments", get(card_attachments))
        .route(
            "/cards/:cardId/attachments/:attachmentId/content",
            get(attachment_content),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP server until Ctrl-C
pub async fn run_server(port: u16, trello: Arc<TrelloClient>) -> std::io::Result<()> {
    let app = create_app(trello);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Trello HTTP proxy listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down HTTP server");
        })
        .await
}
