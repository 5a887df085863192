use crate::config::Config;
use crate::mcp::format;
use crate::trello::{
    AttachmentOptions, CardPosition, CardUpdate, NewCard, TrelloClient, TrelloError,
};
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Parameters for listing the lists of a board
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct GetListsParams {
    #[serde(default, alias = "boardId")]
    #[schemars(description = "Board ID (defaults to TRELLO_BOARD_ID)")]
    pub board_id: Option<String>,
}

/// Parameters for listing the cards of a list
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetCardsParams {
    #[serde(alias = "listId")]
    #[schemars(description = "List ID")]
    pub list_id: String,
}

/// Parameters naming a single card
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CardParams {
    #[serde(alias = "cardId")]
    #[schemars(description = "Card ID")]
    pub card_id: String,
}

/// Parameters for creating a card
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateCardParams {
    #[serde(alias = "listId")]
    #[schemars(description = "ID of the list to add the card to")]
    pub list_id: String,
    #[schemars(description = "Card title")]
    pub name: String,
    #[serde(default, alias = "description")]
    #[schemars(description = "Card description (markdown)")]
    pub desc: Option<String>,
    #[serde(default)]
    #[schemars(description = "Position: \"top\", \"bottom\", or a number")]
    pub pos: Option<CardPosition>,
    #[serde(default)]
    #[schemars(description = "Due date (ISO 8601)")]
    pub due: Option<String>,
}

/// Parameters for updating a card
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateCardParams {
    #[serde(alias = "cardId")]
    #[schemars(description = "Card ID")]
    pub card_id: String,
    #[serde(default)]
    #[schemars(description = "New title")]
    pub name: Option<String>,
    #[serde(default, alias = "description")]
    #[schemars(description = "New description")]
    pub desc: Option<String>,
    #[serde(default)]
    #[schemars(description = "New due date (ISO 8601)")]
    pub due: Option<String>,
    #[serde(default)]
    #[schemars(description = "Archive (true) or restore (false) the card")]
    pub closed: Option<bool>,
}

/// Parameters for moving a card
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MoveCardParams {
    #[serde(alias = "cardId")]
    #[schemars(description = "Card ID")]
    pub card_id: String,
    #[serde(alias = "listId")]
    #[schemars(description = "Destination list ID")]
    pub list_id: String,
    #[serde(default)]
    #[schemars(
        description = "Position in the destination list: \"top\", \"bottom\", or a number"
    )]
    pub pos: Option<CardPosition>,
}

/// Parameters for board activity
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct BoardActivityParams {
    #[serde(default, alias = "boardId")]
    #[schemars(description = "Board ID (defaults to TRELLO_BOARD_ID)")]
    pub board_id: Option<String>,
    #[serde(default)]
    #[schemars(description = "Number of actions to return (1-1000, Trello default 50)")]
    pub limit: Option<u32>,
}

/// Parameters for downloading attachment content
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AttachmentContentParams {
    #[serde(alias = "cardId")]
    #[schemars(description = "Card ID")]
    pub card_id: String,
    #[serde(alias = "attachmentId")]
    #[schemars(description = "Attachment ID")]
    pub attachment_id: String,
    #[serde(default, alias = "includeDataUri")]
    #[schemars(description = "Also return a data: URI")]
    pub include_data_uri: Option<bool>,
    #[serde(default, alias = "includeMetadata")]
    #[schemars(description = "Also return the raw attachment metadata")]
    pub include_metadata: Option<bool>,
    #[serde(default, alias = "maxBytes")]
    #[schemars(description = "Refuse attachments larger than this many bytes (default 10 MiB)")]
    pub max_bytes: Option<usize>,
}

/// Summary plus full JSON, so nothing Trello returned is dropped
fn respond(summary: String, data: &Value) -> CallToolResult {
    let json = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
    CallToolResult::success(vec![Content::text(summary), Content::text(json)])
}

/// Tool failures are reported in the result, not as protocol errors
fn failure(tool_name: &str, err: &TrelloError) -> CallToolResult {
    warn!(tool_name = %tool_name, error = %err, "Tool call failed");
    CallToolResult::error(vec![Content::text(format!("Error: {}", err))])
}

fn finish<T, F>(tool_name: &str, result: Result<T, TrelloError>, render: F) -> CallToolResult
where
    F: FnOnce(T) -> CallToolResult,
{
    match result {
        Ok(value) => {
            info!(tool_name = %tool_name, "Tool call succeeded");
            render(value)
        }
        Err(e) => failure(tool_name, &e),
    }
}

/// MCP server for Trello
#[derive(Clone)]
pub struct TrelloMcpServer {
    trello: Arc<TrelloClient>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl TrelloMcpServer {
    /// Create a new MCP server
    pub fn new(config: &Config) -> Result<Self, TrelloError> {
        Ok(Self::with_client(TrelloClient::from_config(config)?))
    }

    /// Create a server around an existing client
    pub fn with_client(trello: TrelloClient) -> Self {
        Self {
            trello: Arc::new(trello),
            tool_router: Self::tool_router(),
        }
    }

    /// List all accessible boards
    #[tool(description = "List all Trello boards accessible with the configured credentials")]
    pub async fn get_boards(&self) -> Result<CallToolResult, McpError> {
        let result = self.trello.list_boards().await;
        Ok(finish("get_boards", result, |boards| {
            respond(format::boards(&boards), &boards)
        }))
    }

    #[tool(name = "listBoards", description = "Alias of get_boards")]
    pub async fn list_boards(&self) -> Result<CallToolResult, McpError> {
        self.get_boards().await
    }

    /// List the lists on a board
    #[tool(
        description = "List the lists on a Trello board (uses the default board when board_id is omitted)"
    )]
    pub async fn get_lists(
        &self,
        Parameters(params): Parameters<GetListsParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = match self.trello.resolve_board_id(params.board_id.as_deref()) {
            Ok(board_id) => self.trello.board_lists(&board_id).await,
            Err(e) => Err(e),
        };
        Ok(finish("get_lists", result, |lists| {
            respond(format::lists(&lists), &lists)
        }))
    }

    #[tool(name = "getBoardLists", description = "Alias of get_lists")]
    pub async fn get_board_lists(
        &self,
        params: Parameters<GetListsParams>,
    ) -> Result<CallToolResult, McpError> {
        self.get_lists(params).await
    }

    /// List the cards in a list
    #[tool(description = "List the cards in a Trello list")]
    pub async fn get_cards(
        &self,
        Parameters(params): Parameters<GetCardsParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.trello.list_cards(&params.list_id).await;
        Ok(finish("get_cards", result, |cards| {
            respond(format::cards(&cards), &cards)
        }))
    }

    #[tool(name = "getListCards", description = "Alias of get_cards")]
    pub async fn get_list_cards(
        &self,
        params: Parameters<GetCardsParams>,
    ) -> Result<CallToolResult, McpError> {
        self.get_cards(params).await
    }

    /// Get one card
    #[tool(name = "getCard", description = "Get the details of a Trello card")]
    pub async fn get_card(
        &self,
        Parameters(params): Parameters<CardParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.trello.card(&params.card_id).await;
        Ok(finish("getCard", result, |card| respond(format::card(&card), &card)))
    }

    /// List attachment metadata of a card
    #[tool(
        name = "getCardAttachments",
        description = "List the attachments of a Trello card (metadata only; use getAttachmentContent for the bytes)"
    )]
    pub async fn get_card_attachments(
        &self,
        Parameters(params): Parameters<CardParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.trello.card_attachments(&params.card_id).await;
        Ok(finish("getCardAttachments", result, |attachments| {
            respond(format::attachments(&attachments), &attachments)
        }))
    }

    /// Create a card
    #[tool(description = "Create a card in a Trello list")]
    pub async fn create_card(
        &self,
        Parameters(params): Parameters<CreateCardParams>,
    ) -> Result<CallToolResult, McpError> {
        let card = NewCard {
            list_id: params.list_id,
            name: params.name,
            desc: params.desc,
            pos: params.pos,
            due: params.due,
        };
        let result = self.trello.create_card(card).await;
        Ok(finish("create_card", result, |card| {
            respond(format::card_change("created", &card), &card)
        }))
    }

    #[tool(name = "createCard", description = "Alias of create_card")]
    pub async fn create_card_alias(
        &self,
        params: Parameters<CreateCardParams>,
    ) -> Result<CallToolResult, McpError> {
        self.create_card(params).await
    }

    /// Update card fields
    #[tool(
        description = "Update the name, description, due date or archived state of a Trello card"
    )]
    pub async fn update_card(
        &self,
        Parameters(params): Parameters<UpdateCardParams>,
    ) -> Result<CallToolResult, McpError> {
        let update = CardUpdate {
            name: params.name,
            desc: params.desc,
            due: params.due,
            closed: params.closed,
            ..CardUpdate::default()
        };
        let result = self.trello.update_card(&params.card_id, update).await;
        Ok(finish("update_card", result, |card| {
            respond(format::card_change("updated", &card), &card)
        }))
    }

    /// Move a card to another list
    #[tool(description = "Move a Trello card to another list, optionally at a position")]
    pub async fn move_card(
        &self,
        Parameters(params): Parameters<MoveCardParams>,
    ) -> Result<CallToolResult, McpError> {
        let update = CardUpdate::move_to(params.list_id, params.pos);
        let result = self.trello.update_card(&params.card_id, update).await;
        Ok(finish("move_card", result, |card| {
            respond(format::card_change("moved", &card), &card)
        }))
    }

    /// Archive a card
    #[tool(description = "Archive (close) a Trello card")]
    pub async fn archive_card(
        &self,
        Parameters(params): Parameters<CardParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .trello
            .update_card(&params.card_id, CardUpdate::archive())
            .await;
        Ok(finish("archive_card", result, |card| {
            respond(format::card_change("archived", &card), &card)
        }))
    }

    /// Recent activity on a board
    #[tool(
        description = "Get recent activity (actions) on a Trello board (uses the default board when board_id is omitted)"
    )]
    pub async fn get_board_activity(
        &self,
        Parameters(params): Parameters<BoardActivityParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = match (
            self.trello.resolve_board_id(params.board_id.as_deref()),
            params.limit,
        ) {
            (Err(e), _) => Err(e),
            (Ok(_), Some(limit)) if !(1..=1000).contains(&limit) => Err(TrelloError::Validation(
                format!("limit must be between 1 and 1000, got {}", limit),
            )),
            (Ok(board_id), limit) => self.trello.board_actions(&board_id, limit).await,
        };
        Ok(finish("get_board_activity", result, |actions| {
            respond(format::actions(&actions), &actions)
        }))
    }

    /// Download attachment bytes as base64
    #[tool(
        name = "getAttachmentContent",
        description = "Download a Trello card attachment and return it base64-encoded (images are also returned as image content)"
    )]
    pub async fn get_attachment_content(
        &self,
        Parameters(params): Parameters<AttachmentContentParams>,
    ) -> Result<CallToolResult, McpError> {
        let defaults = AttachmentOptions::default();
        let options = AttachmentOptions {
            include_data_uri: params.include_data_uri.unwrap_or(false),
            include_metadata: params.include_metadata.unwrap_or(false),
            max_bytes: params.max_bytes.unwrap_or(defaults.max_bytes),
        };

        let result = self
            .trello
            .attachment_content(&params.card_id, &params.attachment_id, &options)
            .await;

        Ok(finish("getAttachmentContent", result, |payload| {
            let json = serde_json::to_string_pretty(&payload).unwrap_or_default();
            let mut content = vec![
                Content::text(format::attachment_payload(&payload)),
                Content::text(json),
            ];
            if payload.is_image() {
                content.push(Content::image(payload.base64.clone(), payload.mime_type.clone()));
            }
            CallToolResult::success(content)
        }))
    }
}

#[tool_handler]
impl ServerHandler for TrelloMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Trello MCP Server - read boards, lists, cards, activity and attachments; create, update, move and archive cards"
                    .into(),
            ),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;

    fn test_server() -> TrelloMcpServer {
        let client = TrelloClient::new(Credentials::new("key", "token", None)).unwrap();
        TrelloMcpServer::with_client(client)
    }

    #[test]
    fn test_server_creation() {
        let config = Config::from_lookup(|_| None).unwrap();
        let server = TrelloMcpServer::new(&config);
        assert!(server.is_ok());
    }

    #[test]
    fn test_all_tools_registered() {
        let server = test_server();
        let names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();

        for expected in [
            "get_boards",
            "listBoards",
            "get_lists",
            "getBoardLists",
            "get_cards",
            "getListCards",
            "getCard",
            "getCardAttachments",
            "create_card",
            "createCard",
            "update_card",
            "move_card",
            "archive_card",
            "get_board_activity",
            "getAttachmentContent",
        ] {
            assert!(names.contains(&expected.to_string()), "missing tool {}", expected);
        }
    }

    #[test]
    fn test_create_card_params_accept_camel_case() {
        let params: CreateCardParams = serde_json::from_value(serde_json::json!({
            "listId": "L1",
            "name": "Fix bug",
            "pos": "top"
        }))
        .unwrap();

        assert_eq!(params.list_id, "L1");
        assert_eq!(params.pos, Some(CardPosition::top()));
        assert!(params.desc.is_none());
    }

    #[test]
    fn test_server_info_enables_tools() {
        let info = test_server().get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.instructions.is_some());
    }
}
