//! Builders for Trello card mutations
//!
//! Each builder turns into the `RequestOptions` of a single forwarded call.
//! Optional fields that were never set are left out of the query entirely.
use crate::trello::client::{TrelloClient, TrelloError};
use crate::trello::types::{Query, QueryValue, RequestOptions};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Card position: `"top"`, `"bottom"`, any finite number, or another
/// non-empty string passed through to Trello
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CardPosition {
    Index(f64),
    Named(String),
}

impl CardPosition {
    pub fn top() -> Self {
        CardPosition::Named("top".to_string())
    }

    pub fn bottom() -> Self {
        CardPosition::Named("bottom".to_string())
    }

    pub fn validate(&self) -> Result<(), TrelloError> {
        match self {
            CardPosition::Named(name) if name.trim().is_empty() => Err(TrelloError::Validation(
                "pos must be \"top\", \"bottom\", a number, or a non-empty string".to_string(),
            )),
            CardPosition::Index(n) if !n.is_finite() => Err(TrelloError::Validation(
                "pos must be a finite number".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl From<&CardPosition> for QueryValue {
    fn from(pos: &CardPosition) -> Self {
        match pos {
            CardPosition::Index(n) => QueryValue::Float(*n),
            CardPosition::Named(name) => QueryValue::Text(name.clone()),
        }
    }
}

fn required(field: &str, value: &str) -> Result<(), TrelloError> {
    if value.trim().is_empty() {
        return Err(TrelloError::Validation(format!("{} cannot be empty", field)));
    }
    Ok(())
}

/// Builder for creating a card
///
/// # Example
/// ```no_run
/// # use trello_mcp_server::trello::{NewCard, CardPosition, TrelloClient};
/// # async fn example(client: &TrelloClient) -> Result<(), Box<dyn std::error::Error>> {
/// let card = NewCard::new("list-id", "Fix bug")
///     .desc("Crashes on empty input")
///     .pos(CardPosition::top())
///     .create(client)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewCard {
    pub list_id: String,
    pub name: String,
    pub desc: Option<String>,
    pub pos: Option<CardPosition>,
    pub due: Option<String>,
}

impl NewCard {
    pub fn new(list_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            list_id: list_id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn pos(mut self, pos: CardPosition) -> Self {
        self.pos = Some(pos);
        self
    }

    /// Due date in any format Trello parses (ISO 8601 recommended)
    pub fn due(mut self, due: impl Into<String>) -> Self {
        self.due = Some(due.into());
        self
    }

    /// `POST /cards` with everything in the query string
    pub fn into_options(self) -> Result<RequestOptions, TrelloError> {
        required("list_id", &self.list_id)?;
        required("name", &self.name)?;
        if let Some(pos) = &self.pos {
            pos.validate()?;
        }

        let query = Query::new()
            .set("idList", self.list_id)
            .set("name", self.name)
            .set_opt("desc", self.desc)
            .set_opt("pos", self.pos.as_ref())
            .set_opt("due", self.due);

        Ok(RequestOptions::post().with_query(query))
    }

    /// Build and create the card
    pub async fn create(self, client: &TrelloClient) -> Result<Value, TrelloError> {
        client.create_card(self).await
    }
}

/// Builder for updating, moving or archiving a card
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardUpdate {
    pub name: Option<String>,
    pub desc: Option<String>,
    pub due: Option<String>,
    pub closed: Option<bool>,
    pub id_list: Option<String>,
    pub pos: Option<CardPosition>,
}

impl CardUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to another list, optionally at a position
    pub fn move_to(list_id: impl Into<String>, pos: Option<CardPosition>) -> Self {
        Self {
            id_list: Some(list_id.into()),
            pos,
            ..Self::default()
        }
    }

    /// Archive (`closed=true`)
    pub fn archive() -> Self {
        Self {
            closed: Some(true),
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn due(mut self, due: impl Into<String>) -> Self {
        self.due = Some(due.into());
        self
    }

    pub fn closed(mut self, closed: bool) -> Self {
        self.closed = Some(closed);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.desc.is_none()
            && self.due.is_none()
            && self.closed.is_none()
            && self.id_list.is_none()
            && self.pos.is_none()
    }

    /// `PUT /cards/{id}` with the changed fields in the query string
    pub fn into_options(self) -> Result<RequestOptions, TrelloError> {
        if self.is_empty() {
            return Err(TrelloError::Validation(
                "at least one field to update is required".to_string(),
            ));
        }
        if let Some(name) = &self.name {
            required("name", name)?;
        }
        if let Some(list_id) = &self.id_list {
            required("list_id", list_id)?;
        }
        if let Some(pos) = &self.pos {
            pos.validate()?;
        }

        let query = Query::new()
            .set_opt("name", self.name)
            .set_opt("desc", self.desc)
            .set_opt("due", self.due)
            .set_opt("closed", self.closed)
            .set_opt("idList", self.id_list)
            .set_opt("pos", self.pos.as_ref());

        Ok(RequestOptions::put().with_query(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trello::types::Method;

    fn sent(options: &RequestOptions) -> Vec<(String, String)> {
        options
            .query
            .present()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_minimal_new_card() {
        let options = NewCard::new("L1", "Fix bug").into_options().unwrap();

        assert_eq!(options.method, Method::Post);
        assert_eq!(
            sent(&options),
            vec![
                ("idList".to_string(), "L1".to_string()),
                ("name".to_string(), "Fix bug".to_string()),
            ]
        );
        assert!(options.body.is_none());
    }

    #[test]
    fn test_new_card_with_optional_fields() {
        let options = NewCard::new("L1", "Fix bug")
            .desc("details")
            .pos(CardPosition::Index(65536.0))
            .into_options()
            .unwrap();

        let query = sent(&options);
        assert!(query.contains(&("desc".to_string(), "details".to_string())));
        assert!(query.contains(&("pos".to_string(), "65536".to_string())));
    }

    #[test]
    fn test_new_card_requires_name() {
        let err = NewCard::new("L1", "  ").into_options().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_empty_named_position_rejected() {
        let err = NewCard::new("L1", "x")
            .pos(CardPosition::Named(String::new()))
            .into_options()
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_any_finite_index_position_accepted() {
        assert!(CardPosition::Index(-4.0).validate().is_ok());
        assert!(CardPosition::Index(0.0).validate().is_ok());
        assert!(CardPosition::Index(f64::NAN).validate().unwrap_err().is_validation());
        assert!(CardPosition::Index(f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_position_deserialization() {
        let top: CardPosition = serde_json::from_str("\"top\"").unwrap();
        assert_eq!(top, CardPosition::top());

        let index: CardPosition = serde_json::from_str("12.5").unwrap();
        assert_eq!(index, CardPosition::Index(12.5));
    }

    #[test]
    fn test_move_card_update() {
        let options = CardUpdate::move_to("L2", Some(CardPosition::bottom()))
            .into_options()
            .unwrap();

        assert_eq!(options.method, Method::Put);
        let query = sent(&options);
        assert!(query.contains(&("idList".to_string(), "L2".to_string())));
        assert!(query.contains(&("pos".to_string(), "bottom".to_string())));
        assert_eq!(query.len(), 2);
    }

    #[test]
    fn test_archive_update() {
        let options = CardUpdate::archive().into_options().unwrap();
        assert_eq!(sent(&options), vec![("closed".to_string(), "true".to_string())]);
    }

    #[test]
    fn test_empty_update_rejected() {
        let err = CardUpdate::new().into_options().unwrap_err();
        assert!(err.is_validation());
    }
}
