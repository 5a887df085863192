//! Human-readable summaries of Trello JSON for MCP tool results
//!
//! Summaries only pick fields out; the tool result always carries the full
//! JSON next to the summary.

use crate::trello::AttachmentPayload;
use serde_json::Value;

fn field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn name_and_id(value: &Value) -> String {
    format!(
        "{} (ID: {})",
        field(value, "name").unwrap_or("(unnamed)"),
        field(value, "id").unwrap_or("?")
    )
}

fn closed_marker(value: &Value) -> &'static str {
    if value.get("closed").and_then(Value::as_bool) == Some(true) {
        " [archived]"
    } else {
        ""
    }
}

fn bullet_list<F>(value: &Value, noun: &str, line: F) -> String
where
    F: Fn(&Value) -> String,
{
    let Some(items) = value.as_array() else {
        return format!("Unexpected response shape for {}s", noun);
    };

    if items.is_empty() {
        return format!("No {}s found.", noun);
    }

    let lines = items
        .iter()
        .map(|item| format!("- {}", line(item)))
        .collect::<Vec<_>>()
        .join("\n");

    format!("Found {} {}(s):\n{}", items.len(), noun, lines)
}

pub fn boards(value: &Value) -> String {
    bullet_list(value, "board", |board| {
        let url = field(board, "url")
            .map(|u| format!(" - {}", u))
            .unwrap_or_default();
        format!("{}{}{}", name_and_id(board), closed_marker(board), url)
    })
}

pub fn lists(value: &Value) -> String {
    bullet_list(value, "list", |list| {
        format!("{}{}", name_and_id(list), closed_marker(list))
    })
}

pub fn cards(value: &Value) -> String {
    bullet_list(value, "card", |card| {
        let due = field(card, "due")
            .map(|d| format!(" due {}", d))
            .unwrap_or_default();
        let url = field(card, "url")
            .or_else(|| field(card, "shortUrl"))
            .map(|u| format!(" - {}", u))
            .unwrap_or_default();
        format!("{}{}{}{}", name_and_id(card), closed_marker(card), due, url)
    })
}

pub fn card(card: &Value) -> String {
    let mut lines = vec![format!("Card: {}{}", name_and_id(card), closed_marker(card))];

    if let Some(url) = field(card, "url") {
        lines.push(format!("URL: {}", url));
    }
    if let Some(list) = field(card, "idList") {
        lines.push(format!("List ID: {}", list));
    }
    if let Some(due) = field(card, "due") {
        lines.push(format!("Due: {}", due));
    }

    let labels: Vec<&str> = card
        .get("labels")
        .and_then(Value::as_array)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|l| field(l, "name").or_else(|| field(l, "color")))
                .collect()
        })
        .unwrap_or_default();
    if !labels.is_empty() {
        lines.push(format!("Labels: {}", labels.join(", ")));
    }

    if let Some(desc) = field(card, "desc") {
        lines.push(format!("Description:\n{}", desc));
    }

    lines.join("\n")
}

pub fn attachments(value: &Value) -> String {
    bullet_list(value, "attachment", |attachment| {
        let mime = field(attachment, "mimeType").unwrap_or("unknown type");
        let size = attachment
            .get("bytes")
            .and_then(Value::as_u64)
            .map(|b| format!(", {} bytes", b))
            .unwrap_or_default();
        let url = field(attachment, "url")
            .map(|u| format!(" - {}", u))
            .unwrap_or_default();
        format!("{} [{}{}]{}", name_and_id(attachment), mime, size, url)
    })
}

pub fn actions(value: &Value) -> String {
    bullet_list(value, "action", |action| {
        let date = field(action, "date").unwrap_or("?");
        let kind = field(action, "type").unwrap_or("unknown");
        let who = action
            .get("memberCreator")
            .and_then(|m| field(m, "fullName").or_else(|| field(m, "username")))
            .unwrap_or("someone");
        let data = action.get("data");
        let card = data
            .and_then(|d| d.get("card"))
            .and_then(|c| field(c, "name"))
            .map(|n| format!(" on card \"{}\"", n))
            .unwrap_or_default();
        let list = data
            .and_then(|d| d.get("list"))
            .and_then(|l| field(l, "name"))
            .map(|n| format!(" in list \"{}\"", n))
            .unwrap_or_default();
        format!("{} {} by {}{}{}", date, kind, who, card, list)
    })
}

/// One line for a card that was just created or changed
pub fn card_change(verb: &str, card: &Value) -> String {
    let url = field(card, "url")
        .map(|u| format!("\nURL: {}", u))
        .unwrap_or_default();
    format!("Card {}: {}{}", verb, name_and_id(card), url)
}

pub fn attachment_payload(payload: &AttachmentPayload) -> String {
    format!(
        "Attachment {} ({}, {} bytes) from {}",
        payload.file_name, payload.mime_type, payload.bytes, payload.url
    )
}
