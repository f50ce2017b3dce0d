// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cloud API webhook payloads.
//!
//! Only the first message of the first change is read; status callbacks
//! and unsupported message types produce no event.

use serde::Deserialize;
use shopchat_core::{Channel, InboundEvent, ShopchatError};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Notification {
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
struct Change {
    value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
struct ChangeValue {
    #[serde(default)]
    contacts: Vec<Contact>,
    #[serde(default)]
    messages: Vec<WaMessage>,
}

#[derive(Debug, Deserialize)]
struct Contact {
    #[serde(default)]
    profile: Option<Profile>,
    #[serde(default)]
    wa_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Profile {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct WaMessage {
    from: String,
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<TextBody>,
    #[serde(default)]
    interactive: Option<Interactive>,
    #[serde(default)]
    button: Option<TemplateButton>,
}

#[derive(Debug, Deserialize)]
struct TextBody {
    body: String,
}

#[derive(Debug, Deserialize)]
struct Interactive {
    #[serde(default)]
    button_reply: Option<Reply>,
    #[serde(default)]
    list_reply: Option<Reply>,
}

#[derive(Debug, Deserialize)]
struct Reply {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TemplateButton {
    #[serde(default)]
    payload: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl WaMessage {
    fn text(&self) -> Option<String> {
        match self.kind.as_str() {
            "text" => self.text.as_ref().map(|t| t.body.clone()),
            "interactive" => self
                .interactive
                .as_ref()
                .and_then(|i| i.button_reply.as_ref().or(i.list_reply.as_ref()))
                .map(|r| r.id.clone()),
            "button" => self
                .button
                .as_ref()
                .and_then(|b| b.payload.clone().or_else(|| b.text.clone())),
            _ => None,
        }
    }
}

pub fn parse_notification(raw: &serde_json::Value) -> Result<Option<InboundEvent>, ShopchatError> {
    let notification: Notification =
        serde_json::from_value(raw.clone()).map_err(|e| ShopchatError::Channel {
            message: format!("malformed WhatsApp webhook: {e}"),
            source: Some(Box::new(e)),
        })?;

    let Some(value) = notification
        .entry
        .into_iter()
        .next()
        .and_then(|e| e.changes.into_iter().next())
        .map(|c| c.value)
    else {
        return Ok(None);
    };
    let Some(message) = value.messages.first() else {
        debug!("ignoring WhatsApp notification without messages");
        return Ok(None);
    };
    let Some(text) = message.text() else {
        debug!(kind = message.kind.as_str(), "ignoring unsupported WhatsApp message type");
        return Ok(None);
    };

    let display_name = value
        .contacts
        .iter()
        .find(|c| c.wa_id.as_deref().is_none_or(|id| id == message.from))
        .and_then(|c| c.profile.as_ref())
        .map(|p| p.name.clone())
        .unwrap_or_default();

    Ok(Some(InboundEvent {
        channel: Channel::Whatsapp,
        external_user_id: message.from.clone(),
        display_name,
        text,
        external_message_id: Some(message.id.clone()),
    }))
}
