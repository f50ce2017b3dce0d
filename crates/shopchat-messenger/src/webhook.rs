// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messenger Platform webhook payloads.

use serde::Deserialize;
use shopchat_core::{Channel, InboundEvent, ShopchatError};

#[derive(Debug, Deserialize)]
struct Notification {
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    messaging: Vec<Messaging>,
}

#[derive(Debug, Deserialize)]
struct Messaging {
    sender: Party,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    postback: Option<Postback>,
}

#[derive(Debug, Deserialize)]
struct Party {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    mid: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    quick_reply: Option<QuickReply>,
    #[serde(default)]
    is_echo: bool,
}

#[derive(Debug, Deserialize)]
struct QuickReply {
    payload: String,
}

#[derive(Debug, Deserialize)]
struct Postback {
    #[serde(default)]
    mid: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    payload: Option<String>,
}

/// Normalize a Messenger webhook body.
///
/// Quick-reply taps yield their payload; postbacks yield their payload,
/// falling back to the button title. Echoes of page-sent messages, delivery
/// and read receipts produce no event.
pub fn parse_notification(raw: &serde_json::Value) -> Result<Option<InboundEvent>, ShopchatError> {
    let notification = Notification::deserialize(raw).map_err(|e| ShopchatError::Channel {
        message: format!("malformed Messenger webhook: {e}"),
        source: Some(Box::new(e)),
    })?;

    let Some(event) = notification
        .entry
        .into_iter()
        .next()
        .and_then(|entry| entry.messaging.into_iter().next())
    else {
        return Ok(None);
    };

    let (text, mid) = match (event.message, event.postback) {
        (Some(message), _) if message.is_echo => return Ok(None),
        (Some(message), _) => {
            let text = message
                .quick_reply
                .map(|q| q.payload)
                .or(message.text);
            (text, message.mid)
        }
        (None, Some(postback)) => (postback.payload.or(postback.title), postback.mid),
        (None, None) => return Ok(None),
    };

    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return Ok(None);
    };

    Ok(Some(InboundEvent {
        channel: Channel::Messenger,
        external_user_id: event.sender.id,
        display_name: String::new(),
        text,
        external_message_id: mid,
    }))
}
