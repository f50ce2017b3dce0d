// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook update parsing.
//!
//! Private-chat text messages and inline-keyboard presses become
//! [`InboundEvent`]s; everything else is ignored.

use shopchat_core::{Channel, InboundEvent, ShopchatError};
use teloxide::types::{CallbackQuery, Message, Update, UpdateKind, User};
use tracing::debug;

/// Normalize one webhook body.
pub fn parse_update(raw: &serde_json::Value) -> Result<Option<InboundEvent>, ShopchatError> {
    let update: Update = serde_json::from_value(raw.clone()).map_err(|e| ShopchatError::Channel {
        message: format!("malformed Telegram update: {e}"),
        source: Some(Box::new(e)),
    })?;

    match update.kind {
        UpdateKind::Message(msg) => Ok(from_message(&msg)),
        UpdateKind::CallbackQuery(query) => Ok(from_callback(&query)),
        _ => {
            debug!(update_id = update.id.0, "ignoring non-message update");
            Ok(None)
        }
    }
}

/// Only private chats are conversations with a customer.
pub fn is_dm(msg: &Message) -> bool {
    msg.chat.is_private()
}

fn display_name(user: Option<&User>) -> String {
    user.map(|u| u.full_name()).unwrap_or_default()
}

fn from_message(msg: &Message) -> Option<InboundEvent> {
    if !is_dm(msg) {
        debug!(chat_id = msg.chat.id.0, "ignoring non-DM message");
        return None;
    }
    let Some(text) = msg.text().or_else(|| msg.caption()) else {
        debug!(msg_id = msg.id.0, "ignoring message without text");
        return None;
    };
    Some(InboundEvent {
        channel: Channel::Telegram,
        external_user_id: msg.chat.id.0.to_string(),
        display_name: display_name(msg.from.as_ref()),
        text: text.to_string(),
        external_message_id: Some(msg.id.0.to_string()),
    })
}

/// A button press arrives as the button's callback data.
fn from_callback(query: &CallbackQuery) -> Option<InboundEvent> {
    let data = query.data.as_deref()?;
    Some(InboundEvent {
        channel: Channel::Telegram,
        external_user_id: query.from.id.0.to_string(),
        display_name: display_name(Some(&query.from)),
        text: data.to_string(),
        external_message_id: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn private_message(text: &str) -> serde_json::Value {
        json!({
            "update_id": 100,
            "message": {
                "message_id": 7,
                "date": 1_700_000_000,
                "chat": {"id": 5551, "type": "private", "first_name": "Kim", "last_name": "Lee"},
                "from": {"id": 5551, "is_bot": false, "first_name": "Kim", "last_name": "Lee"},
                "text": text
            }
        })
    }

    #[test]
    fn private_text_becomes_event() {
        let event = parse_update(&private_message("/start")).unwrap().unwrap();
        assert_eq!(event.channel, Channel::Telegram);
        assert_eq!(event.external_user_id, "5551");
        assert_eq!(event.display_name, "Kim Lee");
        assert_eq!(event.text, "/start");
        assert_eq!(event.external_message_id.as_deref(), Some("7"));
    }

    #[test]
    fn group_messages_are_ignored() {
        let raw = json!({
            "update_id": 101,
            "message": {
                "message_id": 8,
                "date": 1_700_000_000,
                "chat": {"id": -100, "type": "group", "title": "Shop fans"},
                "from": {"id": 5551, "is_bot": false, "first_name": "Kim"},
                "text": "hello all"
            }
        });
        assert!(parse_update(&raw).unwrap().is_none());
    }

    #[test]
    fn button_press_uses_callback_data() {
        let raw = json!({
            "update_id": 102,
            "callback_query": {
                "id": "cb-1",
                "from": {"id": 5551, "is_bot": false, "first_name": "Kim"},
                "chat_instance": "42",
                "data": "1"
            }
        });
        let event = parse_update(&raw).unwrap().unwrap();
        assert_eq!(event.text, "1");
        assert_eq!(event.external_user_id, "5551");
        assert!(event.external_message_id.is_none());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_update(&json!({"hello": "world"})).is_err());
    }
}
