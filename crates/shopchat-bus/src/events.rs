// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event payloads pushed to dashboard subscribers.

use serde::{Deserialize, Serialize};
use shopchat_core::{ChatMessage, ChatSession};

/// One inbox mutation as seen by a dashboard.
///
/// Serializes as `{"event": "<kebab-name>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum InboxEvent {
    NewMessage(ChatMessage),
    MessagesRead {
        customer_id: i64,
        message_ids: Vec<i64>,
    },
    UnreadCount {
        total: i64,
    },
    SessionUpdate {
        session: ChatSession,
    },
}

impl InboxEvent {
    pub fn name(&self) -> &'static str {
        match self {
            InboxEvent::NewMessage(_) => "new-message",
            InboxEvent::MessagesRead { .. } => "messages-read",
            InboxEvent::UnreadCount { .. } => "unread-count",
            InboxEvent::SessionUpdate { .. } => "session-update",
        }
    }
}

/// An event stamped with a unique id and publish time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub id: String,
    pub at: String,
    #[serde(flatten)]
    pub event: InboxEvent,
}

impl Envelope {
    pub fn new(event: InboxEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            event,
        }
    }

    /// The JSON text frame sent over the dashboard socket.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, event = self.event.name(), "failed to serialize inbox event");
            String::new()
        })
    }
}
