// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Customers, the persisted chat log and per-customer session summaries.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::types::Channel;

/// A shopper, unified across networks. Each external id maps to at most one
/// customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub telegram_id: Option<String>,
    pub whatsapp_id: Option<String>,
    pub messenger_id: Option<String>,
    pub name: String,
    pub created_at: String,
}

impl Customer {
    /// External identity on `channel`, if linked.
    pub fn external_id(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::Telegram => self.telegram_id.as_deref(),
            Channel::Whatsapp => self.whatsapp_id.as_deref(),
            Channel::Messenger => self.messenger_id.as_deref(),
        }
    }
}

/// Name given to a customer first seen without a display name.
pub fn fallback_display_name(channel: Channel, external_id: &str) -> String {
    let chars: Vec<char> = external_id.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{} User {tail}", channel.label())
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SenderKind {
    Customer,
    Admin,
}

/// One entry in the chat log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub customer_id: i64,
    pub sender: SenderKind,
    pub text: String,
    pub channel: Channel,
    pub external_message_id: Option<String>,
    pub is_read: bool,
    pub read_at: Option<String>,
    /// Delivery outcome, buttons and image sent with outbound messages.
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
}

/// Per-customer conversation summary shown in the operator inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: i64,
    pub customer_id: i64,
    pub customer_name: String,
    /// Network of the most recent customer message.
    pub channel: Channel,
    pub last_message_at: String,
    /// Count of unread customer-sent messages.
    pub unread_count: i64,
    pub is_active: bool,
    pub created_at: String,
}

/// A message to append to the log.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub customer_id: i64,
    pub text: String,
    pub channel: Channel,
    pub external_message_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Result of appending a message: the row, the touched session and the
/// unread total across active sessions, all read in one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub message: ChatMessage,
    pub session: ChatSession,
    pub unread_total: i64,
}

/// Result of marking a customer's messages read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub customer_id: i64,
    /// Ids flipped by this call; empty when nothing was unread.
    pub message_ids: Vec<i64>,
    pub session: Option<ChatSession>,
    pub unread_total: i64,
}

/// Catalog row as surfaced to customers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub stock: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub id: i64,
    pub order_number: String,
    pub status: String,
    pub total: f64,
    pub created_at: String,
}
