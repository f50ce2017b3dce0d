// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by channel adapters, the store and the flow engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifier returned by a channel network for a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Storage,
    Commerce,
}

/// One of the external chat networks a customer converses through.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    Telegram,
    Whatsapp,
    Messenger,
}

impl Channel {
    /// Every supported network, in a stable order.
    pub const ALL: [Channel; 3] = [Channel::Telegram, Channel::Whatsapp, Channel::Messenger];

    /// Name of the customers column holding this network's external identity.
    pub fn identity_column(self) -> &'static str {
        match self {
            Channel::Telegram => "telegram_id",
            Channel::Whatsapp => "whatsapp_id",
            Channel::Messenger => "messenger_id",
        }
    }

    /// Human-readable network name used in generated display names.
    pub fn label(self) -> &'static str {
        match self {
            Channel::Telegram => "Telegram",
            Channel::Whatsapp => "WhatsApp",
            Channel::Messenger => "Messenger",
        }
    }
}

/// Which networks a flow listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChannelScope {
    All,
    Only(Channel),
}

impl ChannelScope {
    /// Whether a message arriving on `channel` is in scope.
    pub fn includes(self, channel: Channel) -> bool {
        match self {
            ChannelScope::All => true,
            ChannelScope::Only(c) => c == channel,
        }
    }
}

impl fmt::Display for ChannelScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelScope::All => write!(f, "all"),
            ChannelScope::Only(c) => write!(f, "{c}"),
        }
    }
}

impl FromStr for ChannelScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s == "all" {
            return Ok(ChannelScope::All);
        }
        Channel::from_str(&s)
            .map(ChannelScope::Only)
            .map_err(|_| format!("unknown channel scope `{s}`"))
    }
}

impl TryFrom<String> for ChannelScope {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChannelScope> for String {
    fn from(value: ChannelScope) -> Self {
        value.to_string()
    }
}

/// A normalized inbound text message, independent of the source network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub channel: Channel,
    pub external_user_id: String,
    /// May be empty when the network does not report a name.
    pub display_name: String,
    pub text: String,
    pub external_message_id: Option<String>,
}

/// A tappable reply option rendered by the channel as a native button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    /// Text sent back when pressed. Defaults to the label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl Button {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: None,
        }
    }

    /// The text this button produces when pressed.
    pub fn value(&self) -> &str {
        self.payload.as_deref().unwrap_or(&self.label)
    }
}

/// What a channel adapter is asked to deliver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Output of executing a flow node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedResponse {
    pub message: OutboundMessage,
    /// Raw payload attached by `api_call` nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl RenderedResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            message: OutboundMessage::text(text),
            payload: None,
        }
    }
}
