// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for chat networks (Telegram, WhatsApp, Messenger).

use async_trait::async_trait;

use crate::error::ShopchatError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Channel, DeliveryId, InboundEvent, OutboundMessage};

/// Translates one network's webhook payloads into [`InboundEvent`]s and
/// delivers [`OutboundMessage`]s back to it.
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// The network this adapter speaks.
    fn channel(&self) -> Channel;

    /// Whether credentials are present. Unconfigured adapters still parse
    /// webhooks but refuse to send.
    fn is_configured(&self) -> bool;

    /// Normalize a raw webhook body.
    ///
    /// Returns `Ok(None)` for payloads carrying no customer text (status
    /// callbacks, edits, joins). Malformed payloads are errors.
    fn receive(&self, raw: &serde_json::Value) -> Result<Option<InboundEvent>, ShopchatError>;

    /// Deliver a message to the user identified by `external_user_id`.
    async fn send(
        &self,
        external_user_id: &str,
        message: &OutboundMessage,
    ) -> Result<DeliveryId, ShopchatError>;
}
