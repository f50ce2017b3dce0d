// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter for deterministic testing.
//!
//! `MockChannel` stands in for one network. It parses a minimal webhook
//! shape (`{"from", "name", "text", "id"}`) and captures outbound messages
//! for assertion in tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use shopchat_core::{
    AdapterType, Channel, ChannelAdapter, DeliveryId, HealthStatus, InboundEvent,
    OutboundMessage, PluginAdapter, ShopchatError,
};

/// A mock messaging channel for testing.
pub struct MockChannel {
    channel: Channel,
    configured: bool,
    failure: Option<String>,
    sent: Arc<Mutex<Vec<(String, OutboundMessage)>>>,
    next_id: AtomicU64,
}

impl MockChannel {
    /// A configured channel whose sends succeed with ids `mock-1`, `mock-2`, ...
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            configured: true,
            failure: None,
            sent: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// A channel without credentials: it parses webhooks but refuses to send.
    pub fn unconfigured(channel: Channel) -> Self {
        Self {
            configured: false,
            ..Self::new(channel)
        }
    }

    /// A configured channel whose every send is rejected with `reason`.
    pub fn failing(channel: Channel, reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::new(channel)
        }
    }

    /// Recipient and message of every successful send, in order.
    pub async fn sent(&self) -> Vec<(String, OutboundMessage)> {
        self.sent.lock().await.clone()
    }

    /// Texts of every successful send, in order.
    pub async fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .map(|(_, m)| m.text.clone())
            .collect()
    }

    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, ShopchatError> {
        if !self.configured {
            return Ok(HealthStatus::Degraded("not configured".into()));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ShopchatError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn receive(&self, raw: &Value) -> Result<Option<InboundEvent>, ShopchatError> {
        let from = raw
            .get("from")
            .and_then(Value::as_str)
            .ok_or_else(|| ShopchatError::channel("mock webhook without `from`"))?;
        let Some(text) = raw.get("text").and_then(Value::as_str) else {
            return Ok(None);
        };
        Ok(Some(InboundEvent {
            channel: self.channel,
            external_user_id: from.to_string(),
            display_name: raw
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            text: text.to_string(),
            external_message_id: raw.get("id").and_then(Value::as_str).map(str::to_string),
        }))
    }

    async fn send(
        &self,
        external_user_id: &str,
        message: &OutboundMessage,
    ) -> Result<DeliveryId, ShopchatError> {
        if !self.configured {
            return Err(ShopchatError::channel(format!("{} is not configured", self.channel)));
        }
        if let Some(reason) = &self.failure {
            return Err(ShopchatError::channel(reason.clone()));
        }
        self.sent
            .lock()
            .await
            .push((external_user_id.to_string(), message.clone()));
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(DeliveryId(format!("mock-{n}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn receive_parses_minimal_shape() {
        let channel = MockChannel::new(Channel::Whatsapp);
        let event = channel
            .receive(&json!({"from": "1555", "name": "Ana", "text": "hi", "id": "x1"}))
            .unwrap()
            .unwrap();
        assert_eq!(event.channel, Channel::Whatsapp);
        assert_eq!(event.external_user_id, "1555");
        assert_eq!(event.display_name, "Ana");
        assert_eq!(event.external_message_id.as_deref(), Some("x1"));

        assert!(channel.receive(&json!({"from": "1555"})).unwrap().is_none());
        assert!(channel.receive(&json!({"text": "hi"})).is_err());
    }

    #[tokio::test]
    async fn send_captures_outbound_messages() {
        let channel = MockChannel::new(Channel::Telegram);
        let first = channel.send("7", &OutboundMessage::text("one")).await.unwrap();
        let second = channel.send("7", &OutboundMessage::text("two")).await.unwrap();
        assert_eq!(first, DeliveryId("mock-1".into()));
        assert_eq!(second, DeliveryId("mock-2".into()));
        assert_eq!(channel.sent_texts().await, ["one", "two"]);

        channel.clear_sent().await;
        assert!(channel.sent().await.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_and_failing_refuse() {
        let off = MockChannel::unconfigured(Channel::Messenger);
        assert!(!off.is_configured());
        assert!(off.send("1", &OutboundMessage::text("x")).await.is_err());

        let broken = MockChannel::failing(Channel::Messenger, "rate limited");
        let err = broken.send("1", &OutboundMessage::text("x")).await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));
        assert!(broken.sent().await.is_empty());
    }
}
