// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Facebook Messenger channel adapter for shopchat.
//!
//! Replies go to the Send API at `POST {api_url}/me/messages` with the page
//! access token as a query parameter.

pub mod webhook;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use shopchat_config::model::MessengerConfig;
use shopchat_core::{
    AdapterType, Channel, ChannelAdapter, DeliveryId, HealthStatus, InboundEvent,
    OutboundMessage, PluginAdapter, ShopchatError,
};
use tracing::{debug, warn};

/// Quick replies the Send API accepts per message.
const MAX_QUICK_REPLIES: usize = 13;
/// Longest quick-reply title the Send API accepts.
const MAX_QUICK_REPLY_TITLE: usize = 20;

pub struct MessengerChannel {
    client: Client,
    api_url: String,
    page_access_token: Option<String>,
    send_timeout: Duration,
}

impl MessengerChannel {
    pub fn new(config: &MessengerConfig) -> Result<Self, ShopchatError> {
        let send_timeout = Duration::from_secs(config.send_timeout_secs.max(1));
        let client = Client::builder()
            .timeout(send_timeout)
            .build()
            .map_err(|e| ShopchatError::Channel {
                message: format!("failed to build Messenger HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        let page_access_token = config
            .page_access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        if page_access_token.is_none() {
            warn!("messenger.page_access_token not set, Messenger replies are disabled");
        }

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            page_access_token,
            send_timeout,
        })
    }
}

/// Build the Send API request bodies for `message`.
///
/// An image is sent as its own attachment message ahead of the text, since
/// the Send API does not accept text and an attachment together.
pub fn request_bodies(psid: &str, message: &OutboundMessage) -> Vec<Value> {
    let mut bodies = Vec::with_capacity(2);
    if let Some(url) = &message.image_url {
        bodies.push(json!({
            "recipient": {"id": psid},
            "messaging_type": "RESPONSE",
            "message": {
                "attachment": {"type": "image", "payload": {"url": url, "is_reusable": true}}
            }
        }));
    }

    let mut body = json!({
        "recipient": {"id": psid},
        "messaging_type": "RESPONSE",
        "message": {"text": message.text},
    });
    if !message.buttons.is_empty() {
        let replies: Vec<Value> = message
            .buttons
            .iter()
            .take(MAX_QUICK_REPLIES)
            .map(|b| {
                json!({
                    "content_type": "text",
                    "title": b.label.chars().take(MAX_QUICK_REPLY_TITLE).collect::<String>(),
                    "payload": b.value(),
                })
            })
            .collect();
        body["message"]["quick_replies"] = Value::Array(replies);
    }
    bodies.push(body);
    bodies
}

impl MessengerChannel {
    async fn post(&self, token: &str, body: &Value) -> Result<DeliveryId, ShopchatError> {
        let mut url = reqwest::Url::parse(&format!("{}/me/messages", self.api_url)).map_err(|e| {
            ShopchatError::Channel {
                message: format!("invalid Messenger api_url: {e}"),
                source: Some(Box::new(e)),
            }
        })?;
        url.query_pairs_mut().append_pair("access_token", token);

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ShopchatError::Channel {
                message: format!("Messenger request failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ShopchatError::channel(format!(
                "Messenger API returned {status}: {text}"
            )));
        }
        let parsed: Value = serde_json::from_str(&text).map_err(|e| ShopchatError::Channel {
            message: format!("failed to parse Messenger response: {e}"),
            source: Some(Box::new(e)),
        })?;
        parsed["message_id"]
            .as_str()
            .map(|id| DeliveryId(id.to_string()))
            .ok_or_else(|| ShopchatError::channel("Messenger response carried no message_id"))
    }
}

#[async_trait]
impl PluginAdapter for MessengerChannel {
    fn name(&self) -> &str {
        "messenger"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, ShopchatError> {
        if self.page_access_token.is_none() {
            return Ok(HealthStatus::Degraded("page_access_token not set".into()));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ShopchatError> {
        debug!("Messenger channel shutting down");
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MessengerChannel {
    fn channel(&self) -> Channel {
        Channel::Messenger
    }

    fn is_configured(&self) -> bool {
        self.page_access_token.is_some()
    }

    fn receive(&self, raw: &Value) -> Result<Option<InboundEvent>, ShopchatError> {
        webhook::parse_notification(raw)
    }

    async fn send(
        &self,
        external_user_id: &str,
        message: &OutboundMessage,
    ) -> Result<DeliveryId, ShopchatError> {
        let token = self
            .page_access_token
            .as_deref()
            .ok_or_else(|| ShopchatError::channel("Messenger is not configured"))?;

        let exchange = async {
            let mut last = None;
            for body in request_bodies(external_user_id, message) {
                last = Some(self.post(token, &body).await?);
            }
            last.ok_or_else(|| ShopchatError::Internal("no Messenger request built".into()))
        };

        let id = tokio::time::timeout(self.send_timeout, exchange)
            .await
            .map_err(|_| ShopchatError::Timeout {
                duration: self.send_timeout,
            })??;
        debug!(to = external_user_id, message_id = id.0.as_str(), "Messenger message sent");
        Ok(id)
    }
}
