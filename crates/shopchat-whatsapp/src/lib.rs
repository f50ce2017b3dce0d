// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Cloud API channel adapter for shopchat.
//!
//! Inbound webhooks are parsed by [`webhook::parse_notification`]; replies go
//! to `POST {api_url}/{phone_number_id}/messages` with bearer auth.

pub mod webhook;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use shopchat_config::model::WhatsappConfig;
use shopchat_core::{
    AdapterType, Channel, ChannelAdapter, DeliveryId, HealthStatus, InboundEvent,
    OutboundMessage, PluginAdapter, ShopchatError,
};
use tracing::{debug, warn};

/// Reply buttons the Cloud API accepts per message.
const MAX_REPLY_BUTTONS: usize = 3;
/// Longest reply button title the Cloud API accepts.
const MAX_BUTTON_TITLE: usize = 20;

struct Credentials {
    access_token: String,
    phone_number_id: String,
}

pub struct WhatsappChannel {
    client: Client,
    api_url: String,
    credentials: Option<Credentials>,
    send_timeout: Duration,
}

impl WhatsappChannel {
    pub fn new(config: &WhatsappConfig) -> Result<Self, ShopchatError> {
        let send_timeout = Duration::from_secs(config.send_timeout_secs.max(1));
        let client = Client::builder()
            .timeout(send_timeout)
            .build()
            .map_err(|e| ShopchatError::Channel {
                message: format!("failed to build WhatsApp HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        let non_empty = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let credentials = match (non_empty(&config.access_token), non_empty(&config.phone_number_id)) {
            (Some(access_token), Some(phone_number_id)) => Some(Credentials {
                access_token,
                phone_number_id,
            }),
            _ => {
                warn!("whatsapp.access_token or whatsapp.phone_number_id not set, WhatsApp replies are disabled");
                None
            }
        };

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            credentials,
            send_timeout,
        })
    }
}

/// Build the Cloud API message body for `message`.
pub fn message_body(to: &str, message: &OutboundMessage) -> Value {
    let buttons = &message.buttons;
    if !buttons.is_empty() && buttons.len() <= MAX_REPLY_BUTTONS {
        let mut interactive = json!({
            "type": "button",
            "body": {"text": message.text},
            "action": {
                "buttons": buttons.iter().map(|b| json!({
                    "type": "reply",
                    "reply": {
                        "id": b.value(),
                        "title": b.label.chars().take(MAX_BUTTON_TITLE).collect::<String>(),
                    }
                })).collect::<Vec<_>>()
            }
        });
        if let Some(url) = &message.image_url {
            interactive["header"] = json!({"type": "image", "image": {"link": url}});
        }
        return json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "interactive",
            "interactive": interactive,
        });
    }

    // Too many buttons for reply buttons: list them as text instead.
    let mut text = message.text.clone();
    for b in buttons {
        text.push_str(&format!("\n- {}", b.label));
    }

    match &message.image_url {
        Some(url) => json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "image",
            "image": {"link": url, "caption": text},
        }),
        None => json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "text",
            "text": {"body": text, "preview_url": false},
        }),
    }
}

#[async_trait]
impl PluginAdapter for WhatsappChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, ShopchatError> {
        if self.credentials.is_none() {
            return Ok(HealthStatus::Degraded("credentials not set".into()));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ShopchatError> {
        debug!("WhatsApp channel shutting down");
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for WhatsappChannel {
    fn channel(&self) -> Channel {
        Channel::Whatsapp
    }

    fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    fn receive(&self, raw: &Value) -> Result<Option<InboundEvent>, ShopchatError> {
        webhook::parse_notification(raw)
    }

    async fn send(
        &self,
        external_user_id: &str,
        message: &OutboundMessage,
    ) -> Result<DeliveryId, ShopchatError> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| ShopchatError::channel("WhatsApp is not configured"))?;
        let url = format!("{}/{}/messages", self.api_url, creds.phone_number_id);
        let body = message_body(external_user_id, message);

        let exchange = async {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&creds.access_token)
                .json(&body)
                .send()
                .await
                .map_err(|e| ShopchatError::Channel {
                    message: format!("WhatsApp request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            if !status.is_success() {
                return Err(ShopchatError::channel(format!(
                    "WhatsApp API returned {status}: {text}"
                )));
            }
            let parsed: Value = serde_json::from_str(&text).map_err(|e| ShopchatError::Channel {
                message: format!("failed to parse WhatsApp response: {e}"),
                source: Some(Box::new(e)),
            })?;
            parsed["messages"][0]["id"]
                .as_str()
                .map(|id| DeliveryId(id.to_string()))
                .ok_or_else(|| ShopchatError::channel("WhatsApp response carried no message id"))
        };

        let id = tokio::time::timeout(self.send_timeout, exchange)
            .await
            .map_err(|_| ShopchatError::Timeout {
                duration: self.send_timeout,
            })??;
        debug!(to = external_user_id, message_id = id.0.as_str(), "WhatsApp message sent");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopchat_core::Button;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(api_url: &str) -> WhatsappConfig {
        WhatsappConfig {
            access_token: Some("wa-token".into()),
            phone_number_id: Some("10001".into()),
            api_url: api_url.to_string(),
            send_timeout_secs: 1,
        }
    }

    #[test]
    fn up_to_three_buttons_become_reply_buttons() {
        let message = OutboundMessage {
            text: "Pick".into(),
            buttons: vec![Button::new("Products"), Button {
                label: "A very long button label indeed".into(),
                payload: Some("2".into()),
            }],
            image_url: Some("https://cdn.example/menu.png".into()),
        };
        let body = message_body("1555", &message);
        assert_eq!(body["type"], "interactive");
        let buttons = &body["interactive"]["action"]["buttons"];
        assert_eq!(buttons[0]["reply"]["id"], "Products");
        assert_eq!(buttons[1]["reply"]["id"], "2");
        assert_eq!(buttons[1]["reply"]["title"].as_str().unwrap().chars().count(), 20);
        assert_eq!(body["interactive"]["header"]["image"]["link"], "https://cdn.example/menu.png");
    }

    #[test]
    fn many_buttons_fall_back_to_text_list() {
        let message = OutboundMessage {
            text: "Pick".into(),
            buttons: ["a", "b", "c", "d"].into_iter().map(Button::new).collect(),
            image_url: None,
        };
        let body = message_body("1555", &message);
        assert_eq!(body["type"], "text");
        assert_eq!(body["text"]["body"], "Pick\n- a\n- b\n- c\n- d");
    }

    #[tokio::test]
    async fn sends_with_bearer_auth_and_returns_wamid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/10001/messages"))
            .and(header("authorization", "Bearer wa-token"))
            .and(body_partial_json(json!({"to": "1555", "type": "text", "text": {"body": "hi"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messaging_product": "whatsapp",
                "contacts": [{"input": "1555", "wa_id": "1555"}],
                "messages": [{"id": "wamid.OUT"}]
            })))
            .mount(&server)
            .await;

        let channel = WhatsappChannel::new(&config(&server.uri())).unwrap();
        let id = channel.send("1555", &OutboundMessage::text("hi")).await.unwrap();
        assert_eq!(id, DeliveryId("wamid.OUT".into()));
    }

    #[tokio::test]
    async fn api_errors_become_channel_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let channel = WhatsappChannel::new(&config(&server.uri())).unwrap();
        let err = channel.send("1555", &OutboundMessage::text("hi")).await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn slow_api_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let channel = WhatsappChannel::new(&config(&server.uri())).unwrap();
        assert!(channel.send("1555", &OutboundMessage::text("hi")).await.is_err());
    }

    #[tokio::test]
    async fn missing_phone_number_id_is_unconfigured() {
        let mut cfg = config("https://graph.facebook.com/v19.0");
        cfg.phone_number_id = None;
        let channel = WhatsappChannel::new(&cfg).unwrap();
        assert!(!channel.is_configured());
        assert!(channel.send("1555", &OutboundMessage::text("hi")).await.is_err());
        assert_eq!(channel.name(), "whatsapp");
    }
}
