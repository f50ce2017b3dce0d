// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram channel adapter for shopchat.
//!
//! Implements [`ChannelAdapter`] for the Telegram Bot API via teloxide:
//! webhook updates are normalized by [`handler::parse_update`] and replies
//! are sent as plain text or a captioned photo with an inline keyboard.

pub mod handler;

use std::time::Duration;

use async_trait::async_trait;
use shopchat_config::model::TelegramConfig;
use shopchat_core::{
    AdapterType, Button, Channel, ChannelAdapter, DeliveryId, HealthStatus, InboundEvent,
    OutboundMessage, PluginAdapter, ShopchatError,
};
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile};
use tracing::{debug, warn};

/// Telegram channel adapter implementing [`ChannelAdapter`].
///
/// Without a bot token the adapter still parses updates but every send fails.
pub struct TelegramChannel {
    bot: Option<Bot>,
    send_timeout: Duration,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig) -> Result<Self, ShopchatError> {
        let send_timeout = Duration::from_secs(config.send_timeout_secs.max(1));
        let token = config.bot_token.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let Some(token) = token else {
            warn!("telegram.bot_token not set, Telegram replies are disabled");
            return Ok(Self {
                bot: None,
                send_timeout,
            });
        };

        let client = teloxide::net::default_reqwest_settings()
            .timeout(send_timeout)
            .build()
            .map_err(|e| ShopchatError::Channel {
                message: format!("failed to build Telegram HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        let api_url = reqwest::Url::parse(&config.api_url).map_err(|e| {
            ShopchatError::Config(format!("invalid telegram.api_url `{}`: {e}", config.api_url))
        })?;
        let bot = Bot::with_client(token, client).set_api_url(api_url);

        Ok(Self {
            bot: Some(bot),
            send_timeout,
        })
    }

    fn bot(&self) -> Result<&Bot, ShopchatError> {
        self.bot
            .as_ref()
            .ok_or_else(|| ShopchatError::channel("Telegram is not configured"))
    }
}

fn keyboard(buttons: &[Button]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        buttons
            .iter()
            .map(|b| vec![InlineKeyboardButton::callback(b.label.clone(), b.value().to_string())]),
    )
}

fn send_error(e: teloxide::RequestError) -> ShopchatError {
    ShopchatError::Channel {
        message: format!("failed to send Telegram message: {e}"),
        source: Some(Box::new(e)),
    }
}

#[async_trait]
impl PluginAdapter for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, ShopchatError> {
        let Some(bot) = &self.bot else {
            return Ok(HealthStatus::Degraded("bot_token not set".into()));
        };
        match tokio::time::timeout(self.send_timeout, bot.get_me()).await {
            Ok(Ok(_)) => Ok(HealthStatus::Healthy),
            Ok(Err(e)) => Ok(HealthStatus::Unhealthy(format!("Telegram bot unreachable: {e}"))),
            Err(_) => Ok(HealthStatus::Degraded("getMe timed out".into())),
        }
    }

    async fn shutdown(&self) -> Result<(), ShopchatError> {
        debug!("Telegram channel shutting down");
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for TelegramChannel {
    fn channel(&self) -> Channel {
        Channel::Telegram
    }

    fn is_configured(&self) -> bool {
        self.bot.is_some()
    }

    fn receive(&self, raw: &serde_json::Value) -> Result<Option<InboundEvent>, ShopchatError> {
        handler::parse_update(raw)
    }

    async fn send(
        &self,
        external_user_id: &str,
        message: &OutboundMessage,
    ) -> Result<DeliveryId, ShopchatError> {
        let bot = self.bot()?;
        let chat_id = external_user_id
            .parse::<i64>()
            .map(ChatId)
            .map_err(|e| ShopchatError::channel(format!("invalid Telegram chat id: {e}")))?;

        let request = async {
            match &message.image_url {
                Some(url) => {
                    let photo = reqwest::Url::parse(url).map_err(|e| {
                        ShopchatError::channel(format!("invalid image url `{url}`: {e}"))
                    })?;
                    let mut req = bot.send_photo(chat_id, InputFile::url(photo));
                    if !message.text.is_empty() {
                        req = req.caption(message.text.clone());
                    }
                    if !message.buttons.is_empty() {
                        req = req.reply_markup(keyboard(&message.buttons));
                    }
                    req.await.map_err(send_error)
                }
                None => {
                    let mut req = bot.send_message(chat_id, message.text.clone());
                    if !message.buttons.is_empty() {
                        req = req.reply_markup(keyboard(&message.buttons));
                    }
                    req.await.map_err(send_error)
                }
            }
        };

        let sent = tokio::time::timeout(self.send_timeout, request)
            .await
            .map_err(|_| ShopchatError::Timeout {
                duration: self.send_timeout,
            })??;
        debug!(chat_id = chat_id.0, message_id = sent.id.0, "Telegram message sent");
        Ok(DeliveryId(sent.id.0.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(token: Option<&str>, api_url: &str) -> TelegramConfig {
        TelegramConfig {
            bot_token: token.map(str::to_string),
            api_url: api_url.to_string(),
            send_timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn unconfigured_adapter_refuses_to_send() {
        let channel = TelegramChannel::new(&config(None, "https://api.telegram.org")).unwrap();
        assert!(!channel.is_configured());
        let err = channel
            .send("1", &OutboundMessage::text("hi"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not configured"));
        assert_eq!(
            channel.health_check().await.unwrap(),
            HealthStatus::Degraded("bot_token not set".into())
        );
    }

    #[test]
    fn blank_token_counts_as_unconfigured() {
        let channel = TelegramChannel::new(&config(Some("  "), "https://api.telegram.org")).unwrap();
        assert!(!channel.is_configured());
    }

    #[test]
    fn plugin_adapter_metadata() {
        let channel = TelegramChannel::new(&config(Some("1:abc"), "https://api.telegram.org")).unwrap();
        assert_eq!(channel.name(), "telegram");
        assert_eq!(channel.version(), semver::Version::new(0, 1, 0));
        assert_eq!(channel.adapter_type(), AdapterType::Channel);
        assert_eq!(channel.channel(), Channel::Telegram);
    }

    #[tokio::test]
    async fn invalid_chat_id_is_rejected_before_any_request() {
        let channel = TelegramChannel::new(&config(Some("1:abc"), "http://127.0.0.1:9")).unwrap();
        let err = channel.send("not-a-number", &OutboundMessage::text("hi")).await.unwrap_err();
        assert!(err.to_string().contains("invalid Telegram chat id"));
    }

    #[tokio::test]
    async fn sends_text_with_inline_keyboard() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)/bot1:abc/sendmessage$"))
            .and(body_string_contains("inline_keyboard"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {
                    "message_id": 99,
                    "date": 1_700_000_000,
                    "chat": {"id": 5551, "type": "private", "first_name": "Kim"},
                    "from": {"id": 1, "is_bot": true, "first_name": "Shop"},
                    "text": "Pick one"
                }
            })))
            .mount(&server)
            .await;

        let channel = TelegramChannel::new(&config(Some("1:abc"), &server.uri())).unwrap();
        let message = OutboundMessage {
            text: "Pick one".into(),
            buttons: vec![Button::new("Products"), Button::new("Orders")],
            image_url: None,
        };
        let id = channel.send("5551", &message).await.unwrap();
        assert_eq!(id, DeliveryId("99".into()));
    }
}
