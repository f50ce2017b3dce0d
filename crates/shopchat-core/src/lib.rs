// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for shopchat.
//!
//! Holds the entity types, the error enum and the adapter and repository
//! traits that every other `shopchat-*` crate builds on.

pub mod chat;
pub mod error;
pub mod flow;
pub mod traits;
pub mod types;

pub use chat::{
    ChatMessage, ChatSession, Customer, NewMessage, OrderSummary, ProductSummary, ReadReceipt,
    SenderKind, StoredMessage,
};
pub use error::ShopchatError;
pub use flow::{
    ExecutionState, FlowBundle, FlowConnection, FlowDefinition, FlowNode, NodeKind, Predicate,
    TriggerKind,
};
pub use types::{
    AdapterType, Button, Channel, ChannelScope, DeliveryId, HealthStatus, InboundEvent,
    OutboundMessage, RenderedResponse,
};

pub use traits::{
    ChannelAdapter, ChatStore, CommerceReader, CustomerRepository, ExecutionStateRepository,
    FlowRepository, PluginAdapter, StorageAdapter,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn error_variants_render() {
        let err = ShopchatError::not_found("flow", 7);
        assert_eq!(err.to_string(), "flow not found: 7");

        let err = ShopchatError::channel("send rejected");
        assert_eq!(err.to_string(), "channel error: send rejected");

        let err = ShopchatError::Timeout {
            duration: std::time::Duration::from_secs(10),
        };
        assert!(err.to_string().contains("10s"));

        let err = ShopchatError::Storage {
            source: Box::new(std::io::Error::other("disk full")),
        };
        assert_eq!(err.to_string(), "storage error: disk full");
    }

    #[test]
    fn channel_round_trips_through_strings() {
        for channel in Channel::ALL {
            let parsed = Channel::from_str(&channel.to_string()).unwrap();
            assert_eq!(parsed, channel);
        }
        assert!(Channel::from_str("discord").is_err());
    }

    #[test]
    fn channel_scope_parses_all_and_single_networks() {
        assert_eq!("all".parse::<ChannelScope>().unwrap(), ChannelScope::All);
        assert_eq!(
            "WhatsApp".parse::<ChannelScope>().unwrap(),
            ChannelScope::Only(Channel::Whatsapp)
        );
        assert!("fax".parse::<ChannelScope>().is_err());

        assert!(ChannelScope::All.includes(Channel::Messenger));
        assert!(ChannelScope::Only(Channel::Telegram).includes(Channel::Telegram));
        assert!(!ChannelScope::Only(Channel::Telegram).includes(Channel::Whatsapp));
    }

    #[test]
    fn channel_scope_serializes_as_string() {
        let json = serde_json::to_string(&ChannelScope::Only(Channel::Messenger)).unwrap();
        assert_eq!(json, "\"messenger\"");
        let back: ChannelScope = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(back, ChannelScope::All);
    }

    #[test]
    fn button_value_defaults_to_label() {
        let plain = Button::new("Products");
        assert_eq!(plain.value(), "Products");
        let with_payload = Button {
            label: "Track my order".into(),
            payload: Some("2".into()),
        };
        assert_eq!(with_payload.value(), "2");
    }

    #[test]
    fn adapter_type_parses() {
        assert_eq!(AdapterType::from_str("Channel").unwrap(), AdapterType::Channel);
        assert_eq!(AdapterType::Commerce.to_string(), "Commerce");
    }
}
