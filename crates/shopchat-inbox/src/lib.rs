// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound pipeline and operator inbox for shopchat.
//!
//! The [`ConversationService`] is the central coordinator that:
//! - Normalizes webhook payloads through the channel's adapter
//! - Resolves the customer and appends the message to the chat log
//! - Feeds the text to the flow engine and delivers any reply
//! - Publishes every mutation to dashboard subscribers
//! - Serves admin replies and read receipts from the operator inbox

pub mod registry;
pub mod shutdown;

use std::sync::Arc;

use serde_json::{Value, json};
use shopchat_bus::EventBus;
use shopchat_core::{
    Channel, ChannelAdapter, ChatStore, Customer, CustomerRepository, DeliveryId, InboundEvent,
    NewMessage, ReadReceipt, RenderedResponse, ShopchatError, StoredMessage,
};
use shopchat_flow::FlowEngine;
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

pub use registry::ChannelRegistry;

/// What handling one inbound message produced.
#[derive(Debug, Clone)]
pub struct InboundOutcome {
    pub customer: Customer,
    pub incoming: StoredMessage,
    /// The flow's reply as persisted, whether or not delivery succeeded.
    pub reply: Option<StoredMessage>,
}

/// Coordinates channels, the chat store, the flow engine and the event bus.
pub struct ConversationService {
    customers: Arc<dyn CustomerRepository>,
    store: Arc<dyn ChatStore>,
    engine: Arc<FlowEngine>,
    bus: Arc<EventBus>,
    channels: ChannelRegistry,
    tasks: TaskTracker,
    /// Held from a chat log mutation until its events are published, so
    /// broadcast totals and snapshots arrive in commit order.
    publish_order: Mutex<()>,
}

impl ConversationService {
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        store: Arc<dyn ChatStore>,
        engine: Arc<FlowEngine>,
        bus: Arc<EventBus>,
        channels: ChannelRegistry,
    ) -> Self {
        info!(channels = channels.len(), "conversation service initialized");
        Self {
            customers,
            store,
            engine,
            bus,
            channels,
            tasks: TaskTracker::new(),
            publish_order: Mutex::new(()),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    /// Tracker of spawned webhook tasks, drained on shutdown.
    pub fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    /// Handle a webhook delivery in the background.
    ///
    /// Returns immediately; failures are logged, never reported back to the
    /// network.
    pub fn accept_webhook(self: &Arc<Self>, channel: Channel, raw: Value) {
        let service = Arc::clone(self);
        self.tasks.spawn(async move {
            if let Err(e) = service.handle_webhook(channel, &raw).await {
                warn!(%channel, error = %e, "webhook processing failed");
            }
        });
    }

    /// Normalize a raw webhook body and run it through the pipeline.
    ///
    /// Payloads that carry no customer text yield `Ok(None)`.
    pub async fn handle_webhook(
        &self,
        channel: Channel,
        raw: &Value,
    ) -> Result<Option<InboundOutcome>, ShopchatError> {
        let adapter = self.channels.get(channel)?;
        let Some(event) = adapter.receive(raw)? else {
            debug!(%channel, "webhook carried no customer message");
            return Ok(None);
        };
        self.handle_inbound(event).await.map(Some)
    }

    /// Run one normalized inbound message through the pipeline.
    ///
    /// An error from storing the inbound message means it was not persisted:
    /// store calls that miss their deadline while queued are abandoned.
    pub async fn handle_inbound(&self, event: InboundEvent) -> Result<InboundOutcome, ShopchatError> {
        let channel = event.channel;
        let customer = self
            .customers
            .get_or_create_customer(channel, &event.external_user_id, &event.display_name)
            .await?;

        let incoming = {
            let _order = self.publish_order.lock().await;
            let stored = self
                .store
                .save_incoming(NewMessage {
                    customer_id: customer.id,
                    text: event.text.clone(),
                    channel,
                    external_message_id: event.external_message_id.clone(),
                    metadata: None,
                })
                .await?;
            self.bus.message_stored(&stored);
            stored
        };
        debug!(
            customer_id = customer.id,
            %channel,
            message_id = incoming.message.id,
            "inbound message stored"
        );

        let reply = match self
            .engine
            .process_message(customer.id, &event.text, channel)
            .await
        {
            Some(response) => Some(
                self.deliver(customer.id, channel, &event.external_user_id, response)
                    .await?,
            ),
            None => None,
        };

        Ok(InboundOutcome {
            customer,
            incoming,
            reply,
        })
    }

    /// Send an operator-typed message to a customer and log it.
    ///
    /// The reply goes out on the channel of the customer's latest message,
    /// falling back to any network the customer is known on.
    pub async fn send_admin_message(
        &self,
        customer_id: i64,
        text: &str,
    ) -> Result<StoredMessage, ShopchatError> {
        let customer = self
            .customers
            .get_customer(customer_id)
            .await?
            .ok_or_else(|| ShopchatError::not_found("customer", customer_id))?;
        let channel = self.reply_channel(&customer).await?;
        let external_id = customer
            .external_id(channel)
            .ok_or_else(|| ShopchatError::not_found("external identity", customer_id))?
            .to_string();
        self.deliver(customer.id, channel, &external_id, RenderedResponse::text(text))
            .await
    }

    /// Mark the customer's messages read and broadcast the receipt.
    pub async fn mark_read(&self, customer_id: i64) -> Result<ReadReceipt, ShopchatError> {
        let receipt = {
            let _order = self.publish_order.lock().await;
            let receipt = self.store.mark_read(customer_id).await?;
            self.bus.messages_read(&receipt);
            receipt
        };
        debug!(
            customer_id,
            marked = receipt.message_ids.len(),
            unread_total = receipt.unread_total,
            "messages marked read"
        );
        Ok(receipt)
    }

    async fn reply_channel(&self, customer: &Customer) -> Result<Channel, ShopchatError> {
        let latest = self.store.list_messages(customer.id, 1, None).await?;
        if let Some(last) = latest.last()
            && customer.external_id(last.channel).is_some()
        {
            return Ok(last.channel);
        }
        Channel::ALL
            .into_iter()
            .find(|c| customer.external_id(*c).is_some())
            .ok_or_else(|| ShopchatError::not_found("external identity", customer.id))
    }

    /// Send `response` and persist it with the delivery outcome.
    ///
    /// A failed send is not an error: the message is still logged, with the
    /// failure recorded in its metadata.
    async fn deliver(
        &self,
        customer_id: i64,
        channel: Channel,
        external_id: &str,
        response: RenderedResponse,
    ) -> Result<StoredMessage, ShopchatError> {
        let sent = match self.channels.get(channel) {
            Ok(adapter) => adapter.send(external_id, &response.message).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &sent {
            warn!(customer_id, %channel, error = %e, "message delivery failed");
        }
        let metadata = delivery_metadata(&response, &sent);

        let _order = self.publish_order.lock().await;
        let stored = self
            .store
            .save_outgoing(NewMessage {
                customer_id,
                text: response.message.text,
                channel,
                external_message_id: sent.ok().map(|id| id.0),
                metadata: Some(metadata),
            })
            .await?;
        self.bus.message_stored(&stored);
        Ok(stored)
    }
}

/// Metadata stored with an outbound message: the delivery outcome plus what
/// was rendered besides text.
pub fn delivery_metadata(
    response: &RenderedResponse,
    sent: &Result<DeliveryId, ShopchatError>,
) -> Value {
    let mut metadata = match sent {
        Ok(id) => json!({"delivery_id": id.0}),
        Err(e) => json!({"delivery_failed": true, "error": e.to_string()}),
    };
    if !response.message.buttons.is_empty() {
        metadata["buttons"] = json!(response.message.buttons);
    }
    if let Some(url) = &response.message.image_url {
        metadata["image_url"] = json!(url);
    }
    if let Some(payload) = &response.payload {
        metadata["payload"] = payload.clone();
    }
    metadata
}
