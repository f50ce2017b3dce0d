// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audience-scoped broadcast channels.
//!
//! Delivery is at-most-once: events published while nobody listens are
//! dropped, and a subscriber that falls more than `capacity` events behind
//! skips ahead. Clients resynchronize through the pull APIs.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use shopchat_core::{ChatMessage, ReadReceipt, StoredMessage};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::events::{Envelope, InboxEvent};

/// Who receives an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Audience {
    /// Every connected dashboard.
    Admin,
    /// Viewers of one customer's conversation.
    Customer(i64),
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Audience::Admin => f.write_str("admin"),
            Audience::Customer(id) => write!(f, "customer:{id}"),
        }
    }
}

type Sender = broadcast::Sender<Arc<Envelope>>;

/// Fan-out hub for inbox events.
pub struct EventBus {
    capacity: usize,
    admin: Sender,
    customers: DashMap<i64, Sender>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (admin, _) = broadcast::channel(capacity);
        Self {
            capacity,
            admin,
            customers: DashMap::new(),
        }
    }

    pub fn subscribe(&self, audience: Audience) -> Subscription {
        let rx = match audience {
            Audience::Admin => self.admin.subscribe(),
            Audience::Customer(id) => self
                .customers
                .entry(id)
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe(),
        };
        debug!(%audience, "subscriber joined");
        Subscription { audience, rx }
    }

    /// Publish one event; returns how many subscribers received it.
    pub fn publish(&self, audience: Audience, event: InboxEvent) -> usize {
        self.send(audience, Arc::new(Envelope::new(event)))
    }

    fn send(&self, audience: Audience, envelope: Arc<Envelope>) -> usize {
        match audience {
            Audience::Admin => self.admin.send(envelope).unwrap_or(0),
            Audience::Customer(id) => {
                let delivered = match self.customers.get(&id) {
                    Some(tx) => tx.send(envelope).unwrap_or(0),
                    None => return 0,
                };
                if delivered == 0 {
                    self.customers.remove_if(&id, |_, tx| tx.receiver_count() == 0);
                }
                delivered
            }
        }
    }

    /// A new message: to the admin group and the customer's group.
    pub fn message_created(&self, message: &ChatMessage) {
        let envelope = Arc::new(Envelope::new(InboxEvent::NewMessage(message.clone())));
        self.send(Audience::Admin, Arc::clone(&envelope));
        self.send(Audience::Customer(message.customer_id), envelope);
    }

    /// Everything a dashboard needs after a message was stored: the message,
    /// the session snapshot and the unread total.
    pub fn message_stored(&self, stored: &StoredMessage) {
        self.message_created(&stored.message);
        self.publish(
            Audience::Admin,
            InboxEvent::SessionUpdate {
                session: stored.session.clone(),
            },
        );
        self.publish(
            Audience::Admin,
            InboxEvent::UnreadCount {
                total: stored.unread_total,
            },
        );
    }

    /// A read receipt to both groups, then the session and unread total to
    /// the admin group.
    pub fn messages_read(&self, receipt: &ReadReceipt) {
        let envelope = Arc::new(Envelope::new(InboxEvent::MessagesRead {
            customer_id: receipt.customer_id,
            message_ids: receipt.message_ids.clone(),
        }));
        self.send(Audience::Admin, Arc::clone(&envelope));
        self.send(Audience::Customer(receipt.customer_id), envelope);
        if let Some(session) = &receipt.session {
            self.publish(
                Audience::Admin,
                InboxEvent::SessionUpdate {
                    session: session.clone(),
                },
            );
        }
        self.publish(
            Audience::Admin,
            InboxEvent::UnreadCount {
                total: receipt.unread_total,
            },
        );
    }

    /// Customer groups currently holding a channel.
    pub fn customer_groups(&self) -> usize {
        self.customers.len()
    }
}

/// A live feed for one audience.
pub struct Subscription {
    audience: Audience,
    rx: broadcast::Receiver<Arc<Envelope>>,
}

impl Subscription {
    pub fn audience(&self) -> Audience {
        self.audience
    }

    /// Next event, or `None` once the bus is gone. Missed events are skipped.
    pub async fn recv(&mut self) -> Option<Arc<Envelope>> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(audience = %self.audience, skipped, "subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopchat_core::{Channel, ChatSession, SenderKind};

    fn message(id: i64, customer_id: i64) -> ChatMessage {
        ChatMessage {
            id,
            customer_id,
            sender: SenderKind::Customer,
            text: "hi".into(),
            channel: Channel::Telegram,
            external_message_id: None,
            is_read: false,
            read_at: None,
            metadata: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    fn session(customer_id: i64, unread: i64) -> ChatSession {
        ChatSession {
            id: 1,
            customer_id,
            customer_name: "Kim".into(),
            channel: Channel::Telegram,
            last_message_at: "2026-01-01T00:00:00.000Z".into(),
            unread_count: unread,
            is_active: true,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[tokio::test]
    async fn new_message_reaches_admin_and_owner_only() {
        let bus = EventBus::new(16);
        let mut admin = bus.subscribe(Audience::Admin);
        let mut owner = bus.subscribe(Audience::Customer(1));
        let mut other = bus.subscribe(Audience::Customer(2));

        bus.message_created(&message(10, 1));

        let a = admin.recv().await.unwrap();
        let o = owner.recv().await.unwrap();
        assert_eq!(a.id, o.id);
        assert_eq!(a.event.name(), "new-message");
        assert!(other.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stored_message_fans_out_snapshot_and_total() {
        let bus = EventBus::new(16);
        let mut admin = bus.subscribe(Audience::Admin);
        bus.message_stored(&StoredMessage {
            message: message(10, 1),
            session: session(1, 1),
            unread_total: 5,
        });

        let names: Vec<_> = [
            admin.recv().await.unwrap(),
            admin.recv().await.unwrap(),
            admin.recv().await.unwrap(),
        ]
        .iter()
        .map(|e| e.event.name())
        .collect();
        assert_eq!(names, ["new-message", "session-update", "unread-count"]);
    }

    #[tokio::test]
    async fn read_receipt_goes_to_both_groups() {
        let bus = EventBus::new(16);
        let mut admin = bus.subscribe(Audience::Admin);
        let mut owner = bus.subscribe(Audience::Customer(1));
        bus.messages_read(&ReadReceipt {
            customer_id: 1,
            message_ids: vec![3, 4],
            session: Some(session(1, 0)),
            unread_total: 2,
        });

        let receipt = owner.recv().await.unwrap();
        assert_eq!(
            receipt.event,
            InboxEvent::MessagesRead {
                customer_id: 1,
                message_ids: vec![3, 4]
            }
        );
        assert_eq!(admin.recv().await.unwrap().event.name(), "messages-read");
        assert_eq!(admin.recv().await.unwrap().event.name(), "session-update");
        assert_eq!(
            admin.recv().await.unwrap().event,
            InboxEvent::UnreadCount { total: 2 }
        );
    }

    #[tokio::test]
    async fn publishing_without_listeners_is_dropped() {
        let bus = EventBus::new(4);
        assert_eq!(bus.publish(Audience::Admin, InboxEvent::UnreadCount { total: 1 }), 0);
        assert_eq!(
            bus.publish(Audience::Customer(9), InboxEvent::UnreadCount { total: 1 }),
            0
        );

        // A late subscriber does not see earlier events.
        let mut admin = bus.subscribe(Audience::Admin);
        bus.publish(Audience::Admin, InboxEvent::UnreadCount { total: 2 });
        assert_eq!(
            admin.recv().await.unwrap().event,
            InboxEvent::UnreadCount { total: 2 }
        );
    }

    #[tokio::test]
    async fn idle_customer_groups_are_pruned() {
        let bus = EventBus::new(4);
        let sub = bus.subscribe(Audience::Customer(5));
        assert_eq!(bus.customer_groups(), 1);
        drop(sub);
        bus.publish(Audience::Customer(5), InboxEvent::UnreadCount { total: 0 });
        assert_eq!(bus.customer_groups(), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_ahead() {
        let bus = EventBus::new(2);
        let mut admin = bus.subscribe(Audience::Admin);
        for total in 0..5 {
            bus.publish(Audience::Admin, InboxEvent::UnreadCount { total });
        }
        assert_eq!(
            admin.recv().await.unwrap().event,
            InboxEvent::UnreadCount { total: 3 }
        );
    }
}
