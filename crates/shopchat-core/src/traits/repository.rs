// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed repository traits, one per entity family.
//!
//! The flow engine and conversation service depend only on these; the SQLite
//! store in `shopchat-storage` implements all of them.

use async_trait::async_trait;

use crate::chat::{ChatMessage, ChatSession, Customer, NewMessage, ReadReceipt, StoredMessage};
use crate::error::ShopchatError;
use crate::flow::{ExecutionState, FlowConnection, FlowDefinition, FlowNode};
use crate::types::Channel;

/// Read access to operator-authored flows.
#[async_trait]
pub trait FlowRepository: Send + Sync {
    /// Active flows in listing order (ascending id).
    async fn list_active_flows(&self) -> Result<Vec<FlowDefinition>, ShopchatError>;

    /// The flow's `start` node, if it has one.
    async fn find_start_node(&self, flow_id: i64) -> Result<Option<FlowNode>, ShopchatError>;

    async fn get_node(
        &self,
        flow_id: i64,
        node_id: &str,
    ) -> Result<Option<FlowNode>, ShopchatError>;

    /// Outgoing edges of a node in evaluation order.
    async fn outgoing_connections(
        &self,
        flow_id: i64,
        node_id: &str,
    ) -> Result<Vec<FlowConnection>, ShopchatError>;
}

/// Maps network identities to durable customers.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Insert-or-fetch keyed on the channel's identity column. Concurrent first
    /// contacts from the same external id resolve to one customer.
    async fn get_or_create_customer(
        &self,
        channel: Channel,
        external_id: &str,
        display_name: &str,
    ) -> Result<Customer, ShopchatError>;

    async fn get_customer(&self, id: i64) -> Result<Option<Customer>, ShopchatError>;
}

/// Per-customer flow cursors.
#[async_trait]
pub trait ExecutionStateRepository: Send + Sync {
    /// The customer's non-completed state.
    async fn active_state(&self, customer_id: i64)
    -> Result<Option<ExecutionState>, ShopchatError>;

    /// Create a new active state. Fails with [`ShopchatError::Conflict`] when
    /// the customer already has one.
    async fn create_state(
        &self,
        customer_id: i64,
        flow_id: i64,
        node_id: &str,
        channel: Channel,
    ) -> Result<ExecutionState, ShopchatError>;

    /// Persist node, variables and completion, conditional on `state.version`
    /// still being current. Returns the state with its bumped version.
    async fn save_state(&self, state: &ExecutionState) -> Result<ExecutionState, ShopchatError>;
}

/// The chat log and the derived session aggregate.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Append a customer-sent, unread message and bump the session.
    async fn save_incoming(&self, message: NewMessage) -> Result<StoredMessage, ShopchatError>;

    /// Append an admin-sent, already-read message and touch the session.
    async fn save_outgoing(&self, message: NewMessage) -> Result<StoredMessage, ShopchatError>;

    /// Flip the customer's unread messages to read and zero the session.
    async fn mark_read(&self, customer_id: i64) -> Result<ReadReceipt, ShopchatError>;

    /// Active sessions, most recent activity first.
    async fn list_sessions(&self) -> Result<Vec<ChatSession>, ShopchatError>;

    /// Up to `limit` messages older than `before_id`, returned oldest first.
    async fn list_messages(
        &self,
        customer_id: i64,
        limit: u32,
        before_id: Option<i64>,
    ) -> Result<Vec<ChatMessage>, ShopchatError>;

    /// Sum of unread counts over active sessions.
    async fn unread_total(&self) -> Result<i64, ShopchatError>;
}
