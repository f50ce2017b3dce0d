// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the complete inbound pipeline with mock channels
//! for every network, a temp SQLite database, the flow engine and the event
//! bus. Provides `send()` to drive a customer message through it.

use std::sync::Arc;

use shopchat_bus::EventBus;
use shopchat_config::model::{EngineConfig, StorageConfig};
use shopchat_core::{Channel, FlowBundle, InboundEvent, ShopchatError};
use shopchat_flow::FlowEngine;
use shopchat_inbox::{ChannelRegistry, ConversationService, InboundOutcome};
use shopchat_storage::SqliteStorage;

use crate::mock_channel::MockChannel;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    flows: Vec<FlowBundle>,
    engine: EngineConfig,
    failing: Vec<(Channel, String)>,
    unconfigured: Vec<Channel>,
    bus_capacity: usize,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            flows: Vec::new(),
            engine: EngineConfig::default(),
            failing: Vec::new(),
            unconfigured: Vec::new(),
            bus_capacity: 256,
        }
    }

    /// Import `bundle` before the harness is returned.
    pub fn with_flow(mut self, bundle: FlowBundle) -> Self {
        self.flows.push(bundle);
        self
    }

    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine = config;
        self
    }

    /// Make every send on `channel` fail with `reason`.
    pub fn with_failing_channel(mut self, channel: Channel, reason: impl Into<String>) -> Self {
        self.failing.push((channel, reason.into()));
        self
    }

    /// Register `channel` without credentials.
    pub fn with_unconfigured_channel(mut self, channel: Channel) -> Self {
        self.unconfigured.push(channel);
        self
    }

    pub fn with_bus_capacity(mut self, capacity: usize) -> Self {
        self.bus_capacity = capacity;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, ShopchatError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| ShopchatError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let storage = Arc::new(
            SqliteStorage::open(StorageConfig {
                database_path: db_path.to_string_lossy().to_string(),
                wal_mode: true,
                query_timeout_ms: 5_000,
            })
            .await?,
        );
        for bundle in &self.flows {
            storage.import_bundle(bundle).await?;
        }

        let engine = Arc::new(FlowEngine::new(
            storage.clone(),
            storage.clone(),
            storage.clone(),
            self.engine,
        )?);
        let bus = Arc::new(EventBus::new(self.bus_capacity));

        let make = |channel: Channel| {
            let mock = if self.unconfigured.contains(&channel) {
                MockChannel::unconfigured(channel)
            } else if let Some((_, reason)) = self.failing.iter().find(|(c, _)| *c == channel) {
                MockChannel::failing(channel, reason.clone())
            } else {
                MockChannel::new(channel)
            };
            Arc::new(mock)
        };
        let telegram = make(Channel::Telegram);
        let whatsapp = make(Channel::Whatsapp);
        let messenger = make(Channel::Messenger);

        let mut channels = ChannelRegistry::new();
        channels.register(telegram.clone());
        channels.register(whatsapp.clone());
        channels.register(messenger.clone());

        let service = Arc::new(ConversationService::new(
            storage.clone(),
            storage.clone(),
            engine,
            bus.clone(),
            channels,
        ));

        Ok(TestHarness {
            storage,
            bus,
            service,
            telegram,
            whatsapp,
            messenger,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock channels and temp storage.
pub struct TestHarness {
    /// SQLite storage (temp DB, cleaned up on drop).
    pub storage: Arc<SqliteStorage>,
    pub bus: Arc<EventBus>,
    pub service: Arc<ConversationService>,
    pub telegram: Arc<MockChannel>,
    pub whatsapp: Arc<MockChannel>,
    pub messenger: Arc<MockChannel>,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// The mock adapter registered for `channel`.
    pub fn channel(&self, channel: Channel) -> &Arc<MockChannel> {
        match channel {
            Channel::Telegram => &self.telegram,
            Channel::Whatsapp => &self.whatsapp,
            Channel::Messenger => &self.messenger,
        }
    }

    /// Drive one customer message through the full pipeline.
    pub async fn send(
        &self,
        channel: Channel,
        external_user_id: &str,
        text: &str,
    ) -> Result<InboundOutcome, ShopchatError> {
        self.service
            .handle_inbound(InboundEvent {
                channel,
                external_user_id: external_user_id.to_string(),
                display_name: format!("Tester {external_user_id}"),
                text: text.to_string(),
                external_message_id: None,
            })
            .await
    }

    /// Text of the reply to a customer message, if the flow produced one.
    pub async fn reply(
        &self,
        channel: Channel,
        external_user_id: &str,
        text: &str,
    ) -> Result<Option<String>, ShopchatError> {
        let outcome = self.send(channel, external_user_id, text).await?;
        Ok(outcome.reply.map(|r| r.message.text))
    }

    /// Unread customer-sent messages counted straight from the log.
    pub async fn unread_in_log(&self) -> Result<i64, ShopchatError> {
        self.storage
            .database()?
            .call("unread_in_log", |conn| -> Result<i64, rusqlite::Error> {
                conn.query_row(
                    "SELECT COUNT(*) FROM chat_messages WHERE sender = 'customer' AND is_read = 0",
                    [],
                    |row| row.get(0),
                )
            })
            .await
    }
}
