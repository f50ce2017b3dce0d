// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `shopchat serve` command implementation.
//!
//! Opens SQLite storage, builds the flow engine and the dashboard event bus,
//! registers the Telegram, WhatsApp and Messenger adapters, and serves the
//! gateway until SIGTERM or Ctrl+C. In-flight webhook tasks are drained
//! before the adapters and storage are closed.

use std::sync::Arc;
use std::time::Duration;

use shopchat_bus::EventBus;
use shopchat_config::model::ShopchatConfig;
use shopchat_core::{PluginAdapter, ShopchatError, StorageAdapter};
use shopchat_flow::FlowEngine;
use shopchat_gateway::{GatewayState, start_server};
use shopchat_inbox::shutdown::{drain_tasks, install_signal_handler};
use shopchat_inbox::{ChannelRegistry, ConversationService};
use shopchat_messenger::MessengerChannel;
use shopchat_storage::SqliteStorage;
use shopchat_telegram::TelegramChannel;
use shopchat_whatsapp::WhatsappChannel;
use tracing::{info, warn};

/// How long in-flight webhook tasks get to finish after shutdown starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds a registry holding an adapter for every supported network.
///
/// Adapters without credentials are still registered: they parse webhooks
/// and report `degraded` on `/health`, but every send fails.
pub fn build_registry(config: &ShopchatConfig) -> Result<ChannelRegistry, ShopchatError> {
    let mut registry = ChannelRegistry::new();
    registry.register(Arc::new(TelegramChannel::new(&config.telegram)?));
    registry.register(Arc::new(WhatsappChannel::new(&config.whatsapp)?));
    registry.register(Arc::new(MessengerChannel::new(&config.messenger)?));
    Ok(registry)
}

/// Runs the `shopchat serve` command.
pub async fn run_serve(config: ShopchatConfig) -> Result<(), ShopchatError> {
    info!(name = %config.server.name, "starting shopchat serve");

    let storage = Arc::new(SqliteStorage::open(config.storage.clone()).await?);

    let active = storage.list_flows().await?.iter().filter(|f| f.is_active).count();
    info!(active, "flows loaded");
    if active == 0 {
        warn!("no active flows, customer messages will be logged without replies");
    }

    let engine = Arc::new(FlowEngine::new(
        storage.clone(),
        storage.clone(),
        storage.clone(),
        config.engine.clone(),
    )?);
    let bus = Arc::new(EventBus::new(config.realtime.channel_capacity));
    let registry = build_registry(&config)?;
    info!(channels = registry.len(), "channel adapters registered");

    let service = Arc::new(ConversationService::new(
        storage.clone(),
        storage.clone(),
        engine,
        bus,
        registry,
    ));

    let cancel = install_signal_handler();
    let state = GatewayState::new(service.clone(), &config.gateway);
    let served = start_server(&config.gateway, state, cancel.clone()).await;
    // A bind failure returns before any signal; make sure nothing waits on it.
    cancel.cancel();

    info!("draining in-flight webhook tasks");
    if !drain_tasks(service.tasks(), DRAIN_TIMEOUT).await {
        warn!(
            timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "webhook tasks still running at shutdown"
        );
    }

    if let Err(e) = service.channels().shutdown().await {
        warn!(error = %e, "channel shutdown failed");
    }
    if let Err(e) = storage.close().await {
        warn!(error = %e, "storage close failed");
    }

    info!("shopchat stopped");
    served
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("shopchat={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
