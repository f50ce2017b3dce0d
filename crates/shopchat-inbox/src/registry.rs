// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of channel adapters keyed by network.
//!
//! Inbound webhooks are routed to the adapter for their network; outbound
//! messages go back through the adapter of the customer's channel.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use shopchat_core::{AdapterType, Channel, ChannelAdapter, HealthStatus, PluginAdapter, ShopchatError};

/// Every channel adapter the process runs, one per network.
#[derive(Default, Clone)]
pub struct ChannelRegistry {
    channels: BTreeMap<Channel, Arc<dyn ChannelAdapter>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `adapter` under the network it reports. A second adapter for
    /// the same network replaces the first.
    pub fn register(&mut self, adapter: Arc<dyn ChannelAdapter>) {
        let channel = adapter.channel();
        info!(
            %channel,
            adapter = adapter.name(),
            configured = adapter.is_configured(),
            "channel registered"
        );
        if self.channels.insert(channel, adapter).is_some() {
            warn!(%channel, "replaced previously registered channel adapter");
        }
    }

    pub fn get(&self, channel: Channel) -> Result<&Arc<dyn ChannelAdapter>, ShopchatError> {
        self.channels
            .get(&channel)
            .ok_or_else(|| ShopchatError::AdapterNotFound {
                adapter_type: AdapterType::Channel.to_string(),
                name: channel.to_string(),
            })
    }

    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.channels.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[async_trait]
impl PluginAdapter for ChannelRegistry {
    fn name(&self) -> &str {
        "channel-registry"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, ShopchatError> {
        let mut any_unhealthy = false;
        let mut reasons = Vec::new();

        for (channel, adapter) in &self.channels {
            match adapter.health_check().await? {
                HealthStatus::Healthy => {}
                HealthStatus::Degraded(reason) => reasons.push(format!("{channel}: {reason}")),
                HealthStatus::Unhealthy(reason) => {
                    any_unhealthy = true;
                    reasons.push(format!("{channel}: {reason}"));
                }
            }
        }

        Ok(match (any_unhealthy, reasons.is_empty()) {
            (true, _) => HealthStatus::Unhealthy(reasons.join("; ")),
            (false, false) => HealthStatus::Degraded(reasons.join("; ")),
            (false, true) => HealthStatus::Healthy,
        })
    }

    async fn shutdown(&self) -> Result<(), ShopchatError> {
        for (channel, adapter) in &self.channels {
            if let Err(e) = adapter.shutdown().await {
                warn!(%channel, error = %e, "channel shutdown error");
            }
        }
        Ok(())
    }
}
