// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait shared by channel, storage and commerce adapters.

use async_trait::async_trait;

use crate::error::ShopchatError;
use crate::types::{AdapterType, HealthStatus};

/// Identity, lifecycle and health for every pluggable adapter.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    fn version(&self) -> semver::Version;

    fn adapter_type(&self) -> AdapterType;

    /// Reports current status without side effects.
    async fn health_check(&self) -> Result<HealthStatus, ShopchatError>;

    /// Releases held resources. Called once during graceful shutdown.
    async fn shutdown(&self) -> Result<(), ShopchatError>;
}
