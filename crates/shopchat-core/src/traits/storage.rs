// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends (SQLite, etc.).

use async_trait::async_trait;

use crate::error::ShopchatError;
use crate::traits::adapter::PluginAdapter;

/// Lifecycle of a persistence backend. Data access goes through the
/// repository traits.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Opens the backend and applies pending migrations.
    async fn initialize(&self) -> Result<(), ShopchatError>;

    /// Flushes pending writes and releases the connection.
    async fn close(&self) -> Result<(), ShopchatError>;
}
