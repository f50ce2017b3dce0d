// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter and repository trait definitions.
//!
//! Adapters extend the [`PluginAdapter`] base trait; all traits use
//! `#[async_trait]` so they can be held as `Arc<dyn Trait>`.

pub mod adapter;
pub mod channel;
pub mod commerce;
pub mod repository;
pub mod storage;

pub use adapter::PluginAdapter;
pub use channel::ChannelAdapter;
pub use commerce::CommerceReader;
pub use repository::{ChatStore, CustomerRepository, ExecutionStateRepository, FlowRepository};
pub use storage::StorageAdapter;
