// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for shopchat integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockChannel`] - Mock channel adapter with webhook parsing and send capture
//! - [`TestHarness`] - Temp SQLite, flow engine, event bus and conversation service

pub mod harness;
pub mod mock_channel;

pub use harness::TestHarness;
pub use mock_channel::MockChannel;
