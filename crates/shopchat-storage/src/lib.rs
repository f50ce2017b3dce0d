// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for shopchat.
//!
//! WAL-mode SQLite with embedded migrations, a single-writer model via
//! `tokio-rusqlite`, and typed queries for flows, customers, execution
//! states, the chat log, inbox sessions and the commerce read side.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
