// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-customer session aggregate behind the operator inbox.
//!
//! The synchronous helpers take a plain connection so the message log can
//! call them inside its own transaction.

use rusqlite::{Connection, OptionalExtension, params};
use shopchat_core::{Channel, ChatSession, ShopchatError};

use crate::database::Database;
use crate::queries::parse_column;

const SESSION_SELECT: &str = "SELECT s.id, s.customer_id, c.name, s.channel, s.last_message_at, \
                              s.unread_count, s.is_active, s.created_at \
                              FROM chat_sessions s JOIN customers c ON c.id = s.customer_id";

fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatSession> {
    Ok(ChatSession {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        customer_name: row.get(2)?,
        channel: parse_column(row, 3)?,
        last_message_at: row.get(4)?,
        unread_count: row.get(5)?,
        is_active: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Which side produced the message being reflected into the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Touch {
    /// Customer message: takes over the session channel and reactivates it.
    Inbound,
    /// Admin message: only moves `last_message_at`.
    Outbound,
}

/// Upsert the session for `customer_id` after a message at `at`, then
/// recount its unread messages from the log.
pub(crate) fn touch_session(
    conn: &Connection,
    customer_id: i64,
    channel: Channel,
    at: &str,
    touch: Touch,
) -> rusqlite::Result<()> {
    let sql = match touch {
        Touch::Inbound => {
            "INSERT INTO chat_sessions (customer_id, channel, last_message_at) \
             VALUES (?1, ?2, ?3) \
             ON CONFLICT(customer_id) DO UPDATE SET channel = excluded.channel, \
             last_message_at = excluded.last_message_at, is_active = 1"
        }
        Touch::Outbound => {
            "INSERT INTO chat_sessions (customer_id, channel, last_message_at) \
             VALUES (?1, ?2, ?3) \
             ON CONFLICT(customer_id) DO UPDATE SET last_message_at = excluded.last_message_at"
        }
    };
    conn.execute(sql, params![customer_id, channel.to_string(), at])?;
    recount_unread(conn, customer_id)
}

/// Set the session's unread count to the number of unread customer-sent
/// messages in the log.
pub(crate) fn recount_unread(conn: &Connection, customer_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE chat_sessions SET unread_count = ( \
             SELECT COUNT(*) FROM chat_messages \
             WHERE customer_id = ?1 AND sender = 'customer' AND is_read = 0) \
         WHERE customer_id = ?1",
        params![customer_id],
    )?;
    Ok(())
}

pub(crate) fn load_session(
    conn: &Connection,
    customer_id: i64,
) -> rusqlite::Result<Option<ChatSession>> {
    conn.query_row(
        &format!("{SESSION_SELECT} WHERE s.customer_id = ?1"),
        params![customer_id],
        session_from_row,
    )
    .optional()
}

/// Sum of unread counts over active sessions.
pub(crate) fn sum_unread(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(SUM(unread_count), 0) FROM chat_sessions WHERE is_active = 1",
        [],
        |row| row.get(0),
    )
}

/// Active sessions, most recent activity first.
pub async fn list_sessions(db: &Database) -> Result<Vec<ChatSession>, ShopchatError> {
    db.call("list_sessions", |conn| -> Result<_, rusqlite::Error> {
        let mut stmt = conn.prepare(&format!(
            "{SESSION_SELECT} WHERE s.is_active = 1 \
             ORDER BY s.last_message_at DESC, s.id DESC"
        ))?;
        let rows = stmt.query_map([], session_from_row)?;
        rows.collect()
    })
    .await
}

pub async fn get_session(
    db: &Database,
    customer_id: i64,
) -> Result<Option<ChatSession>, ShopchatError> {
    db.call("get_session", move |conn| -> Result<_, rusqlite::Error> {
        load_session(conn, customer_id)
    })
    .await
}

pub async fn unread_total(db: &Database) -> Result<i64, ShopchatError> {
    db.call("unread_total", |conn| -> Result<_, rusqlite::Error> { sum_unread(conn) })
        .await
}
