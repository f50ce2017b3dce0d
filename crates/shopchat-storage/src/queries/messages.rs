// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The chat log.
//!
//! Every mutation writes the message, reflects it into the session aggregate
//! and reads back the unread total inside one transaction, so callers never
//! observe the log and the aggregate out of step.

use rusqlite::{Connection, params};
use shopchat_core::{
    ChatMessage, NewMessage, ReadReceipt, SenderKind, ShopchatError, StoredMessage,
};

use crate::database::Database;
use crate::queries::sessions::{Touch, load_session, recount_unread, sum_unread, touch_session};
use crate::queries::{json_column, parse_column};

const MESSAGE_COLUMNS: &str = "id, customer_id, sender, text, channel, external_message_id, \
                               is_read, read_at, metadata, created_at";

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        sender: parse_column(row, 2)?,
        text: row.get(3)?,
        channel: parse_column(row, 4)?,
        external_message_id: row.get(5)?,
        is_read: row.get(6)?,
        read_at: row.get(7)?,
        metadata: json_column(row, 8)?,
        created_at: row.get(9)?,
    })
}

fn append(
    conn: &mut Connection,
    message: NewMessage,
    metadata: Option<String>,
    sender: SenderKind,
) -> rusqlite::Result<StoredMessage> {
    let tx = conn.transaction()?;
    let (is_read, touch) = match sender {
        SenderKind::Customer => (false, Touch::Inbound),
        SenderKind::Admin => (true, Touch::Outbound),
    };
    let stored = tx.query_row(
        &format!(
            "INSERT INTO chat_messages \
             (customer_id, sender, text, channel, external_message_id, is_read, read_at, metadata) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, \
                     CASE WHEN ?6 THEN strftime('%Y-%m-%dT%H:%M:%fZ', 'now') END, ?7) \
             RETURNING {MESSAGE_COLUMNS}"
        ),
        params![
            message.customer_id,
            sender.to_string(),
            message.text,
            message.channel.to_string(),
            message.external_message_id,
            is_read,
            metadata,
        ],
        message_from_row,
    )?;
    touch_session(
        &tx,
        stored.customer_id,
        stored.channel,
        &stored.created_at,
        touch,
    )?;
    let session = load_session(&tx, stored.customer_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
    let unread_total = sum_unread(&tx)?;
    tx.commit()?;
    Ok(StoredMessage {
        message: stored,
        session,
        unread_total,
    })
}

async fn save(
    db: &Database,
    op: &'static str,
    message: NewMessage,
    sender: SenderKind,
) -> Result<StoredMessage, ShopchatError> {
    let metadata = message
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    db.call(op, move |conn| append(conn, message, metadata, sender))
        .await
}

/// Append a customer-sent message (unread) and bump the session.
pub async fn save_incoming(
    db: &Database,
    message: NewMessage,
) -> Result<StoredMessage, ShopchatError> {
    save(db, "save_incoming", message, SenderKind::Customer).await
}

/// Append an admin-sent message (already read) and touch the session.
pub async fn save_outgoing(
    db: &Database,
    message: NewMessage,
) -> Result<StoredMessage, ShopchatError> {
    save(db, "save_outgoing", message, SenderKind::Admin).await
}

/// Flip every unread customer-sent message of `customer_id` to read.
///
/// Returns the affected ids; a second call with no new messages in between
/// returns an empty list.
pub async fn mark_read(db: &Database, customer_id: i64) -> Result<ReadReceipt, ShopchatError> {
    db.call("mark_read", move |conn| -> Result<ReadReceipt, rusqlite::Error> {
        let tx = conn.transaction()?;
        let message_ids = {
            let mut stmt = tx.prepare(
                "UPDATE chat_messages \
                 SET is_read = 1, read_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
                 WHERE customer_id = ?1 AND sender = 'customer' AND is_read = 0 \
                 RETURNING id",
            )?;
            let rows = stmt.query_map(params![customer_id], |row| row.get::<_, i64>(0))?;
            let mut ids = rows.collect::<Result<Vec<_>, _>>()?;
            ids.sort_unstable();
            ids
        };
        recount_unread(&tx, customer_id)?;
        let session = load_session(&tx, customer_id)?;
        let unread_total = sum_unread(&tx)?;
        tx.commit()?;
        Ok(ReadReceipt {
            customer_id,
            message_ids,
            session,
            unread_total,
        })
    })
    .await
}

/// Up to `limit` messages older than `before_id`, oldest first.
pub async fn list_messages(
    db: &Database,
    customer_id: i64,
    limit: u32,
    before_id: Option<i64>,
) -> Result<Vec<ChatMessage>, ShopchatError> {
    db.call("list_messages", move |conn| -> Result<_, rusqlite::Error> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages \
             WHERE customer_id = ?1 AND (?2 IS NULL OR id < ?2) \
             ORDER BY created_at DESC, id DESC LIMIT ?3"
        ))?;
        let rows = stmt.query_map(params![customer_id, before_id, limit], message_from_row)?;
        let mut messages = rows.collect::<Result<Vec<_>, _>>()?;
        messages.reverse();
        Ok(messages)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::customers::get_or_create_customer;
    use crate::queries::sessions::{get_session, unread_total};
    use crate::test_support::{incoming, open_temp};
    use shopchat_core::Channel;

    async fn customer(db: &Database, ext: &str) -> i64 {
        get_or_create_customer(db, Channel::Telegram, ext, "Tester")
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn incoming_is_unread_and_counted() {
        let (db, _dir) = open_temp().await;
        let id = customer(&db, "1").await;

        let first = save_incoming(&db, incoming(id, "hi", Channel::Telegram))
            .await
            .unwrap();
        assert_eq!(first.message.sender, SenderKind::Customer);
        assert!(!first.message.is_read);
        assert_eq!(first.session.unread_count, 1);
        assert_eq!(first.session.last_message_at, first.message.created_at);
        assert_eq!(first.unread_total, 1);

        let second = save_incoming(&db, incoming(id, "anyone?", Channel::Telegram))
            .await
            .unwrap();
        assert_eq!(second.session.unread_count, 2);
        assert_eq!(second.unread_total, 2);
    }

    #[tokio::test]
    async fn outgoing_is_read_and_does_not_touch_unread() {
        let (db, _dir) = open_temp().await;
        let id = customer(&db, "1").await;
        save_incoming(&db, incoming(id, "hi", Channel::Telegram))
            .await
            .unwrap();

        let mut reply = incoming(id, "hello!", Channel::Telegram);
        reply.metadata = Some(serde_json::json!({"delivery_id": "77"}));
        let stored = save_outgoing(&db, reply).await.unwrap();
        assert_eq!(stored.message.sender, SenderKind::Admin);
        assert!(stored.message.is_read);
        assert!(stored.message.read_at.is_some());
        assert_eq!(
            stored.message.metadata,
            Some(serde_json::json!({"delivery_id": "77"}))
        );
        assert_eq!(stored.session.unread_count, 1);
        assert_eq!(stored.unread_total, 1);
    }

    #[tokio::test]
    async fn mark_read_zeroes_and_is_idempotent() {
        let (db, _dir) = open_temp().await;
        let a = customer(&db, "a").await;
        let b = customer(&db, "b").await;
        let m1 = save_incoming(&db, incoming(a, "one", Channel::Telegram))
            .await
            .unwrap();
        let m2 = save_incoming(&db, incoming(a, "two", Channel::Telegram))
            .await
            .unwrap();
        save_incoming(&db, incoming(b, "other", Channel::Telegram))
            .await
            .unwrap();
        assert_eq!(unread_total(&db).await.unwrap(), 3);

        let receipt = mark_read(&db, a).await.unwrap();
        assert_eq!(receipt.message_ids, vec![m1.message.id, m2.message.id]);
        assert_eq!(receipt.session.as_ref().unwrap().unread_count, 0);
        assert_eq!(receipt.unread_total, 1);

        let again = mark_read(&db, a).await.unwrap();
        assert!(again.message_ids.is_empty());
        assert_eq!(again.session.unwrap().unread_count, 0);
        assert_eq!(again.unread_total, 1);

        let history = list_messages(&db, a, 10, None).await.unwrap();
        assert!(history.iter().all(|m| m.is_read && m.read_at.is_some()));
    }

    #[tokio::test]
    async fn mark_read_without_session_is_empty() {
        let (db, _dir) = open_temp().await;
        let id = customer(&db, "quiet").await;
        let receipt = mark_read(&db, id).await.unwrap();
        assert!(receipt.message_ids.is_empty());
        assert!(receipt.session.is_none());
        assert_eq!(receipt.unread_total, 0);
    }

    #[tokio::test]
    async fn unread_total_matches_log_after_mixed_traffic() {
        let (db, _dir) = open_temp().await;
        let ids = [
            customer(&db, "x").await,
            customer(&db, "y").await,
            customer(&db, "z").await,
        ];
        for (i, id) in ids.iter().cycle().take(10).enumerate() {
            if i % 3 == 0 {
                save_outgoing(&db, incoming(*id, "ack", Channel::Telegram))
                    .await
                    .unwrap();
            } else {
                save_incoming(&db, incoming(*id, "msg", Channel::Telegram))
                    .await
                    .unwrap();
            }
        }
        mark_read(&db, ids[1]).await.unwrap();

        let from_log = db
            .call("count", |conn| -> Result<i64, rusqlite::Error> {
                conn.query_row(
                    "SELECT COUNT(*) FROM chat_messages WHERE sender = 'customer' AND is_read = 0",
                    [],
                    |r| r.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(unread_total(&db).await.unwrap(), from_log);
        assert_eq!(get_session(&db, ids[1]).await.unwrap().unwrap().unread_count, 0);
    }

    #[tokio::test]
    async fn history_pages_backwards() {
        let (db, _dir) = open_temp().await;
        let id = customer(&db, "pager").await;
        let mut ids = Vec::new();
        for i in 0..5 {
            let stored = save_incoming(&db, incoming(id, &format!("m{i}"), Channel::Telegram))
                .await
                .unwrap();
            ids.push(stored.message.id);
        }

        let latest = list_messages(&db, id, 2, None).await.unwrap();
        let texts: Vec<_> = latest.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["m3", "m4"]);

        let older = list_messages(&db, id, 10, Some(latest[0].id)).await.unwrap();
        let texts: Vec<_> = older.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["m0", "m1", "m2"]);
    }
}
