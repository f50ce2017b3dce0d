// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Customer identity resolution.

use rusqlite::{OptionalExtension, params};
use shopchat_core::chat::fallback_display_name;
use shopchat_core::{Channel, Customer, ShopchatError};

use crate::database::Database;

const CUSTOMER_COLUMNS: &str = "id, telegram_id, whatsapp_id, messenger_id, name, created_at";

fn customer_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        telegram_id: row.get(1)?,
        whatsapp_id: row.get(2)?,
        messenger_id: row.get(3)?,
        name: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Resolve `(channel, external_id)` to a customer, creating one on first
/// contact.
///
/// The insert is conditional on the identity column's UNIQUE constraint, so
/// racing first contacts converge on a single row.
pub async fn get_or_create_customer(
    db: &Database,
    channel: Channel,
    external_id: &str,
    display_name: &str,
) -> Result<Customer, ShopchatError> {
    let external_id = external_id.trim().to_string();
    if external_id.is_empty() {
        return Err(ShopchatError::channel("inbound event has no sender id"));
    }
    let name = match display_name.trim() {
        "" => fallback_display_name(channel, &external_id),
        given => given.to_string(),
    };
    let column = channel.identity_column();

    db.call("get_or_create_customer", move |conn| -> Result<Customer, rusqlite::Error> {
        let inserted = conn.execute(
            &format!(
                "INSERT INTO customers ({column}, name) VALUES (?1, ?2) \
                 ON CONFLICT({column}) DO NOTHING"
            ),
            params![external_id, name],
        )?;
        let customer = conn.query_row(
            &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE {column} = ?1"),
            params![external_id],
            customer_from_row,
        )?;
        if inserted > 0 {
            tracing::info!(
                customer_id = customer.id,
                channel = %channel,
                "customer created on first contact"
            );
        }
        Ok(customer)
    })
    .await
}

pub async fn get_customer(db: &Database, id: i64) -> Result<Option<Customer>, ShopchatError> {
    db.call("get_customer", move |conn| -> Result<_, rusqlite::Error> {
        conn.query_row(
            &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"),
            params![id],
            customer_from_row,
        )
        .optional()
    })
    .await
}
