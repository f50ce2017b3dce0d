// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read side of the product and order tables used by `action` nodes.
//!
//! The tables are owned by the commerce subsystem; the inserts here exist for
//! seeding and tests.

use rusqlite::{OptionalExtension, params};
use shopchat_core::{OrderSummary, ProductSummary, ShopchatError};

use crate::database::Database;

fn product_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProductSummary> {
    Ok(ProductSummary {
        id: row.get(0)?,
        name: row.get(1)?,
        price: row.get(2)?,
        stock: row.get(3)?,
    })
}

fn order_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderSummary> {
    Ok(OrderSummary {
        id: row.get(0)?,
        order_number: row.get(1)?,
        status: row.get(2)?,
        total: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub async fn recent_products(
    db: &Database,
    limit: u32,
) -> Result<Vec<ProductSummary>, ShopchatError> {
    db.call("recent_products", move |conn| -> Result<_, rusqlite::Error> {
        let mut stmt = conn.prepare(
            "SELECT id, name, price, stock FROM products WHERE is_active = 1 \
             ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], product_from_row)?;
        rows.collect()
    })
    .await
}

pub async fn search_products(
    db: &Database,
    query: &str,
    limit: u32,
) -> Result<Vec<ProductSummary>, ShopchatError> {
    let pattern = format!(
        "%{}%",
        query
            .trim()
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_")
    );
    db.call("search_products", move |conn| -> Result<_, rusqlite::Error> {
        let mut stmt = conn.prepare(
            "SELECT id, name, price, stock FROM products \
             WHERE is_active = 1 AND name LIKE ?1 ESCAPE '\\' \
             ORDER BY name ASC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![pattern, limit], product_from_row)?;
        rows.collect()
    })
    .await
}

pub async fn recent_orders(
    db: &Database,
    customer_id: i64,
    limit: u32,
) -> Result<Vec<OrderSummary>, ShopchatError> {
    db.call("recent_orders", move |conn| -> Result<_, rusqlite::Error> {
        let mut stmt = conn.prepare(
            "SELECT id, order_number, status, total, created_at FROM orders \
             WHERE customer_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![customer_id, limit], order_from_row)?;
        rows.collect()
    })
    .await
}

/// One of the customer's orders by number, compared case-insensitively.
pub async fn find_order(
    db: &Database,
    customer_id: i64,
    order_number: &str,
) -> Result<Option<OrderSummary>, ShopchatError> {
    let order_number = order_number.trim().to_string();
    db.call("find_order", move |conn| -> Result<_, rusqlite::Error> {
        conn.query_row(
            "SELECT id, order_number, status, total, created_at FROM orders \
             WHERE customer_id = ?1 AND order_number = ?2 COLLATE NOCASE",
            params![customer_id, order_number],
            order_from_row,
        )
        .optional()
    })
    .await
}

pub async fn insert_product(
    db: &Database,
    name: &str,
    price: f64,
    stock: i64,
) -> Result<i64, ShopchatError> {
    let name = name.to_string();
    db.call("insert_product", move |conn| -> Result<i64, rusqlite::Error> {
        conn.execute(
            "INSERT INTO products (name, price, stock) VALUES (?1, ?2, ?3)",
            params![name, price, stock],
        )?;
        Ok(conn.last_insert_rowid())
    })
    .await
}

pub async fn insert_order(
    db: &Database,
    customer_id: i64,
    order_number: &str,
    status: &str,
    total: f64,
) -> Result<i64, ShopchatError> {
    let order_number = order_number.to_string();
    let status = status.to_string();
    db.call("insert_order", move |conn| -> Result<i64, rusqlite::Error> {
        conn.execute(
            "INSERT INTO orders (order_number, customer_id, status, total) VALUES (?1, ?2, ?3, ?4)",
            params![order_number, customer_id, status, total],
        )?;
        Ok(conn.last_insert_rowid())
    })
    .await
}
