// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order operations.

use leadwire_core::types::{Order, OrderItem};
use leadwire_core::{now_timestamp, LeadwireError};
use rusqlite::params;

use super::{json_column, to_json};
use crate::database::Database;

/// Prefix of human-readable order references.
pub const REFERENCE_PREFIX: &str = "PED";

/// Format the reference for the `seq`-th order, e.g. `PED-000042`.
pub fn format_reference(seq: i64) -> String {
    format!("{REFERENCE_PREFIX}-{seq:06}")
}

/// Create an order with the next sequential reference.
pub async fn create_order(
    db: &Database,
    contact_id: &str,
    conversation_id: &str,
    items: &[OrderItem],
    notes: Option<&str>,
) -> Result<Order, LeadwireError> {
    let contact_id = contact_id.to_string();
    let conversation_id = conversation_id.to_string();
    let items = items.to_vec();
    let notes = notes.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let seq: i64 =
                tx.query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM orders", [], |row| row.get(0))?;
            let order = Order {
                id: super::new_id(),
                reference: format_reference(seq),
                contact_id,
                conversation_id,
                items,
                notes,
                status: "pending".to_string(),
                created_at: now_timestamp(),
            };
            tx.execute(
                "INSERT INTO orders (id, seq, reference, contact_id, conversation_id, items, notes,
                                     status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    order.id,
                    seq,
                    order.reference,
                    order.contact_id,
                    order.conversation_id,
                    to_json(&order.items)?,
                    order.notes,
                    order.status,
                    order.created_at,
                ],
            )?;
            tx.commit()?;
            Ok(order)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Orders taken in a conversation, oldest first.
pub async fn orders_for_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<Order>, LeadwireError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, reference, contact_id, conversation_id, items, notes, status, created_at
                 FROM orders WHERE conversation_id = ?1 ORDER BY seq ASC",
            )?;
            let rows = stmt.query_map(params![conversation_id], |row| {
                Ok(Order {
                    id: row.get(0)?,
                    reference: row.get(1)?,
                    contact_id: row.get(2)?,
                    conversation_id: row.get(3)?,
                    items: json_column::<Vec<OrderItem>>(row, 4)?,
                    notes: row.get(5)?,
                    status: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
