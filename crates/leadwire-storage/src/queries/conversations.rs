// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation operations.

use leadwire_core::types::{Conversation, ConversationStatus};
use leadwire_core::{now_timestamp, LeadwireError};
use rusqlite::{params, OptionalExtension};

use super::parse_column;
use crate::database::Database;

fn row_to_conversation(row: &rusqlite::Row<'_>) -> Result<Conversation, rusqlite::Error> {
    Ok(Conversation {
        id: row.get(0)?,
        contact_id: row.get(1)?,
        channel: row.get(2)?,
        status: parse_column::<ConversationStatus>(row, 3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Find the open-or-pending conversation for (contact, channel) or create one.
///
/// Lookup and insert run in one closure on the writer thread, and the partial
/// unique index rejects a second active row should anything else slip in.
pub async fn resolve_active(
    db: &Database,
    contact_id: &str,
    channel: &str,
) -> Result<(Conversation, bool), LeadwireError> {
    let contact_id = contact_id.to_string();
    let channel = channel.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let existing = tx
                .query_row(
                    "SELECT id, contact_id, channel, status, created_at, updated_at
                     FROM conversations
                     WHERE contact_id = ?1 AND channel = ?2 AND status IN ('open', 'pending')
                     ORDER BY created_at DESC LIMIT 1",
                    params![contact_id, channel],
                    row_to_conversation,
                )
                .optional()?;
            if let Some(conversation) = existing {
                tx.commit()?;
                return Ok((conversation, false));
            }

            let now = now_timestamp();
            let conversation = Conversation {
                id: super::new_id(),
                contact_id,
                channel,
                status: ConversationStatus::Open,
                created_at: now.clone(),
                updated_at: now,
            };
            tx.execute(
                "INSERT INTO conversations (id, contact_id, channel, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    conversation.id,
                    conversation.contact_id,
                    conversation.channel,
                    conversation.status.to_string(),
                    conversation.created_at,
                    conversation.updated_at,
                ],
            )?;
            tx.commit()?;
            Ok((conversation, true))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a conversation by ID.
pub async fn get_conversation(
    db: &Database,
    id: &str,
) -> Result<Option<Conversation>, LeadwireError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, contact_id, channel, status, created_at, updated_at
                 FROM conversations WHERE id = ?1",
                params![id],
                row_to_conversation,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All conversations of a contact, newest first.
pub async fn list_for_contact(
    db: &Database,
    contact_id: &str,
) -> Result<Vec<Conversation>, LeadwireError> {
    let contact_id = contact_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, contact_id, channel, status, created_at, updated_at
                 FROM conversations WHERE contact_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt.query_map(params![contact_id], row_to_conversation)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark a conversation closed. The next inbound message opens a new one.
pub async fn close_conversation(db: &Database, id: &str) -> Result<(), LeadwireError> {
    let key = id.to_string();
    let updated = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET status = 'closed', updated_at = ?1 WHERE id = ?2",
                params![now_timestamp(), key],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if updated == 0 {
        return Err(LeadwireError::NotFound {
            entity: "conversation",
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Move a conversation to `pending` (waiting on staff).
pub async fn mark_pending(db: &Database, id: &str) -> Result<(), LeadwireError> {
    let key = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET status = 'pending', updated_at = ?1
                 WHERE id = ?2 AND status = 'open'",
                params![now_timestamp(), key],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
