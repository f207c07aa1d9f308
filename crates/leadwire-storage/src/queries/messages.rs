// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message operations.

use leadwire_core::types::{InsertOutcome, Message, MessageMetadata, NewMessage, SenderType};
use leadwire_core::LeadwireError;
use rusqlite::{params, OptionalExtension};

use super::{parse_column, to_json};
use crate::database::Database;

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_type, content, sent_at, metadata";

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<Message, rusqlite::Error> {
    let metadata: Option<String> = row.get(5)?;
    let metadata = match metadata {
        Some(raw) => Some(serde_json::from_str::<MessageMetadata>(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_type: parse_column::<SenderType>(row, 2)?,
        content: row.get(3)?,
        sent_at: row.get(4)?,
        metadata,
    })
}

/// Persist a message.
///
/// A message carrying a transport id already stored in the same conversation
/// is not inserted again; the stored row comes back as `Duplicate`.
pub async fn insert_message(
    db: &Database,
    new: &NewMessage,
) -> Result<InsertOutcome, LeadwireError> {
    let new = new.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let external_id = new.metadata.as_ref().and_then(|m| m.external_id.clone());

            if let Some(ext) = &external_id {
                let existing = tx
                    .query_row(
                        &format!(
                            "SELECT {MESSAGE_COLUMNS} FROM messages
                             WHERE conversation_id = ?1 AND external_id = ?2"
                        ),
                        params![new.conversation_id, ext],
                        row_to_message,
                    )
                    .optional()?;
                if let Some(message) = existing {
                    tx.commit()?;
                    return Ok(InsertOutcome::Duplicate(message));
                }
            }

            let metadata = new.metadata.as_ref().map(to_json).transpose()?;
            let message = Message {
                id: super::new_id(),
                conversation_id: new.conversation_id,
                sender_type: new.sender_type,
                content: new.content,
                sent_at: new.sent_at,
                metadata: new.metadata,
            };
            tx.execute(
                "INSERT INTO messages (id, conversation_id, sender_type, content, sent_at,
                                       external_id, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    message.id,
                    message.conversation_id,
                    message.sender_type.to_string(),
                    message.content,
                    message.sent_at,
                    external_id,
                    metadata,
                ],
            )?;
            tx.execute(
                "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                params![message.sent_at, message.conversation_id],
            )?;
            tx.commit()?;
            Ok(InsertOutcome::Inserted(message))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The most recent `limit` messages of a conversation, oldest first.
pub async fn recent_messages(
    db: &Database,
    conversation_id: &str,
    limit: usize,
) -> Result<Vec<Message>, LeadwireError> {
    let conversation_id = conversation_id.to_string();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ?1
                 ORDER BY sent_at DESC, rowid DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![conversation_id, limit], row_to_message)?;
            let mut messages = rows.collect::<Result<Vec<_>, _>>()?;
            messages.reverse();
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
