// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted snapshot of the transport session (single row).

use leadwire_core::types::{ChatSession, ConnectionState};
use leadwire_core::LeadwireError;
use rusqlite::{params, OptionalExtension};

use super::parse_column;
use crate::database::Database;

/// Replace the stored session snapshot.
pub async fn save(db: &Database, session: &ChatSession) -> Result<(), LeadwireError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO chat_session (id, state, qr_payload, account_id, reconnect_attempts,
                                           connected_at, updated_at)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                     state = excluded.state,
                     qr_payload = excluded.qr_payload,
                     account_id = excluded.account_id,
                     reconnect_attempts = excluded.reconnect_attempts,
                     connected_at = excluded.connected_at,
                     updated_at = excluded.updated_at",
                params![
                    session.state.to_string(),
                    session.qr_payload,
                    session.account_id,
                    session.reconnect_attempts,
                    session.connected_at,
                    session.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Load the stored session snapshot.
pub async fn load(db: &Database) -> Result<Option<ChatSession>, LeadwireError> {
    db.connection()
        .call(|conn| {
            conn.query_row(
                "SELECT state, qr_payload, account_id, reconnect_attempts, connected_at, updated_at
                 FROM chat_session WHERE id = 1",
                [],
                |row| {
                    Ok(ChatSession {
                        state: parse_column::<ConnectionState>(row, 0)?,
                        qr_payload: row.get(1)?,
                        account_id: row.get(2)?,
                        reconnect_attempts: row.get(3)?,
                        connected_at: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
