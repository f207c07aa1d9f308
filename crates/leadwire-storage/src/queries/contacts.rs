// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact operations.
//!
//! Automated updates are applied with [`update_contact`], which re-reads the
//! row and writes the merged result inside one transaction so concurrent
//! stages never overwrite each other's tags, score or status.

use std::collections::BTreeSet;

use leadwire_core::scoring::apply_update;
use leadwire_core::types::{Contact, ContactUpdate, FunnelStatus, NewContact};
use leadwire_core::{now_timestamp, LeadwireError};
use rusqlite::{params, OptionalExtension};

use super::{json_column, parse_column, to_json};
use crate::database::Database;

const CONTACT_COLUMNS: &str = "id, phone, name, remote_address, tags, score, funnel_status, \
                               assigned_agent_id, created_at, updated_at";

fn row_to_contact(row: &rusqlite::Row<'_>) -> Result<Contact, rusqlite::Error> {
    let score: i64 = row.get(5)?;
    Ok(Contact {
        id: row.get(0)?,
        phone: row.get(1)?,
        name: row.get(2)?,
        remote_address: row.get(3)?,
        tags: json_column::<BTreeSet<String>>(row, 4)?,
        score: leadwire_core::scoring::clamp_score(score),
        funnel_status: parse_column::<FunnelStatus>(row, 6)?,
        assigned_agent_id: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn select_by(
    conn: &rusqlite::Connection,
    column: &str,
    value: &str,
) -> Result<Option<Contact>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE {column} = ?1"),
        params![value],
        row_to_contact,
    )
    .optional()
}

/// Look a contact up by its normalized phone number.
pub async fn find_by_phone(db: &Database, phone: &str) -> Result<Option<Contact>, LeadwireError> {
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| select_by(conn, "phone", &phone))
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a contact by ID.
pub async fn get_contact(db: &Database, id: &str) -> Result<Option<Contact>, LeadwireError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| select_by(conn, "id", &id))
        .await
        .map_err(crate::database::map_tr_err)
}

/// Create a contact with status `NEW` and score 0.
///
/// A concurrent create for the same phone loses the race silently and the
/// winner's row is returned.
pub async fn create_contact(db: &Database, new: &NewContact) -> Result<Contact, LeadwireError> {
    let new = new.clone();
    let id = super::new_id();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO contacts (id, phone, name, remote_address, tags, score, funnel_status,
                                       assigned_agent_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, '[]', 0, ?5, ?6, ?7, ?7)
                 ON CONFLICT(phone) DO NOTHING",
                params![
                    id,
                    new.phone,
                    new.name,
                    new.remote_address,
                    FunnelStatus::New.to_string(),
                    new.assigned_agent_id,
                    now,
                ],
            )?;
            select_by(conn, "phone", &new.phone)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record the transport address replies should go to.
pub async fn set_remote_address(
    db: &Database,
    id: &str,
    address: &str,
) -> Result<(), LeadwireError> {
    let key = id.to_string();
    let address = address.to_string();
    let updated = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE contacts SET remote_address = ?1, updated_at = ?2 WHERE id = ?3",
                params![address, now_timestamp(), key],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if updated == 0 {
        return Err(LeadwireError::NotFound {
            entity: "contact",
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Apply an automated update against the latest persisted row.
pub async fn update_contact(
    db: &Database,
    id: &str,
    update: &ContactUpdate,
) -> Result<Contact, LeadwireError> {
    let key = id.to_string();
    let update = update.clone();
    let result = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(mut contact) = select_by(&tx, "id", &key)? else {
                return Ok(None);
            };
            if apply_update(&mut contact, &update) {
                contact.updated_at = now_timestamp();
                tx.execute(
                    "UPDATE contacts SET tags = ?1, score = ?2, funnel_status = ?3, updated_at = ?4
                     WHERE id = ?5",
                    params![
                        to_json(&contact.tags)?,
                        contact.score,
                        contact.funnel_status.to_string(),
                        contact.updated_at,
                        contact.id,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(Some(contact))
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    result.ok_or_else(|| LeadwireError::NotFound {
        entity: "contact",
        id: id.to_string(),
    })
}

/// Overwrite the funnel status. Only for manual moves such as marking a lead lost.
pub async fn set_funnel_status(
    db: &Database,
    id: &str,
    status: FunnelStatus,
) -> Result<(), LeadwireError> {
    let key = id.to_string();
    let updated = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE contacts SET funnel_status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.to_string(), now_timestamp(), key],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if updated == 0 {
        return Err(LeadwireError::NotFound {
            entity: "contact",
            id: id.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use leadwire_core::types::ScoreUpdate;

    use super::*;
    use crate::queries::test_support::open_temp;

    fn new_contact(phone: &str) -> NewContact {
        NewContact {
            phone: phone.to_string(),
            name: Some("Lucía".to_string()),
            remote_address: Some(format!("{phone}@s.whatsapp.net")),
            assigned_agent_id: None,
        }
    }

    #[tokio::test]
    async fn create_starts_new_with_zero_score() {
        let (db, _dir) = open_temp().await;
        let c = create_contact(&db, &new_contact("5491100000001")).await.unwrap();
        assert_eq!(c.score, 0);
        assert_eq!(c.funnel_status, FunnelStatus::New);
        assert!(c.tags.is_empty());
        assert_eq!(find_by_phone(&db, "5491100000001").await.unwrap(), Some(c));
    }

    #[tokio::test]
    async fn duplicate_phone_returns_existing_contact() {
        let (db, _dir) = open_temp().await;
        let first = create_contact(&db, &new_contact("5491100000002")).await.unwrap();
        let mut again = new_contact("5491100000002");
        again.name = Some("Otro".into());
        let second = create_contact(&db, &again).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.name.as_deref(), Some("Lucía"));
    }

    #[tokio::test]
    async fn update_merges_tags_and_advances() {
        let (db, _dir) = open_temp().await;
        let c = create_contact(&db, &new_contact("5491100000003")).await.unwrap();

        let updated = update_contact(
            &db,
            &c.id,
            &ContactUpdate {
                add_tags: vec!["consulta-precios".into()],
                score: ScoreUpdate::Add(15),
                suggested_status: Some(FunnelStatus::Qualified),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.score, 15);
        assert_eq!(updated.funnel_status, FunnelStatus::Qualified);

        let updated = update_contact(
            &db,
            &c.id,
            &ContactUpdate {
                add_tags: vec!["saludo".into()],
                score: ScoreUpdate::AtLeast(10),
                suggested_status: Some(FunnelStatus::Contacted),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.score, 15);
        assert_eq!(updated.funnel_status, FunnelStatus::Qualified);
        assert_eq!(updated.tags.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_updates_do_not_lose_tags() {
        let (db, _dir) = open_temp().await;
        let db = Arc::new(db);
        let c = create_contact(&db, &new_contact("5491100000004")).await.unwrap();

        let mut handles = Vec::new();
        for tag in ["a", "b", "c", "d", "e", "f"] {
            let db = Arc::clone(&db);
            let id = c.id.clone();
            handles.push(tokio::spawn(async move {
                update_contact(
                    &db,
                    &id,
                    &ContactUpdate {
                        add_tags: vec![tag.to_string()],
                        score: ScoreUpdate::Add(10),
                        suggested_status: None,
                    },
                )
                .await
                .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let c = get_contact(&db, &c.id).await.unwrap().unwrap();
        assert_eq!(c.tags.len(), 6);
        assert_eq!(c.score, 60);
    }

    #[tokio::test]
    async fn lost_contact_is_not_revived() {
        let (db, _dir) = open_temp().await;
        let c = create_contact(&db, &new_contact("5491100000005")).await.unwrap();
        set_funnel_status(&db, &c.id, FunnelStatus::Lost).await.unwrap();
        let updated = update_contact(
            &db,
            &c.id,
            &ContactUpdate {
                suggested_status: Some(FunnelStatus::Qualified),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.funnel_status, FunnelStatus::Lost);
    }

    #[tokio::test]
    async fn updating_missing_contact_is_not_found() {
        let (db, _dir) = open_temp().await;
        let err = update_contact(&db, "ghost", &ContactUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LeadwireError::NotFound { entity: "contact", .. }));
    }
}
